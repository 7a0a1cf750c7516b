//! Stackweave Executor
//!
//! Consumes an [`OrderedPlan`](stackweave_plan::OrderedPlan) and realizes
//! its nodes through a [`Provisioner`]. The plan is a partial order:
//! mutually independent nodes are realized concurrently, while a reference
//! is only ever resolved after its source node's realization has fully
//! completed.
//!
//! The executor owns the output store; tasks receive fully resolved nodes
//! and hand back outputs, so no shared mutable state crosses task
//! boundaries. On the first failure no new realizations are started,
//! in-flight ones finish, and every node's outcome lands in the final
//! report.

pub mod dryrun;
pub mod error;
pub mod executor;
pub mod provisioner;

// Re-exports
pub use dryrun::DryRunProvisioner;
pub use error::{ExecError, ProvisionError, RealizationError};
pub use executor::{ExecutionReport, Executor, NodeOutcome, OutcomeStatus};
pub use provisioner::Provisioner;
