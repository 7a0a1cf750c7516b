//! Stackweave Planner
//!
//! Turns a declared [`Stack`](stackweave_core::Stack) into an
//! [`OrderedPlan`]: the composite tree is flattened, every reference and
//! explicit `depends_on` becomes a dependency edge, and nodes are emitted in
//! topological order. Cycles, dangling references and unknown outputs abort
//! the whole plan before any external side effect.
//!
//! The emitted ordering is a partial order: each planned node carries its
//! own dependency list, so an executor may realize mutually independent
//! subtrees in parallel.

pub mod builder;
pub mod plan;
pub mod resolver;

// Re-exports
pub use builder::plan;
pub use plan::{OrderedPlan, PlanSummary, PlannedNode};
pub use resolver::{Outputs, ResolvedNode, resolve_node};
