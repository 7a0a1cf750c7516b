//! Execution error types

use stackweave_core::{GraphError, ScopePath};
use thiserror::Error;

/// Provider-side failure while realizing a node.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider does not support kind: {0}")]
    UnsupportedKind(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
}

/// A provider failure tied to the node it occurred on.
#[derive(Error, Debug)]
#[error("Realization of '{node}' failed: {source}")]
pub struct RealizationError {
    pub node: ScopePath,
    #[source]
    pub source: ProvisionError,
}

/// Executor-level errors (not per-node failures, which are reported in the
/// execution report instead).
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Invalid plan: dependency '{path}' is not part of the plan")]
    InvalidPlan { path: String },

    #[error("Realization task panicked: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, ExecError>;
