//! Declaration and planning error types

use thiserror::Error;

/// Errors raised while declaring or planning a resource graph.
///
/// All of these are detected statically, before any external side effect:
/// a failing graph never produces a partial plan.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate id '{id}' in scope '{scope}'")]
    DuplicateId { id: String, scope: String },

    #[error("Invalid property for {kind} '{id}': {reason}")]
    InvalidProperty {
        kind: String,
        id: String,
        reason: String,
    },

    #[error("Unresolved reference: no node at '{path}'")]
    UnresolvedReference { path: String },

    #[error("Unknown output '{output}' on node '{path}'")]
    UnknownOutput { path: String, output: String },

    #[error("Cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Node '{id}' of kind {kind} does not support attached policy")]
    PolicyNotSupported { kind: String, id: String },

    #[error("Capability {capability} is not applicable to kind {kind}")]
    UnsupportedCapability { capability: String, kind: String },

    #[error("Unknown scope: '{path}'")]
    UnknownScope { path: String },
}

pub type Result<T> = std::result::Result<T, GraphError>;
