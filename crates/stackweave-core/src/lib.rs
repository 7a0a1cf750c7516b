//! Stackweave Core
//!
//! This crate provides the declaration side of stackweave: typed resource
//! nodes, deferred references between them, a composite (stack/module) tree
//! and a cross-cutting policy attachment layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 caller / catalog                 │
//! │        (typed builders, grant helpers)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackweave-core                    │
//! │  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │ Stack (tree) │  │ Policy Attachment Layer  │ │
//! │  └──────────────┘  └──────────────────────────┘ │
//! │  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │ Node / Kind  │  │ Value / Reference        │ │
//! │  └──────────────┘  └──────────────────────────┘ │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │ stackweave-   │  flatten / order / resolve
//! │     plan      │
//! └───────────────┘
//! ```
//!
//! Nodes never hold live pointers to each other; all cross-node coupling is
//! expressed as [`Reference`] values resolved at plan/execution time.

pub mod config;
pub mod error;
pub mod node;
pub mod policy;
pub mod scope;
pub mod stack;
pub mod value;

// Re-exports
pub use config::{Environment, RemovalPolicy, StackConfig};
pub use error::{GraphError, Result};
pub use node::{Node, Properties, ResourceKind};
pub use policy::{Capability, Effect, PolicyStatement, Principal};
pub use scope::ScopePath;
pub use stack::{CompositeHandle, NodeHandle, Stack, StackOutput};
pub use value::{Reference, Value};
