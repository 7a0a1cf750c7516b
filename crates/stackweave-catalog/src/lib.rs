//! Stackweave Catalog
//!
//! Typed builders over the core declaration API, one module per resource
//! area. Each builder validates its arguments at construction, registers
//! the stack outputs a deployment usually wants, and exposes `grant_*`
//! helpers over the policy attachment layer.

pub mod compliance;
pub mod compute;
pub mod iam;
pub mod storage;
pub mod utilities;

// Re-exports
pub use compliance::{ComplianceRules, ManagedRule, ManagedRuleProps};
pub use compute::{BuildAgent, BuildAgentProps, ClusterProps, ServiceCluster};
pub use iam::{OidcProvider, OidcProviderProps, Role, RoleProps, federated_repo_principal};
pub use storage::{
    Attribute, AttributeType, Bucket, BucketProps, Repository, RepositoryProps, Table, TableProps,
};
pub use utilities::{Function, FunctionProps};
