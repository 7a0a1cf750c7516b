//! Resource node model
//!
//! A node is a typed, identified unit of infrastructure. Its outputs do not
//! live here: they exist only on the execution side, once the node has been
//! realized by a provisioner.

use crate::policy::PolicyStatement;
use crate::scope::ScopePath;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property map of a node.
pub type Properties = BTreeMap<String, Value>;

/// Which side of the permission model a kind natively hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySide {
    /// Identity-based policy attached to the principal (roles).
    Identity,
    /// Resource-based policy attached to the resource itself.
    Resource,
    /// The kind bears no policy document.
    None,
}

/// The closed set of resource kinds the engine knows how to declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Role,
    OidcProvider,
    Table,
    Bucket,
    Repository,
    Cluster,
    Service,
    LoadBalancer,
    Instance,
    Function,
    LogGroup,
    Rule,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Role => "role",
            ResourceKind::OidcProvider => "oidc_provider",
            ResourceKind::Table => "table",
            ResourceKind::Bucket => "bucket",
            ResourceKind::Repository => "repository",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Service => "service",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::Instance => "instance",
            ResourceKind::Function => "function",
            ResourceKind::LogGroup => "log_group",
            ResourceKind::Rule => "rule",
        }
    }

    /// Properties that must be present when the node is declared.
    pub fn required_properties(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Role => &["assumed_by"],
            ResourceKind::OidcProvider => &["url", "client_ids"],
            ResourceKind::Table => &["partition_key"],
            ResourceKind::Bucket => &[],
            ResourceKind::Repository => &[],
            ResourceKind::Cluster => &[],
            ResourceKind::Service => &["cluster", "image"],
            ResourceKind::LoadBalancer => &["service"],
            ResourceKind::Instance => &["instance_type"],
            ResourceKind::Function => &["handler", "runtime"],
            ResourceKind::LogGroup => &[],
            ResourceKind::Rule => &["identifier"],
        }
    }

    /// Output names this kind produces once realized.
    pub fn outputs(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Role => &["arn", "name"],
            ResourceKind::OidcProvider => &["arn"],
            ResourceKind::Table => &["arn", "name"],
            ResourceKind::Bucket => &["arn", "name"],
            ResourceKind::Repository => &["arn", "uri"],
            ResourceKind::Cluster => &["arn", "name"],
            ResourceKind::Service => &["arn", "name"],
            ResourceKind::LoadBalancer => &["arn", "dns_name"],
            ResourceKind::Instance => &["id", "public_ip"],
            ResourceKind::Function => &["arn", "name"],
            ResourceKind::LogGroup => &["arn", "name"],
            ResourceKind::Rule => &["arn", "name"],
        }
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs().contains(&name)
    }

    /// Which policy document this kind natively hosts.
    pub fn policy_side(&self) -> PolicySide {
        match self {
            ResourceKind::Role => PolicySide::Identity,
            ResourceKind::Table
            | ResourceKind::Bucket
            | ResourceKind::Repository
            | ResourceKind::Function => PolicySide::Resource,
            _ => PolicySide::None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared resource node.
///
/// Outputs are intentionally absent: they are unpopulated until the node is
/// realized, and live in the executor's output store, not on the
/// declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Id, unique among siblings in the enclosing scope.
    pub id: String,

    /// Resource kind.
    pub kind: ResourceKind,

    /// Declared properties; values may embed references.
    pub properties: Properties,

    /// Identity-based policy statements (roles). Attachment order is
    /// preserved for auditability; evaluation is union semantics.
    pub attached_policy: Vec<PolicyStatement>,

    /// Resource-based policy statements (buckets, tables, ...).
    pub resource_policy: Vec<PolicyStatement>,

    /// Explicit ordering edges in addition to those derived from references.
    pub depends_on: Vec<ScopePath>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: ResourceKind, properties: Properties) -> Self {
        Self {
            id: id.into(),
            kind,
            properties,
            attached_policy: Vec::new(),
            resource_policy: Vec::new(),
            depends_on: Vec::new(),
        }
    }
}
