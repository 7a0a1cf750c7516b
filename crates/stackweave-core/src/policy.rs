//! Policy statements and grant capabilities
//!
//! Permission declarations are plain data: a statement is a set of actions
//! over a set of resources, optionally scoped to principals. Statements are
//! additive and order-independent for evaluation; the attachment order on a
//! node is preserved for auditability.

use crate::error::{GraphError, Result};
use crate::node::ResourceKind;
use crate::value::{Reference, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

/// A principal a statement applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    /// A provider-internal service (e.g. `tasks.compute.internal`).
    Service(String),
    /// A federated identity provider with trust conditions, e.g. an OIDC
    /// provider restricted to one repository's workflows.
    Federated {
        provider: Reference,
        conditions: BTreeMap<String, Value>,
    },
    /// Another node in the graph, referenced by one of its outputs.
    Node(Reference),
    /// A literal identifier outside the graph.
    Arn(String),
}

impl Principal {
    /// Render as a plain value (used when serializing resolved policies).
    pub fn to_value(&self) -> Value {
        match self {
            Principal::Service(service) => Value::Map(BTreeMap::from([(
                "service".to_string(),
                Value::from(service.clone()),
            )])),
            Principal::Federated {
                provider,
                conditions,
            } => Value::Map(BTreeMap::from([
                ("federated".to_string(), Value::Ref(provider.clone())),
                ("conditions".to_string(), Value::Map(conditions.clone())),
            ])),
            Principal::Node(reference) => Value::Ref(reference.clone()),
            Principal::Arn(arn) => Value::from(arn.clone()),
        }
    }
}

/// A single permission statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Optional statement id, for audit trails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    pub effect: Effect,

    /// Action names. Set semantics: duplicates collapse.
    pub actions: BTreeSet<String>,

    /// Resources the actions apply to; usually ARN references.
    pub resources: BTreeSet<Value>,

    /// Principals, for resource-based and trust statements.
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub principals: BTreeSet<Principal>,
}

impl PolicyStatement {
    pub fn allow() -> Self {
        Self {
            sid: None,
            effect: Effect::Allow,
            actions: BTreeSet::new(),
            resources: BTreeSet::new(),
            principals: BTreeSet::new(),
        }
    }

    pub fn deny() -> Self {
        Self {
            effect: Effect::Deny,
            ..Self::allow()
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn with_resource(mut self, resource: impl Into<Value>) -> Self {
        self.resources.insert(resource.into());
        self
    }

    pub fn with_all_resources(self) -> Self {
        self.with_resource("*")
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.insert(principal);
        self
    }

    /// Visit every reference embedded in this statement.
    pub fn walk_refs(&self, visit: &mut impl FnMut(&Reference)) {
        for resource in &self.resources {
            resource.walk_refs(visit);
        }
        for principal in &self.principals {
            principal.to_value().walk_refs(visit);
        }
    }

    /// Render as a plain value (used for resolved plans and reports).
    pub fn to_value(&self) -> Value {
        let mut entries = BTreeMap::new();
        if let Some(sid) = &self.sid {
            entries.insert("sid".to_string(), Value::from(sid.clone()));
        }
        entries.insert(
            "effect".to_string(),
            Value::from(match self.effect {
                Effect::Allow => "allow",
                Effect::Deny => "deny",
            }),
        );
        entries.insert(
            "actions".to_string(),
            Value::List(self.actions.iter().map(|a| Value::from(a.clone())).collect()),
        );
        entries.insert(
            "resources".to_string(),
            Value::List(self.resources.iter().cloned().collect()),
        );
        if !self.principals.is_empty() {
            entries.insert(
                "principals".to_string(),
                Value::List(self.principals.iter().map(Principal::to_value).collect()),
            );
        }
        Value::Map(entries)
    }
}

/// Capabilities a grant can confer.
///
/// A capability expands to a concrete action set depending on the kind of
/// the node it is granted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Write,
    ReadWrite,
    Put,
    Pull,
    Push,
    Invoke,
}

impl Capability {
    /// Expand to the action set for a target kind.
    ///
    /// Fails when the capability has no meaning for the kind (e.g.
    /// `Invoke` on a table).
    pub fn actions_for(&self, kind: ResourceKind) -> Result<Vec<&'static str>> {
        let actions: &[&str] = match (kind, self) {
            (ResourceKind::Table, Capability::Read) => {
                &["table:GetItem", "table:Query", "table:Scan", "table:BatchGetItem"]
            }
            (ResourceKind::Table, Capability::Write) => &[
                "table:PutItem",
                "table:UpdateItem",
                "table:DeleteItem",
                "table:BatchWriteItem",
            ],
            (ResourceKind::Table, Capability::ReadWrite) => &[
                "table:GetItem",
                "table:Query",
                "table:Scan",
                "table:BatchGetItem",
                "table:PutItem",
                "table:UpdateItem",
                "table:DeleteItem",
                "table:BatchWriteItem",
            ],
            (ResourceKind::Bucket, Capability::Read) => &["bucket:GetObject", "bucket:ListBucket"],
            (ResourceKind::Bucket, Capability::Put) => &["bucket:PutObject"],
            (ResourceKind::Bucket, Capability::ReadWrite) => &[
                "bucket:GetObject",
                "bucket:ListBucket",
                "bucket:PutObject",
                "bucket:DeleteObject",
            ],
            (ResourceKind::Repository, Capability::Pull) => &[
                "registry:GetAuthorizationToken",
                "registry:BatchCheckLayerAvailability",
                "registry:GetDownloadUrlForLayer",
                "registry:BatchGetImage",
            ],
            (ResourceKind::Repository, Capability::Push) => &[
                "registry:GetAuthorizationToken",
                "registry:BatchCheckLayerAvailability",
                "registry:InitiateLayerUpload",
                "registry:UploadLayerPart",
                "registry:CompleteLayerUpload",
                "registry:PutImage",
            ],
            (ResourceKind::Function, Capability::Invoke) => &["function:Invoke"],
            (ResourceKind::LogGroup, Capability::Write) => &[
                "logs:CreateLogStream",
                "logs:PutLogEvents",
            ],
            _ => {
                return Err(GraphError::UnsupportedCapability {
                    capability: format!("{self:?}"),
                    kind: kind.as_str().to_string(),
                });
            }
        };
        Ok(actions.to_vec())
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::ReadWrite => "read_write",
            Capability::Put => "put",
            Capability::Pull => "pull",
            Capability::Push => "push",
            Capability::Invoke => "invoke",
        };
        write!(f, "{name}")
    }
}
