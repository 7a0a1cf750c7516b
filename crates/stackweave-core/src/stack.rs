//! Composite tree and stack declaration API
//!
//! A [`Stack`] is the root composite plus its configuration. Composites own
//! their child nodes and child composites exclusively; parent links are set
//! once at creation, so the tree is acyclic by construction. Callers hold
//! lightweight handles (scope paths), never references into the tree.

use crate::config::StackConfig;
use crate::error::{GraphError, Result};
use crate::node::{Node, PolicySide, Properties, ResourceKind};
use crate::policy::{Capability, PolicyStatement, Principal};
use crate::scope::ScopePath;
use crate::value::{Reference, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named grouping of nodes and nested composites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composite {
    pub id: String,
    pub nodes: Vec<Node>,
    pub children: Vec<Composite>,
}

impl Composite {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: Vec::new(),
            children: Vec::new(),
        }
    }

    fn has_sibling(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id) || self.children.iter().any(|c| c.id == id)
    }

    fn find(&self, path: &[String]) -> Option<&Composite> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .children
                .iter()
                .find(|c| c.id == *head)
                .and_then(|c| c.find(rest)),
        }
    }

    fn find_mut(&mut self, path: &[String]) -> Option<&mut Composite> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self
                .children
                .iter_mut()
                .find(|c| c.id == *head)
                .and_then(|c| c.find_mut(rest)),
        }
    }

    fn visit<'a>(&'a self, scope: &ScopePath, out: &mut Vec<(ScopePath, &'a Node)>) {
        for node in &self.nodes {
            out.push((scope.child(&node.id), node));
        }
        for child in &self.children {
            child.visit(&scope.child(&child.id), out);
        }
    }
}

/// Handle onto a composite, addressed by scope path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeHandle {
    path: ScopePath,
}

impl CompositeHandle {
    pub fn path(&self) -> &ScopePath {
        &self.path
    }
}

/// Handle onto a declared node.
///
/// Cheap to clone; holds a lookup key, never a pointer into the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    path: ScopePath,
    kind: ResourceKind,
}

impl NodeHandle {
    pub fn path(&self) -> &ScopePath {
        &self.path
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// A deferred reference to one of this node's outputs.
    ///
    /// Valid immediately; the output name is validated when the graph is
    /// planned, and the value materializes only after realization.
    pub fn output(&self, name: impl Into<String>) -> Reference {
        Reference::new(self.path.clone(), name)
    }
}

/// A stack-level exported output (e.g. a load balancer DNS name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOutput {
    pub name: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

type GrantKey = (Capability, ScopePath, ScopePath);

/// Root of a declared resource graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    name: String,
    config: StackConfig,
    root: Composite,
    outputs: Vec<StackOutput>,
    /// Grants already recorded, keyed by (capability, target, principal).
    /// Makes `grant` idempotent per triple.
    grants: BTreeSet<GrantKey>,
}

impl Stack {
    pub fn new(name: impl Into<String>, config: StackConfig) -> Self {
        let name = name.into();
        Self {
            root: Composite::new(&name),
            name,
            config,
            outputs: Vec::new(),
            grants: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn outputs(&self) -> &[StackOutput] {
        &self.outputs
    }

    /// Handle onto the root scope.
    pub fn root_scope(&self) -> CompositeHandle {
        CompositeHandle {
            path: ScopePath::root(),
        }
    }

    /// Create a nested composite under `parent`.
    pub fn composite(
        &mut self,
        parent: &CompositeHandle,
        id: impl Into<String>,
    ) -> Result<CompositeHandle> {
        let id = id.into();
        let scope = self.scope_mut(&parent.path)?;
        if scope.has_sibling(&id) {
            return Err(GraphError::DuplicateId {
                id,
                scope: scope_label(&parent.path),
            });
        }
        scope.children.push(Composite::new(&id));
        Ok(CompositeHandle {
            path: parent.path.child(id),
        })
    }

    /// Declare a node under `scope`.
    ///
    /// Fails with [`GraphError::DuplicateId`] when `id` collides with a
    /// sibling, and [`GraphError::InvalidProperty`] when a property the
    /// kind requires is missing.
    pub fn add_node(
        &mut self,
        scope: &CompositeHandle,
        kind: ResourceKind,
        id: impl Into<String>,
        properties: Properties,
    ) -> Result<NodeHandle> {
        let id = id.into();

        for required in kind.required_properties() {
            let missing = match properties.get(*required) {
                None | Some(Value::Null) => true,
                Some(_) => false,
            };
            if missing {
                return Err(GraphError::InvalidProperty {
                    kind: kind.as_str().to_string(),
                    id,
                    reason: format!("required property '{required}' is missing"),
                });
            }
        }

        let composite = self.scope_mut(&scope.path)?;
        if composite.has_sibling(&id) {
            return Err(GraphError::DuplicateId {
                id,
                scope: scope_label(&scope.path),
            });
        }

        let path = scope.path.child(&id);
        composite.nodes.push(Node::new(&id, kind, properties));
        tracing::debug!("declared {} '{}'", kind, path);

        Ok(NodeHandle { path, kind })
    }

    /// Append a policy statement to the node's native policy document.
    pub fn add_statement(&mut self, handle: &NodeHandle, statement: PolicyStatement) -> Result<()> {
        let side = handle.kind.policy_side();
        let node = self.node_mut(&handle.path)?;
        match side {
            PolicySide::Identity => node.attached_policy.push(statement),
            PolicySide::Resource => node.resource_policy.push(statement),
            PolicySide::None => {
                return Err(GraphError::PolicyNotSupported {
                    kind: handle.kind.as_str().to_string(),
                    id: node.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Record an explicit ordering edge: `handle` is realized after `on`.
    pub fn depends_on(&mut self, handle: &NodeHandle, on: &NodeHandle) -> Result<()> {
        let on_path = on.path.clone();
        let node = self.node_mut(&handle.path)?;
        if !node.depends_on.contains(&on_path) {
            node.depends_on.push(on_path);
        }
        Ok(())
    }

    /// Grant `capability` on `on` to `principal`.
    ///
    /// When the principal natively hosts identity policy (a role), the
    /// statement lands on the principal and names `on`'s ARN; otherwise a
    /// resource-based statement lands on `on` naming the principal. Either
    /// way the embedded reference yields the dependency edge at plan time.
    ///
    /// Idempotent per (capability, target, principal) triple: a repeated
    /// call records nothing.
    pub fn grant(
        &mut self,
        capability: Capability,
        on: &NodeHandle,
        principal: &NodeHandle,
    ) -> Result<()> {
        let key = (capability, on.path.clone(), principal.path.clone());
        if self.grants.contains(&key) {
            tracing::debug!(
                "grant {} on '{}' to '{}' already recorded, skipping",
                capability,
                on.path,
                principal.path
            );
            return Ok(());
        }

        let actions = capability.actions_for(on.kind)?;
        let resource = Value::Ref(on.output("arn"));

        match principal.kind.policy_side() {
            PolicySide::Identity => {
                let statement = PolicyStatement::allow()
                    .with_actions(actions)
                    .with_resource(resource);
                self.node_mut(&principal.path)?.attached_policy.push(statement);
            }
            _ => {
                if on.kind.policy_side() != PolicySide::Resource {
                    return Err(GraphError::PolicyNotSupported {
                        kind: on.kind.as_str().to_string(),
                        id: on.path.id().unwrap_or_default().to_string(),
                    });
                }
                let statement = PolicyStatement::allow()
                    .with_actions(actions)
                    .with_resource(resource)
                    .with_principal(Principal::Node(principal.output("arn")));
                self.node_mut(&on.path)?.resource_policy.push(statement);
            }
        }

        self.grants.insert(key);
        tracing::debug!(
            "granted {} on '{}' to '{}'",
            capability,
            on.path,
            principal.path
        );
        Ok(())
    }

    /// Export a stack-level output (the deployment's visible values).
    pub fn add_output(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.outputs.push(StackOutput {
            name: name.into(),
            value: value.into(),
            description: None,
        });
    }

    pub fn add_output_with_description(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        description: impl Into<String>,
    ) {
        self.outputs.push(StackOutput {
            name: name.into(),
            value: value.into(),
            description: Some(description.into()),
        });
    }

    /// Look up a declared node by scope path.
    pub fn node(&self, path: &ScopePath) -> Option<&Node> {
        let (scope, id) = (path.parent()?, path.id()?);
        self.root
            .find(scope.segments())
            .and_then(|c| c.nodes.iter().find(|n| n.id == id))
    }

    /// All declared nodes with their scope paths, in declaration order.
    pub fn nodes(&self) -> Vec<(ScopePath, &Node)> {
        let mut out = Vec::new();
        self.root.visit(&ScopePath::root(), &mut out);
        out
    }

    fn scope_mut(&mut self, path: &ScopePath) -> Result<&mut Composite> {
        self.root
            .find_mut(path.segments())
            .ok_or_else(|| GraphError::UnknownScope {
                path: path.to_string(),
            })
    }

    fn node_mut(&mut self, path: &ScopePath) -> Result<&mut Node> {
        let missing = || GraphError::UnresolvedReference {
            path: path.to_string(),
        };
        let scope = path.parent().ok_or_else(missing)?;
        let id = path.id().ok_or_else(missing)?;
        self.root
            .find_mut(scope.segments())
            .and_then(|c| c.nodes.iter_mut().find(|n| n.id == id))
            .ok_or_else(missing)
    }
}

fn scope_label(path: &ScopePath) -> String {
    if path.is_root() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    fn stack() -> Stack {
        Stack::new(
            "infra",
            StackConfig::new(Environment::Dev, "app", "us-east-1"),
        )
    }

    fn table_props() -> Properties {
        Properties::from([("partition_key".to_string(), Value::from("id"))])
    }

    fn role_props() -> Properties {
        Properties::from([(
            "assumed_by".to_string(),
            Principal::Service("tasks.compute.internal".to_string()).to_value(),
        )])
    }

    #[test]
    fn test_duplicate_id_in_same_scope_fails() {
        let mut stack = stack();
        let root = stack.root_scope();
        stack
            .add_node(&root, ResourceKind::Table, "patients", table_props())
            .unwrap();

        let err = stack
            .add_node(&root, ResourceKind::Table, "patients", table_props())
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateId { .. }));
    }

    #[test]
    fn test_same_id_in_different_scopes_succeeds() {
        let mut stack = stack();
        let root = stack.root_scope();
        let a = stack.composite(&root, "a").unwrap();
        let b = stack.composite(&root, "b").unwrap();

        stack
            .add_node(&a, ResourceKind::Table, "patients", table_props())
            .unwrap();
        stack
            .add_node(&b, ResourceKind::Table, "patients", table_props())
            .unwrap();
        assert_eq!(stack.nodes().len(), 2);
    }

    #[test]
    fn test_composite_id_collides_with_node_id() {
        let mut stack = stack();
        let root = stack.root_scope();
        stack
            .add_node(&root, ResourceKind::Bucket, "assets", Properties::new())
            .unwrap();

        let err = stack.composite(&root, "assets").unwrap_err();
        assert!(matches!(err, GraphError::DuplicateId { .. }));
    }

    #[test]
    fn test_missing_required_property_fails() {
        let mut stack = stack();
        let root = stack.root_scope();

        let err = stack
            .add_node(&root, ResourceKind::Role, "task-role", Properties::new())
            .unwrap_err();
        match err {
            GraphError::InvalidProperty { kind, reason, .. } => {
                assert_eq!(kind, "role");
                assert!(reason.contains("assumed_by"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_grant_is_idempotent_per_triple() {
        let mut stack = stack();
        let root = stack.root_scope();
        let table = stack
            .add_node(&root, ResourceKind::Table, "patients", table_props())
            .unwrap();
        let role = stack
            .add_node(&root, ResourceKind::Role, "task-role", role_props())
            .unwrap();

        stack.grant(Capability::ReadWrite, &table, &role).unwrap();
        stack.grant(Capability::ReadWrite, &table, &role).unwrap();

        let node = stack.node(role.path()).unwrap();
        assert_eq!(node.attached_policy.len(), 1);

        // A different capability is a different grant.
        stack.grant(Capability::Read, &table, &role).unwrap();
        assert_eq!(stack.node(role.path()).unwrap().attached_policy.len(), 2);
    }

    #[test]
    fn test_grant_to_non_role_lands_on_resource_policy() {
        let mut stack = stack();
        let root = stack.root_scope();
        let bucket = stack
            .add_node(&root, ResourceKind::Bucket, "assets", Properties::new())
            .unwrap();
        let function = stack
            .add_node(
                &root,
                ResourceKind::Function,
                "alert",
                Properties::from([
                    ("handler".to_string(), Value::from("index.handler")),
                    ("runtime".to_string(), Value::from("node20")),
                ]),
            )
            .unwrap();

        stack.grant(Capability::Put, &bucket, &function).unwrap();

        assert!(stack.node(function.path()).unwrap().attached_policy.is_empty());
        let bucket_node = stack.node(bucket.path()).unwrap();
        assert_eq!(bucket_node.resource_policy.len(), 1);
        assert_eq!(bucket_node.resource_policy[0].principals.len(), 1);
    }

    #[test]
    fn test_statement_on_plain_kind_fails() {
        let mut stack = stack();
        let root = stack.root_scope();
        let cluster = stack
            .add_node(&root, ResourceKind::Cluster, "backend", Properties::new())
            .unwrap();

        let err = stack
            .add_statement(&cluster, PolicyStatement::allow().with_all_resources())
            .unwrap_err();
        assert!(matches!(err, GraphError::PolicyNotSupported { .. }));
    }
}
