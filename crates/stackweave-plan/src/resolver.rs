//! Reference resolver
//!
//! Outputs exist only on the execution side: a node's outputs are recorded
//! here once it has been realized, and references are substituted strictly
//! after that point. Resolution never touches the declaration tree.

use crate::plan::PlannedNode;
use serde::{Deserialize, Serialize};
use stackweave_core::{GraphError, Properties, Reference, ResourceKind, Result, ScopePath, Value};
use std::collections::BTreeMap;

/// Realized outputs, keyed by the producing node's scope path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outputs {
    realized: BTreeMap<ScopePath, BTreeMap<String, Value>>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a realized node's outputs.
    pub fn insert(&mut self, path: ScopePath, outputs: BTreeMap<String, Value>) {
        self.realized.insert(path, outputs);
    }

    pub fn contains(&self, path: &ScopePath) -> bool {
        self.realized.contains_key(path)
    }

    pub fn get(&self, path: &ScopePath) -> Option<&BTreeMap<String, Value>> {
        self.realized.get(path)
    }

    /// Resolve a single reference against the realized outputs.
    pub fn resolve(&self, reference: &Reference) -> Result<Value> {
        let outputs =
            self.realized
                .get(&reference.source)
                .ok_or_else(|| GraphError::UnresolvedReference {
                    path: reference.source.to_string(),
                })?;
        outputs
            .get(&reference.output)
            .cloned()
            .ok_or_else(|| GraphError::UnknownOutput {
                path: reference.source.to_string(),
                output: reference.output.clone(),
            })
    }

    /// Substitute every reference embedded in a value, depth-first.
    pub fn resolve_value(&self, value: &Value) -> Result<Value> {
        Ok(match value {
            Value::Ref(reference) => self.resolve(reference)?,
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| self.resolve_value(v))
                    .collect::<Result<_>>()?,
            ),
            Value::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.resolve_value(v)?)))
                    .collect::<Result<_>>()?,
            ),
            other => other.clone(),
        })
    }
}

/// A planned node with every reference substituted, ready for a
/// provisioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedNode {
    pub path: ScopePath,
    pub kind: ResourceKind,
    pub properties: Properties,
    /// Identity policy statements, rendered as plain values.
    pub attached_policy: Vec<Value>,
    /// Resource policy statements, rendered as plain values.
    pub resource_policy: Vec<Value>,
}

/// Resolve a planned node's properties and policies.
///
/// Must be called only after every dependency of the node has been
/// realized; a still-missing source fails with
/// [`GraphError::UnresolvedReference`].
pub fn resolve_node(node: &PlannedNode, outputs: &Outputs) -> Result<ResolvedNode> {
    let properties = node
        .properties
        .iter()
        .map(|(k, v)| Ok((k.clone(), outputs.resolve_value(v)?)))
        .collect::<Result<Properties>>()?;

    let attached_policy = node
        .attached_policy
        .iter()
        .map(|s| outputs.resolve_value(&s.to_value()))
        .collect::<Result<Vec<_>>>()?;
    let resource_policy = node
        .resource_policy
        .iter()
        .map(|s| outputs.resolve_value(&s.to_value()))
        .collect::<Result<Vec<_>>>()?;

    Ok(ResolvedNode {
        path: node.path.clone(),
        kind: node.kind,
        properties,
        attached_policy,
        resource_policy,
    })
}
