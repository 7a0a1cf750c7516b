//! The ordered plan artifact

use serde::{Deserialize, Serialize};
use stackweave_core::{PolicyStatement, Properties, ResourceKind, ScopePath, StackConfig, StackOutput};
use std::collections::BTreeMap;

/// A single node record in a plan, ready for handing to a provisioning
/// backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedNode {
    /// Scope path, globally unique within the stack.
    pub path: ScopePath,

    pub kind: ResourceKind,

    /// Declared properties; values may still embed references, which the
    /// executor resolves once the referenced nodes are realized.
    pub properties: Properties,

    /// Every node this one must wait for: the derived edge set (references
    /// plus explicit declarations). Lets executors parallelize independent
    /// subtrees.
    pub depends_on: Vec<ScopePath>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub attached_policy: Vec<PolicyStatement>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub resource_policy: Vec<PolicyStatement>,
}

/// Topologically ordered, fully validated deployment plan.
///
/// For every dependency edge (a → b), a appears before b in `nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderedPlan {
    /// Name of the stack this plan was computed for.
    pub stack: String,

    /// Configuration the stack was declared with.
    pub config: StackConfig,

    /// Nodes in topological order.
    pub nodes: Vec<PlannedNode>,

    /// Stack-level exported outputs, resolved after execution.
    pub outputs: Vec<StackOutput>,
}

impl OrderedPlan {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of a node in the emitted order.
    pub fn position(&self, path: &ScopePath) -> Option<usize> {
        self.nodes.iter().position(|n| &n.path == path)
    }

    pub fn get(&self, path: &ScopePath) -> Option<&PlannedNode> {
        self.nodes.iter().find(|n| &n.path == path)
    }

    /// Summary of the plan for display.
    pub fn summary(&self) -> PlanSummary {
        let mut kinds = BTreeMap::new();
        for node in &self.nodes {
            *kinds.entry(node.kind.as_str().to_string()).or_insert(0) += 1;
        }
        PlanSummary {
            nodes: self.nodes.len(),
            edges: self.nodes.iter().map(|n| n.depends_on.len()).sum(),
            kinds,
        }
    }

    /// Serialize the plan artifact as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Counts for a computed plan.
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub nodes: usize,
    pub edges: usize,
    pub kinds: BTreeMap<String, usize>,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} node(s) to realize, {} ordering edge(s)",
            self.nodes, self.edges
        )
    }
}
