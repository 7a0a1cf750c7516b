//! Plan executor
//!
//! Realizes a plan's nodes in dependency order, spawning independent nodes
//! concurrently. The scheduler loop owns the output store: a node is
//! resolved and spawned only once all of its dependencies have completed,
//! which gives the happens-before edge the resolver requires.

use crate::error::{ExecError, ProvisionError, RealizationError, Result};
use crate::provisioner::Provisioner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackweave_core::{ResourceKind, ScopePath, Value};
use stackweave_plan::{OrderedPlan, Outputs, resolve_node};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Outcome of a single node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum OutcomeStatus {
    /// Realized; outputs recorded.
    Succeeded { outputs: BTreeMap<String, Value> },
    /// The provisioner failed on this node.
    Failed { error: String },
    /// Never attempted because a dependency did not complete.
    Skipped { blocked_on: ScopePath },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutcome {
    pub path: ScopePath,
    pub kind: ResourceKind,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Per-node outcomes of one plan execution.
///
/// Every node of the plan appears exactly once; failures are never
/// silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub stack: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Outcomes in plan order.
    pub outcomes: Vec<NodeOutcome>,

    /// Stack-level exported outputs; resolved only when every node
    /// succeeded.
    pub stack_outputs: BTreeMap<String, Value>,

    /// Realized node outputs, for resolving further references.
    pub outputs: Outputs,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o.status, OutcomeStatus::Succeeded { .. }))
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Skipped { .. }))
    }

    pub fn outcome(&self, path: &ScopePath) -> Option<&NodeOutcome> {
        self.outcomes.iter().find(|o| &o.path == path)
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} realized, {} failed, {} skipped",
            self.succeeded(),
            self.failed(),
            self.skipped()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeState {
    Pending,
    Running,
    Done,
    Failed,
}

/// Executes ordered plans against a provisioner.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    concurrency: Option<usize>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of concurrently running realizations.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit.max(1));
        self
    }

    /// Realize every node of the plan.
    ///
    /// First failure wins: once a node fails, no new realizations start,
    /// in-flight ones are allowed to finish, and all remaining nodes are
    /// reported as skipped.
    pub async fn apply(
        &self,
        plan: &OrderedPlan,
        provisioner: Arc<dyn Provisioner>,
    ) -> Result<ExecutionReport> {
        let started_at = Utc::now();
        let total = plan.nodes.len();
        tracing::info!(
            "applying plan for stack '{}' via {}: {}",
            plan.stack,
            provisioner.name(),
            plan.summary()
        );

        let index: BTreeMap<&ScopePath, usize> = plan
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (&n.path, i))
            .collect();
        let deps: Vec<Vec<usize>> = plan
            .nodes
            .iter()
            .map(|n| {
                n.depends_on
                    .iter()
                    .map(|d| {
                        index.get(d).copied().ok_or_else(|| ExecError::InvalidPlan {
                            path: d.to_string(),
                        })
                    })
                    .collect()
            })
            .collect::<Result<_>>()?;

        let mut outputs = Outputs::new();
        let mut states = vec![NodeState::Pending; total];
        let mut statuses: Vec<Option<OutcomeStatus>> = (0..total).map(|_| None).collect();
        let mut join_set: JoinSet<(usize, std::result::Result<BTreeMap<String, Value>, ProvisionError>)> =
            JoinSet::new();
        let mut running = 0usize;
        // Path of the chronologically first failed node, set as failures
        // are observed.
        let mut first_failed: Option<ScopePath> = None;

        loop {
            if first_failed.is_none() {
                for i in 0..total {
                    if self.concurrency.is_some_and(|limit| running >= limit) {
                        break;
                    }
                    let ready = states[i] == NodeState::Pending
                        && deps[i].iter().all(|&d| states[d] == NodeState::Done);
                    if !ready {
                        continue;
                    }

                    // All dependencies are realized, so every reference the
                    // node carries resolves now.
                    let resolved = resolve_node(&plan.nodes[i], &outputs)?;
                    states[i] = NodeState::Running;
                    running += 1;
                    tracing::debug!("realizing {} '{}'", resolved.kind, resolved.path);

                    let provisioner = Arc::clone(&provisioner);
                    join_set.spawn(async move {
                        let result = provisioner.realize(&resolved).await;
                        (i, result)
                    });
                }
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (i, result) = joined.map_err(|e| ExecError::Join(e.to_string()))?;
            running -= 1;
            let node = &plan.nodes[i];

            match result {
                Ok(node_outputs) => {
                    tracing::info!("realized {} '{}'", node.kind, node.path);
                    states[i] = NodeState::Done;
                    outputs.insert(node.path.clone(), node_outputs.clone());
                    statuses[i] = Some(OutcomeStatus::Succeeded {
                        outputs: node_outputs,
                    });
                }
                Err(source) => {
                    let error = RealizationError {
                        node: node.path.clone(),
                        source,
                    };
                    tracing::warn!("{error}");
                    states[i] = NodeState::Failed;
                    if first_failed.is_none() {
                        first_failed = Some(node.path.clone());
                    }
                    statuses[i] = Some(OutcomeStatus::Failed {
                        error: error.to_string(),
                    });
                }
            }
        }

        // Whatever never started was blocked on an incomplete dependency,
        // or only on the short-circuit after the first failure.
        for i in 0..total {
            if states[i] == NodeState::Pending {
                let blocked_on = deps[i]
                    .iter()
                    .find(|&&d| states[d] != NodeState::Done)
                    .map(|&d| plan.nodes[d].path.clone())
                    .or_else(|| first_failed.clone())
                    .unwrap_or_else(|| plan.nodes[i].path.clone());
                statuses[i] = Some(OutcomeStatus::Skipped { blocked_on });
            }
        }

        let all_done = states.iter().all(|&s| s == NodeState::Done);
        let mut stack_outputs = BTreeMap::new();
        if all_done {
            for output in &plan.outputs {
                stack_outputs.insert(output.name.clone(), outputs.resolve_value(&output.value)?);
            }
        }

        let outcomes = plan
            .nodes
            .iter()
            .zip(statuses)
            .map(|(node, status)| NodeOutcome {
                path: node.path.clone(),
                kind: node.kind,
                // Every node was started, finished or marked skipped above.
                status: status.unwrap_or(OutcomeStatus::Skipped {
                    blocked_on: node.path.clone(),
                }),
            })
            .collect();

        let report = ExecutionReport {
            stack: plan.stack.clone(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
            stack_outputs,
            outputs,
        };
        tracing::info!("apply finished for '{}': {report}", plan.stack);
        Ok(report)
    }
}
