//! Graph builder / planner
//!
//! Flattens the composite tree, derives the dependency edge set and emits
//! nodes in topological order via a three-color depth-first traversal.

use crate::plan::{OrderedPlan, PlannedNode};
use stackweave_core::{GraphError, Node, Reference, Result, ScopePath, Stack};
use std::collections::BTreeMap;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Compute the ordered plan for a stack.
///
/// Fails, without partial output, on:
/// - a reference or `depends_on` naming a node that is not in the graph
///   ([`GraphError::UnresolvedReference`]),
/// - a reference naming an output its source kind never produces
///   ([`GraphError::UnknownOutput`]),
/// - any dependency cycle ([`GraphError::CyclicDependency`], reporting the
///   node-id sequence around the cycle).
pub fn plan(stack: &Stack) -> Result<OrderedPlan> {
    let nodes = stack.nodes();
    let index: BTreeMap<&ScopePath, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, (path, _))| (path, i))
        .collect();

    // Derive edges: referenced -> referrer, one dependency list per node.
    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(nodes.len());
    for (path, node) in &nodes {
        let mut node_deps = Vec::new();
        for reference in collect_refs(node) {
            let dep = validate_reference(&reference, &index, &nodes)?;
            if !node_deps.contains(&dep) {
                node_deps.push(dep);
            }
        }
        for explicit in &node.depends_on {
            let dep = *index
                .get(explicit)
                .ok_or_else(|| GraphError::UnresolvedReference {
                    path: explicit.to_string(),
                })?;
            if !node_deps.contains(&dep) {
                node_deps.push(dep);
            }
        }
        tracing::trace!("node '{}' depends on {} node(s)", path, node_deps.len());
        deps.push(node_deps);
    }

    // Stack-level outputs may reference nodes too; validate them the same
    // way, they just do not order anything.
    for output in stack.outputs() {
        let mut refs = Vec::new();
        output.value.walk_refs(&mut |r| refs.push(r.clone()));
        for reference in refs {
            validate_reference(&reference, &index, &nodes)?;
        }
    }

    // Three-color DFS, deps first, so pushing a node after its dependencies
    // yields a valid topological order. Roots are visited in declaration
    // order, keeping the output deterministic.
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    let mut trail = Vec::new();
    for i in 0..nodes.len() {
        visit(i, &deps, &mut marks, &mut order, &mut trail, &nodes)?;
    }

    let planned = order
        .into_iter()
        .map(|i| {
            let (path, node) = &nodes[i];
            PlannedNode {
                path: path.clone(),
                kind: node.kind,
                properties: node.properties.clone(),
                depends_on: deps[i].iter().map(|&d| nodes[d].0.clone()).collect(),
                attached_policy: node.attached_policy.clone(),
                resource_policy: node.resource_policy.clone(),
            }
        })
        .collect::<Vec<_>>();

    let plan = OrderedPlan {
        stack: stack.name().to_string(),
        config: stack.config().clone(),
        nodes: planned,
        outputs: stack.outputs().to_vec(),
    };
    tracing::debug!("planned stack '{}': {}", stack.name(), plan.summary());
    Ok(plan)
}

fn collect_refs(node: &Node) -> Vec<Reference> {
    let mut refs = Vec::new();
    let mut push = |r: &Reference| refs.push(r.clone());
    for value in node.properties.values() {
        value.walk_refs(&mut push);
    }
    for statement in node.attached_policy.iter().chain(&node.resource_policy) {
        statement.walk_refs(&mut push);
    }
    refs
}

fn validate_reference(
    reference: &Reference,
    index: &BTreeMap<&ScopePath, usize>,
    nodes: &[(ScopePath, &Node)],
) -> Result<usize> {
    let dep = *index
        .get(&reference.source)
        .ok_or_else(|| GraphError::UnresolvedReference {
            path: reference.source.to_string(),
        })?;
    let kind = nodes[dep].1.kind;
    if !kind.has_output(&reference.output) {
        return Err(GraphError::UnknownOutput {
            path: reference.source.to_string(),
            output: reference.output.clone(),
        });
    }
    Ok(dep)
}

fn visit(
    i: usize,
    deps: &[Vec<usize>],
    marks: &mut [Mark],
    order: &mut Vec<usize>,
    trail: &mut Vec<usize>,
    nodes: &[(ScopePath, &Node)],
) -> Result<()> {
    match marks[i] {
        Mark::Done => return Ok(()),
        Mark::InProgress => {
            // Back-edge: the cycle is the trail from the first occurrence
            // of this node, closed by repeating it.
            let start = trail.iter().position(|&t| t == i).unwrap_or(0);
            let mut cycle: Vec<String> = trail[start..]
                .iter()
                .map(|&t| nodes[t].0.to_string())
                .collect();
            cycle.push(nodes[i].0.to_string());
            return Err(GraphError::CyclicDependency { cycle });
        }
        Mark::Unvisited => {}
    }

    marks[i] = Mark::InProgress;
    trail.push(i);
    for &dep in &deps[i] {
        visit(dep, deps, marks, order, trail, nodes)?;
    }
    trail.pop();
    marks[i] = Mark::Done;
    order.push(i);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackweave_core::{
        Capability, Environment, Principal, Properties, ResourceKind, Stack, StackConfig, Value,
    };

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
    fn test_plan_orders_every_edge() {
        let mut stack = stack();
        let root = stack.root_scope();
        let cluster = stack
            .add_node(&root, ResourceKind::Cluster, "backend", Properties::new())
            .unwrap();
        let role = stack
            .add_node(&root, ResourceKind::Role, "task-role", role_props())
            .unwrap();
        let service = stack
            .add_node(
                &root,
                ResourceKind::Service,
                "api",
                Properties::from([
                    ("cluster".to_string(), Value::Ref(cluster.output("arn"))),
                    ("image".to_string(), Value::from("registry/backend:1.0")),
                    ("task_role".to_string(), Value::Ref(role.output("arn"))),
                ]),
            )
            .unwrap();

        let plan = plan(&stack).unwrap();
        assert_eq!(plan.len(), 3);

        let pos = |h: &stackweave_core::NodeHandle| plan.position(h.path()).unwrap();
        assert!(pos(&cluster) < pos(&service));
        assert!(pos(&role) < pos(&service));

        let planned = plan.get(service.path()).unwrap();
        assert_eq!(planned.depends_on.len(), 2);
    }

    #[test]
    fn test_grant_orders_table_before_role() {
        let mut stack = stack();
        let root = stack.root_scope();
        let role = stack
            .add_node(&root, ResourceKind::Role, "task-role", role_props())
            .unwrap();
        let table = stack
            .add_node(&root, ResourceKind::Table, "patients", table_props())
            .unwrap();

        // The grant stores the table's ARN on the role's policy, so the
        // table must be realized before the role's policy is written.
        stack.grant(Capability::ReadWrite, &table, &role).unwrap();

        let plan = plan(&stack).unwrap();
        assert!(plan.position(table.path()).unwrap() < plan.position(role.path()).unwrap());
    }

    #[test]
    fn test_reference_to_absent_node_fails() {
        let mut stack = stack();
        let root = stack.root_scope();
        let table = stack
            .add_node(&root, ResourceKind::Table, "patients", table_props())
            .unwrap();
        // Handle to a node that is never added to the graph.
        let ghost = Reference::new(["storage", "records"].into(), "arn");
        stack
            .add_node(
                &root,
                ResourceKind::Service,
                "api",
                Properties::from([
                    ("cluster".to_string(), Value::Ref(ghost)),
                    ("image".to_string(), Value::from("registry/backend:1.0")),
                    ("table".to_string(), Value::Ref(table.output("arn"))),
                ]),
            )
            .unwrap();

        let err = plan(&stack).unwrap_err();
        match err {
            GraphError::UnresolvedReference { path } => assert_eq!(path, "storage/records"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_output_fails() {
        let mut stack = stack();
        let root = stack.root_scope();
        let table = stack
            .add_node(&root, ResourceKind::Table, "patients", table_props())
            .unwrap();
        stack
            .add_node(
                &root,
                ResourceKind::Service,
                "api",
                Properties::from([
                    ("cluster".to_string(), Value::Ref(table.output("dns_name"))),
                    ("image".to_string(), Value::from("registry/backend:1.0")),
                ]),
            )
            .unwrap();

        let err = plan(&stack).unwrap_err();
        assert!(matches!(err, GraphError::UnknownOutput { .. }));
    }

    #[test]
    fn test_mutual_depends_on_reports_cycle() {
        let mut stack = stack();
        let root = stack.root_scope();
        let x = stack
            .add_node(&root, ResourceKind::Bucket, "x", Properties::new())
            .unwrap();
        let y = stack
            .add_node(&root, ResourceKind::Bucket, "y", Properties::new())
            .unwrap();
        stack.depends_on(&x, &y).unwrap();
        stack.depends_on(&y, &x).unwrap();

        let err = plan(&stack).unwrap_err();
        match err {
            GraphError::CyclicDependency { cycle } => {
                assert_eq!(cycle, vec!["x", "y", "x"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_independent_nodes_all_planned() {
        let mut stack = stack();
        let root = stack.root_scope();
        for id in ["a", "b", "c", "d"] {
            stack
                .add_node(&root, ResourceKind::Bucket, id, Properties::new())
                .unwrap();
        }

        let plan = plan(&stack).unwrap();
        assert_eq!(plan.len(), 4);
        assert!(plan.nodes.iter().all(|n| n.depends_on.is_empty()));
    }

    #[test]
    fn test_stack_output_reference_is_validated() {
        let mut stack = stack();
        stack.add_output(
            "repository_uri",
            Value::Ref(Reference::new(["repo"].into(), "uri")),
        );

        let err = plan(&stack).unwrap_err();
        assert!(matches!(err, GraphError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_plan_roundtrips_through_json_artifact() {
        let mut stack = stack();
        let root = stack.root_scope();
        let table = stack
            .add_node(&root, ResourceKind::Table, "patients", table_props())
            .unwrap();
        stack.add_output("patients_arn", Value::Ref(table.output("arn")));

        let plan = plan(&stack).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("plan.json");
        std::fs::write(&artifact, plan.to_json().unwrap()).unwrap();

        let json = std::fs::read_to_string(&artifact).unwrap();
        let back = OrderedPlan::from_json(&json).unwrap();
        assert_eq!(back.len(), plan.len());
        assert_eq!(back.nodes[0].path, plan.nodes[0].path);
    }
}
