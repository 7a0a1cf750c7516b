//! Plans a full deployment: two tables, a load-balanced backend service,
//! an image repository, CI pipeline roles over an OIDC provider, a build
//! agent, an alerting function and the baseline compliance rules. Checks
//! the emitted ordering end to end.

use stackweave_catalog::{
    Attribute, BucketProps, BuildAgent, BuildAgentProps, Bucket, ClusterProps, ComplianceRules,
    Function, FunctionProps, OidcProvider, OidcProviderProps, Repository, RepositoryProps, Role,
    RoleProps, ServiceCluster, Table, TableProps, federated_repo_principal,
};
use stackweave_core::{Environment, ScopePath, Stack, StackConfig, Value};
use stackweave_plan::plan;

struct Infra {
    stack: Stack,
    patients: Table,
    records: Table,
    backend: ServiceCluster,
    repository: Repository,
    provider: OidcProvider,
    backend_pipeline: Role,
    frontend_pipeline: Role,
    agent: BuildAgent,
    alert: Function,
    compliance: ComplianceRules,
}

fn declare() -> Infra {
    let mut stack = Stack::new(
        "infra",
        StackConfig::new(Environment::Dev, "clcm", "us-east-1"),
    );
    let root = stack.root_scope();

    let storage = stack.composite(&root, "storage").unwrap();
    let patients = Table::new(
        &mut stack,
        &storage,
        "patients",
        TableProps::with_partition_key(Attribute::string("id"))
            .with_table_name("Patients")
            .with_capacity(2, 2),
    )
    .unwrap();
    let records = Table::new(
        &mut stack,
        &storage,
        "records",
        TableProps::with_partition_key(Attribute::string("id"))
            .with_sort_key(Attribute::string("patient_id"))
            .with_table_name("Records"),
    )
    .unwrap();

    let backend = ServiceCluster::new(
        &mut stack,
        &root,
        "backend",
        ClusterProps::with_image("registry/backend:1.0")
            .with_certificate("arn:aws:certificate:us-east-1:000000000000:api"),
    )
    .unwrap();

    patients
        .grant_read_write(&mut stack, backend.task_role().handle())
        .unwrap();
    records
        .grant_read_write(&mut stack, backend.task_role().handle())
        .unwrap();

    let repository = Repository::new(&mut stack, &root, "backend-repo", RepositoryProps::default())
        .unwrap();

    let pipelines = stack.composite(&root, "pipelines").unwrap();
    let provider = OidcProvider::new(
        &mut stack,
        &pipelines,
        "github",
        OidcProviderProps {
            url: "https://token.actions.githubusercontent.com".to_string(),
            client_ids: vec!["sts.amazonaws.com".to_string()],
        },
    )
    .unwrap();

    let backend_pipeline = Role::new(
        &mut stack,
        &pipelines,
        "backend-pipeline-role",
        RoleProps::assumed_by(federated_repo_principal(&provider, "acme/backend"))
            .with_role_name("clcm-backend-pipeline-role")
            .with_statements(backend.deployment_statements()),
    )
    .unwrap();
    repository
        .grant_push(&mut stack, backend_pipeline.handle())
        .unwrap();

    let frontend_bucket = Bucket::new(&mut stack, &pipelines, "frontend", BucketProps::default())
        .unwrap();
    let frontend_pipeline = Role::new(
        &mut stack,
        &pipelines,
        "frontend-pipeline-role",
        RoleProps::assumed_by(federated_repo_principal(&provider, "acme/frontend"))
            .with_role_name("clcm-frontend-pipeline-role"),
    )
    .unwrap();
    frontend_bucket
        .grant_put(&mut stack, frontend_pipeline.handle())
        .unwrap();

    let agent = BuildAgent::new(
        &mut stack,
        &root,
        "build",
        BuildAgentProps {
            statements: backend.deployment_statements(),
            ..Default::default()
        },
    )
    .unwrap();

    let alert = Function::new(
        &mut stack,
        &root,
        "alert",
        FunctionProps::default().with_env("WEBHOOK_URL", "https://hooks.example.com/T000"),
    )
    .unwrap();

    let compliance = ComplianceRules::new(&mut stack, &root, "compliance").unwrap();

    stack.add_output_with_description(
        "backend_pipeline_role_arn",
        backend_pipeline.arn(),
        "Backend pipeline role ARN",
    );
    stack.add_output_with_description(
        "frontend_pipeline_role_arn",
        frontend_pipeline.arn(),
        "Frontend pipeline role ARN",
    );

    Infra {
        stack,
        patients,
        records,
        backend,
        repository,
        provider,
        backend_pipeline,
        frontend_pipeline,
        agent,
        alert,
        compliance,
    }
}

#[test]
fn test_plan_covers_every_declared_node() {
    let infra = declare();
    let declared = infra.stack.nodes().len();
    let plan = plan(&infra.stack).unwrap();
    assert_eq!(plan.len(), declared);
}

#[test]
fn test_every_dependency_edge_is_ordered() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();

    for (position, node) in plan.nodes.iter().enumerate() {
        for dep in &node.depends_on {
            let dep_position = plan.position(dep).unwrap();
            assert!(
                dep_position < position,
                "'{}' must come before '{}'",
                dep,
                node.path
            );
        }
    }
}

#[test]
fn test_tables_precede_the_granted_task_role() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();

    let task_role = plan
        .position(infra.backend.task_role().handle().path())
        .unwrap();
    assert!(plan.position(infra.patients.handle().path()).unwrap() < task_role);
    assert!(plan.position(infra.records.handle().path()).unwrap() < task_role);
}

#[test]
fn test_identity_provider_precedes_pipeline_roles() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();

    let provider = plan.position(infra.provider.handle().path()).unwrap();
    assert!(provider < plan.position(infra.backend_pipeline.handle().path()).unwrap());
    assert!(provider < plan.position(infra.frontend_pipeline.handle().path()).unwrap());
}

#[test]
fn test_service_chain_is_ordered() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();

    let cluster = plan.position(infra.backend.cluster().path()).unwrap();
    let service = plan.position(infra.backend.service().path()).unwrap();
    let load_balancer = plan.position(infra.backend.load_balancer().path()).unwrap();
    let execution_role = plan
        .position(infra.backend.execution_role().handle().path())
        .unwrap();

    assert!(cluster < service);
    assert!(execution_role < service);
    assert!(service < load_balancer);
}

#[test]
fn test_repository_precedes_the_pushing_pipeline_role() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();

    assert!(
        plan.position(infra.repository.handle().path()).unwrap()
            < plan.position(infra.backend_pipeline.handle().path()).unwrap()
    );
}

#[test]
fn test_build_agent_waits_for_deployment_targets() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();

    // The agent role's deployment statements reference the service and the
    // task roles, so all of them must be realized first.
    let agent_role = plan.position(infra.agent.role().handle().path()).unwrap();
    assert!(plan.position(infra.backend.service().path()).unwrap() < agent_role);
    assert!(
        plan.position(infra.backend.task_role().handle().path()).unwrap() < agent_role
    );
}

#[test]
fn test_alert_function_is_self_contained() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();

    let function = plan.get(infra.alert.handle().path()).unwrap();
    let scope: ScopePath = ["alert"].into();
    assert!(
        function
            .depends_on
            .iter()
            .all(|dep| dep.segments().starts_with(scope.segments())),
        "the alert function must only depend on its own composite"
    );
}

#[test]
fn test_compliance_rules_plan_as_an_independent_subtree() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();

    for rule in infra.compliance.rules() {
        let planned = plan.get(rule.handle().path()).unwrap();
        assert!(planned.depends_on.is_empty());
    }
}

#[test]
fn test_plan_artifact_serializes_with_outputs() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();

    let json = plan.to_json().unwrap();
    assert!(json.contains("backend_pipeline_role_arn"));
    assert!(json.contains("patients_arn"));

    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(
        parsed["nodes"].as_array().unwrap().len(),
        plan.len()
    );
}

#[test]
fn test_summary_counts_kinds() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();
    let summary = plan.summary();

    // task, execution, two pipelines, agent, alert execution role
    assert_eq!(summary.kinds.get("role"), Some(&6));
    assert_eq!(summary.kinds.get("table"), Some(&2));
    assert_eq!(summary.kinds.get("oidc_provider"), Some(&1));
    assert_eq!(summary.kinds.get("rule"), Some(&8));
    assert!(summary.edges > 0);
}

#[test]
fn test_output_values_keep_reference_shape() {
    let infra = declare();
    let plan = plan(&infra.stack).unwrap();

    let output = plan
        .outputs
        .iter()
        .find(|o| o.name == "backend_load_balancer_dns")
        .unwrap();
    match &output.value {
        Value::Ref(reference) => assert_eq!(reference.output, "dns_name"),
        other => panic!("expected a reference, got {other:?}"),
    }
}
