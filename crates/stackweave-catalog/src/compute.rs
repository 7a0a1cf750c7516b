//! Compute resources: container cluster with a load-balanced service, and
//! a standalone build-agent instance

use crate::iam::{Role, RoleProps};
use stackweave_core::{
    CompositeHandle, NodeHandle, PolicyStatement, Principal, Properties, Reference, Result, Stack,
    ResourceKind, Value,
};

/// Principal service names used by compute resources.
const TASK_PRINCIPAL: &str = "tasks.compute.internal";
const INSTANCE_PRINCIPAL: &str = "instances.compute.internal";

/// Statement letting a role write its log streams.
fn logging_statement() -> PolicyStatement {
    PolicyStatement::allow()
        .with_actions([
            "logs:CreateLogGroup",
            "logs:CreateLogStream",
            "logs:PutLogEvents",
        ])
        .with_all_resources()
}

/// Statement letting the execution role pull task images.
fn registry_pull_statement() -> PolicyStatement {
    PolicyStatement::allow()
        .with_actions([
            "registry:GetAuthorizationToken",
            "registry:BatchCheckLayerAvailability",
            "registry:GetDownloadUrlForLayer",
            "registry:BatchGetImage",
        ])
        .with_all_resources()
}

#[derive(Debug, Clone)]
pub struct ClusterProps {
    /// Container image for the backend task. Required.
    pub image: String,

    /// Capacity instance type (default `t2.micro`).
    pub instance_type: Option<String>,

    /// Desired capacity instances (default 1).
    pub desired_capacity: Option<i64>,

    /// Task memory limit in MiB (default 128).
    pub memory_limit_mib: Option<i64>,

    /// Container port (default 80).
    pub container_port: Option<i64>,

    /// Load balancer listener port (default 80).
    pub listener_port: Option<i64>,

    /// TLS certificate for an additional secure listener.
    pub certificate_arn: Option<String>,
}

impl ClusterProps {
    pub fn with_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            instance_type: None,
            desired_capacity: None,
            memory_limit_mib: None,
            container_port: None,
            listener_port: None,
            certificate_arn: None,
        }
    }

    pub fn with_certificate(mut self, arn: impl Into<String>) -> Self {
        self.certificate_arn = Some(arn.into());
        self
    }

    pub fn with_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = Some(instance_type.into());
        self
    }
}

/// A container cluster running one load-balanced service.
///
/// Declares, inside its own composite scope: a task role and an execution
/// role (with logging and image-pull statements), a log group, the cluster,
/// the service and its load balancer. Also assembles the deployment policy
/// statements a CI pipeline needs to roll the service, so callers can hand
/// them to pipeline roles without coupling to the individual nodes.
#[derive(Debug, Clone)]
pub struct ServiceCluster {
    scope: CompositeHandle,
    cluster: NodeHandle,
    service: NodeHandle,
    load_balancer: NodeHandle,
    task_role: Role,
    execution_role: Role,
    log_group: NodeHandle,
    deployment_statements: Vec<PolicyStatement>,
}

impl ServiceCluster {
    pub fn new(
        stack: &mut Stack,
        parent: &CompositeHandle,
        id: &str,
        props: ClusterProps,
    ) -> Result<Self> {
        let scope = stack.composite(parent, id)?;
        let config = stack.config().clone();

        let execution_role = Role::new(
            stack,
            &scope,
            "execution-role",
            RoleProps::assumed_by(Principal::Service(TASK_PRINCIPAL.to_string()))
                .with_role_name(config.resource_name("task-execution-role"))
                .with_statement(logging_statement())
                .with_statement(registry_pull_statement()),
        )?;

        let task_role = Role::new(
            stack,
            &scope,
            "task-role",
            RoleProps::assumed_by(Principal::Service(TASK_PRINCIPAL.to_string()))
                .with_role_name(config.resource_name("task-role"))
                .with_statement(logging_statement()),
        )?;

        let log_group = stack.add_node(
            &scope,
            ResourceKind::LogGroup,
            "logs",
            Properties::from([
                (
                    "name".to_string(),
                    Value::from(config.resource_name(&format!("{id}-logs"))),
                ),
                ("removal_policy".to_string(), Value::from("destroy")),
            ]),
        )?;

        let cluster = stack.add_node(
            &scope,
            ResourceKind::Cluster,
            "cluster",
            Properties::from([
                (
                    "name".to_string(),
                    Value::from(config.resource_name("cluster")),
                ),
                (
                    "instance_type".to_string(),
                    Value::from(props.instance_type.unwrap_or_else(|| "t2.micro".to_string())),
                ),
                (
                    "desired_capacity".to_string(),
                    Value::from(props.desired_capacity.unwrap_or(1)),
                ),
            ]),
        )?;

        let service = stack.add_node(
            &scope,
            ResourceKind::Service,
            "service",
            Properties::from([
                (
                    "name".to_string(),
                    Value::from(config.resource_name(&format!("{id}-service"))),
                ),
                ("cluster".to_string(), Value::Ref(cluster.output("arn"))),
                ("image".to_string(), Value::from(props.image)),
                (
                    "memory_limit_mib".to_string(),
                    Value::from(props.memory_limit_mib.unwrap_or(128)),
                ),
                (
                    "container_port".to_string(),
                    Value::from(props.container_port.unwrap_or(80)),
                ),
                ("desired_count".to_string(), Value::from(1)),
                ("task_role".to_string(), Value::Ref(task_role.arn())),
                (
                    "execution_role".to_string(),
                    Value::Ref(execution_role.arn()),
                ),
                ("log_group".to_string(), Value::Ref(log_group.output("arn"))),
            ]),
        )?;

        let mut lb_properties = Properties::from([
            ("service".to_string(), Value::Ref(service.output("arn"))),
            (
                "listener_port".to_string(),
                Value::from(props.listener_port.unwrap_or(80)),
            ),
            ("public".to_string(), Value::from(true)),
        ]);
        if let Some(certificate_arn) = props.certificate_arn {
            lb_properties.insert("certificate_arn".to_string(), Value::from(certificate_arn));
        }
        let load_balancer =
            stack.add_node(&scope, ResourceKind::LoadBalancer, "load-balancer", lb_properties)?;

        let deployment_statements = vec![
            PolicyStatement::allow()
                .with_sid("RegisterTaskDefinition")
                .with_actions(["compute:RegisterTaskDefinition"])
                .with_all_resources(),
            PolicyStatement::allow()
                .with_sid("PassRolesInTaskDefinition")
                .with_actions(["iam:PassRole"])
                .with_resource(Value::Ref(task_role.arn()))
                .with_resource(Value::Ref(execution_role.arn())),
            PolicyStatement::allow()
                .with_sid("DeployService")
                .with_actions(["compute:UpdateService", "compute:DescribeServices"])
                .with_resource(Value::Ref(service.output("arn"))),
            PolicyStatement::allow()
                .with_sid("DescribeTaskDefinition")
                .with_actions([
                    "compute:DescribeTaskDefinition",
                    "compute:ListTasks",
                    "compute:DescribeTasks",
                    "compute:DescribeContainerInstances",
                ])
                .with_all_resources(),
            PolicyStatement::allow()
                .with_sid("PushImageLayers")
                .with_actions([
                    "registry:GetAuthorizationToken",
                    "registry:BatchCheckLayerAvailability",
                    "registry:GetDownloadUrlForLayer",
                    "registry:BatchGetImage",
                    "registry:InitiateLayerUpload",
                    "registry:UploadLayerPart",
                    "registry:CompleteLayerUpload",
                    "registry:PutImage",
                ])
                .with_all_resources(),
        ];

        stack.add_output_with_description(
            format!("{id}_load_balancer_dns"),
            load_balancer.output("dns_name"),
            "Load balancer DNS",
        );
        stack.add_output_with_description(
            format!("{id}_cluster_name"),
            cluster.output("name"),
            "Cluster name",
        );
        stack.add_output_with_description(
            format!("{id}_service_name"),
            service.output("name"),
            "Service name",
        );

        tracing::debug!("declared service cluster '{}'", scope.path());
        Ok(Self {
            scope,
            cluster,
            service,
            load_balancer,
            task_role,
            execution_role,
            log_group,
            deployment_statements,
        })
    }

    pub fn scope(&self) -> &CompositeHandle {
        &self.scope
    }

    pub fn cluster(&self) -> &NodeHandle {
        &self.cluster
    }

    pub fn service(&self) -> &NodeHandle {
        &self.service
    }

    pub fn load_balancer(&self) -> &NodeHandle {
        &self.load_balancer
    }

    pub fn task_role(&self) -> &Role {
        &self.task_role
    }

    pub fn execution_role(&self) -> &Role {
        &self.execution_role
    }

    pub fn log_group(&self) -> &NodeHandle {
        &self.log_group
    }

    pub fn dns_name(&self) -> Reference {
        self.load_balancer.output("dns_name")
    }

    /// Statements a deployment pipeline needs to roll this service.
    pub fn deployment_statements(&self) -> Vec<PolicyStatement> {
        self.deployment_statements.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildAgentProps {
    /// Instance type (default `t2.micro`).
    pub instance_type: Option<String>,

    /// Optional SSH key pair name.
    pub key_pair: Option<String>,

    /// Port the agent UI listens on (default 8080).
    pub ingress_port: Option<i64>,

    /// Statements attached to the instance role (typically the cluster's
    /// deployment statements).
    pub statements: Vec<PolicyStatement>,
}

/// A standalone build-agent instance with its own instance role.
#[derive(Debug, Clone)]
pub struct BuildAgent {
    instance: NodeHandle,
    role: Role,
}

impl BuildAgent {
    pub fn new(
        stack: &mut Stack,
        parent: &CompositeHandle,
        id: &str,
        props: BuildAgentProps,
    ) -> Result<Self> {
        let scope = stack.composite(parent, id)?;
        let config = stack.config().clone();

        let role = Role::new(
            stack,
            &scope,
            "role",
            RoleProps::assumed_by(Principal::Service(INSTANCE_PRINCIPAL.to_string()))
                .with_statements(props.statements)
                // The agent stores its initial admin secret as a parameter
                // on first boot.
                .with_statement(
                    PolicyStatement::allow()
                        .with_actions(["params:PutParameter"])
                        .with_all_resources(),
                ),
        )?;

        let mut properties = Properties::from([
            (
                "name".to_string(),
                Value::from(config.resource_name(&format!("{id}-instance"))),
            ),
            (
                "instance_type".to_string(),
                Value::from(props.instance_type.unwrap_or_else(|| "t2.micro".to_string())),
            ),
            ("role".to_string(), Value::Ref(role.arn())),
            (
                "ingress_port".to_string(),
                Value::from(props.ingress_port.unwrap_or(8080)),
            ),
        ]);
        if let Some(key_pair) = props.key_pair {
            properties.insert("key_pair".to_string(), Value::from(key_pair));
        }

        let instance = stack.add_node(&scope, ResourceKind::Instance, "instance", properties)?;
        tracing::debug!("declared build agent '{}'", instance.path());
        Ok(Self { instance, role })
    }

    pub fn instance(&self) -> &NodeHandle {
        &self.instance
    }

    pub fn role(&self) -> &Role {
        &self.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackweave_core::{Environment, StackConfig};

    #[test]
    fn test_service_cluster_wires_roles_into_service() {
        let mut stack = Stack::new(
            "infra",
            StackConfig::new(Environment::Dev, "app", "us-east-1"),
        );
        let root = stack.root_scope();
        let cluster = ServiceCluster::new(
            &mut stack,
            &root,
            "backend",
            ClusterProps::with_image("registry/backend:1.0"),
        )
        .unwrap();

        let service = stack.node(cluster.service().path()).unwrap();
        assert!(service.properties.get("task_role").unwrap().has_refs());
        assert!(service.properties.get("execution_role").unwrap().has_refs());
        assert!(service.properties.get("log_group").unwrap().has_refs());

        // Execution role carries logging plus image-pull statements.
        let execution_role = stack.node(cluster.execution_role().handle().path()).unwrap();
        assert_eq!(execution_role.attached_policy.len(), 2);

        // Deployment statements reference the roles and the service.
        let statements = cluster.deployment_statements();
        assert_eq!(statements.len(), 5);
        assert!(statements.iter().any(|s| {
            let mut has = false;
            s.walk_refs(&mut |_| has = true);
            has && s.sid.as_deref() == Some("PassRolesInTaskDefinition")
        }));

        // The image statement covers pushing, not just pulling: pipelines
        // deploy freshly built images.
        let image = statements
            .iter()
            .find(|s| s.sid.as_deref() == Some("PushImageLayers"))
            .unwrap();
        assert!(image.actions.contains("registry:PutImage"));
        assert!(image.actions.contains("registry:BatchGetImage"));
    }

    #[test]
    fn test_build_agent_role_carries_deployment_statements() {
        let mut stack = Stack::new(
            "infra",
            StackConfig::new(Environment::Dev, "app", "us-east-1"),
        );
        let root = stack.root_scope();
        let backend = ServiceCluster::new(
            &mut stack,
            &root,
            "backend",
            ClusterProps::with_image("registry/backend:1.0"),
        )
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

        let role = stack.node(agent.role().handle().path()).unwrap();
        // 5 deployment statements + the parameter-store statement.
        assert_eq!(role.attached_policy.len(), 6);
        let instance = stack.node(agent.instance().path()).unwrap();
        assert!(instance.properties.get("role").unwrap().has_refs());
    }
}
