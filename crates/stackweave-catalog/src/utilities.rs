//! Utility resources: functions with their execution role and log group

use crate::iam::{Role, RoleProps};
use stackweave_core::{
    Capability, CompositeHandle, NodeHandle, PolicyStatement, Principal, Properties, Reference,
    ResourceKind, Result, Stack, Value,
};
use std::collections::BTreeMap;

const FUNCTION_PRINCIPAL: &str = "functions.compute.internal";

#[derive(Debug, Clone, Default)]
pub struct FunctionProps {
    /// Entry point (default `index.handler`).
    pub handler: Option<String>,

    /// Runtime identifier (default `node20`).
    pub runtime: Option<String>,

    /// Timeout in seconds (default 10).
    pub timeout_seconds: Option<i64>,

    /// Environment variables handed to the function.
    pub environment: BTreeMap<String, Value>,
}

impl FunctionProps {
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

/// A managed function with its own execution role and log group.
#[derive(Debug, Clone)]
pub struct Function {
    handle: NodeHandle,
    role: Role,
    log_group: NodeHandle,
}

impl Function {
    pub fn new(
        stack: &mut Stack,
        parent: &CompositeHandle,
        id: &str,
        props: FunctionProps,
    ) -> Result<Self> {
        let scope = stack.composite(parent, id)?;
        let config = stack.config().clone();
        let name = config.resource_name(id);

        let role = Role::new(
            stack,
            &scope,
            "execution-role",
            RoleProps::assumed_by(Principal::Service(FUNCTION_PRINCIPAL.to_string()))
                .with_role_name(config.resource_name(&format!("{id}-execution-role")))
                .with_statement(
                    PolicyStatement::allow()
                        .with_actions(["logs:CreateLogStream", "logs:PutLogEvents"])
                        .with_all_resources(),
                ),
        )?;

        let log_group = stack.add_node(
            &scope,
            ResourceKind::LogGroup,
            "logs",
            Properties::from([
                (
                    "name".to_string(),
                    Value::from(format!("/functions/{name}")),
                ),
                ("retention_days".to_string(), Value::from(7)),
                ("removal_policy".to_string(), Value::from("destroy")),
            ]),
        )?;

        let mut properties = Properties::from([
            ("name".to_string(), Value::from(name)),
            (
                "handler".to_string(),
                Value::from(props.handler.unwrap_or_else(|| "index.handler".to_string())),
            ),
            (
                "runtime".to_string(),
                Value::from(props.runtime.unwrap_or_else(|| "node20".to_string())),
            ),
            (
                "timeout_seconds".to_string(),
                Value::from(props.timeout_seconds.unwrap_or(10)),
            ),
            ("role".to_string(), Value::Ref(role.arn())),
            ("log_group".to_string(), Value::Ref(log_group.output("arn"))),
        ]);
        if !props.environment.is_empty() {
            properties.insert("environment".to_string(), Value::Map(props.environment));
        }

        let handle = stack.add_node(&scope, ResourceKind::Function, "function", properties)?;
        Ok(Self {
            handle,
            role,
            log_group,
        })
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn log_group(&self) -> &NodeHandle {
        &self.log_group
    }

    pub fn arn(&self) -> Reference {
        self.handle.output("arn")
    }

    /// Allow a principal to invoke this function.
    pub fn grant_invoke(&self, stack: &mut Stack, grantee: &NodeHandle) -> Result<()> {
        stack.grant(Capability::Invoke, &self.handle, grantee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackweave_core::{Environment, StackConfig};

    #[test]
    fn test_function_declares_role_and_log_group() {
        let mut stack = Stack::new(
            "infra",
            StackConfig::new(Environment::Dev, "app", "us-east-1"),
        );
        let root = stack.root_scope();
        let function = Function::new(
            &mut stack,
            &root,
            "alert",
            FunctionProps::default().with_env("WEBHOOK_URL", "https://hooks.example.com/T000"),
        )
        .unwrap();

        let node = stack.node(function.handle().path()).unwrap();
        assert_eq!(
            node.properties.get("handler"),
            Some(&Value::from("index.handler"))
        );
        assert!(node.properties.get("role").unwrap().has_refs());
        assert!(node.properties.contains_key("environment"));
        assert_eq!(function.handle().path().to_string(), "alert/function");
    }
}
