//! Compliance resources: managed account-level rules evaluated against the
//! deployed resources

use stackweave_core::{
    CompositeHandle, NodeHandle, Properties, ResourceKind, Result, Stack, Value,
};

/// A single managed compliance rule, identified by the evaluator it runs.
#[derive(Debug, Clone)]
pub struct ManagedRule {
    handle: NodeHandle,
}

#[derive(Debug, Clone)]
pub struct ManagedRuleProps {
    /// Identifier of the managed evaluator. Required.
    pub identifier: String,

    /// Explicit rule name; defaults to the prefixed node id.
    pub rule_name: Option<String>,

    /// Input parameters handed to the evaluator.
    pub parameters: Properties,
}

impl ManagedRuleProps {
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            rule_name: None,
            parameters: Properties::new(),
        }
    }

    pub fn with_rule_name(mut self, name: impl Into<String>) -> Self {
        self.rule_name = Some(name.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

impl ManagedRule {
    pub fn new(
        stack: &mut Stack,
        scope: &CompositeHandle,
        id: &str,
        props: ManagedRuleProps,
    ) -> Result<Self> {
        let name = props
            .rule_name
            .unwrap_or_else(|| stack.config().resource_name(id));

        let mut properties = Properties::new();
        properties.insert("name".to_string(), Value::from(name));
        properties.insert("identifier".to_string(), Value::from(props.identifier));
        if !props.parameters.is_empty() {
            properties.insert("parameters".to_string(), Value::Map(props.parameters));
        }

        let handle = stack.add_node(scope, ResourceKind::Rule, id, properties)?;
        Ok(Self { handle })
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }
}

/// The baseline rule set applied to every deployment: credential rotation,
/// network exposure, table autoscaling, audit-trail integrity and
/// delivery, bucket exposure and log encryption checks.
///
/// Rules only observe the account; they reference no node in the graph, so
/// they plan as an independent subtree.
#[derive(Debug, Clone)]
pub struct ComplianceRules {
    scope: CompositeHandle,
    rules: Vec<ManagedRule>,
}

impl ComplianceRules {
    pub fn new(stack: &mut Stack, parent: &CompositeHandle, id: &str) -> Result<Self> {
        let scope = stack.composite(parent, id)?;

        let definitions: [(&str, ManagedRuleProps); 8] = [
            (
                "access-key-rotation",
                ManagedRuleProps::with_identifier("ACCESS_KEYS_ROTATED")
                    .with_parameter("max_access_key_age", 60),
            ),
            (
                "ssh-restricted",
                ManagedRuleProps::with_identifier("INCOMING_SSH_DISABLED"),
            ),
            (
                "table-autoscaling",
                ManagedRuleProps::with_identifier("TABLE_AUTOSCALING_ENABLED"),
            ),
            (
                "audit-trail",
                ManagedRuleProps::with_identifier("AUDIT_TRAIL_ENABLED"),
            ),
            (
                "audit-trail-validation",
                ManagedRuleProps::with_identifier("AUDIT_TRAIL_LOG_VALIDATION_ENABLED"),
            ),
            (
                "audit-trail-log-delivery",
                ManagedRuleProps::with_identifier("AUDIT_TRAIL_LOG_DELIVERY_ENABLED"),
            ),
            (
                "public-bucket",
                ManagedRuleProps::with_identifier("BUCKET_PUBLIC_READ_PROHIBITED"),
            ),
            (
                "log-group-encryption",
                ManagedRuleProps::with_identifier("LOG_GROUP_ENCRYPTED"),
            ),
        ];

        let mut rules = Vec::with_capacity(definitions.len());
        for (rule_id, props) in definitions {
            rules.push(ManagedRule::new(stack, &scope, rule_id, props)?);
        }
        tracing::debug!("declared {} compliance rule(s) under '{}'", rules.len(), scope.path());

        Ok(Self { scope, rules })
    }

    pub fn scope(&self) -> &CompositeHandle {
        &self.scope
    }

    pub fn rules(&self) -> &[ManagedRule] {
        &self.rules
    }
}
