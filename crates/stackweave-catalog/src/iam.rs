//! Identity resources: roles and federated identity providers

use stackweave_core::{
    NodeHandle, Principal, PolicyStatement, Properties, Reference, ResourceKind, Result, Stack,
    CompositeHandle, Value,
};
use std::collections::BTreeMap;

/// An identity role with an assume-role trust principal.
#[derive(Debug, Clone)]
pub struct Role {
    handle: NodeHandle,
}

#[derive(Debug, Clone)]
pub struct RoleProps {
    /// Who may assume the role. Required.
    pub assumed_by: Principal,

    /// Explicit role name; defaults to the prefixed node id.
    pub role_name: Option<String>,

    /// Statements attached at creation.
    pub statements: Vec<PolicyStatement>,
}

impl RoleProps {
    pub fn assumed_by(principal: Principal) -> Self {
        Self {
            assumed_by: principal,
            role_name: None,
            statements: Vec::new(),
        }
    }

    pub fn with_role_name(mut self, name: impl Into<String>) -> Self {
        self.role_name = Some(name.into());
        self
    }

    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statements.push(statement);
        self
    }

    pub fn with_statements(mut self, statements: impl IntoIterator<Item = PolicyStatement>) -> Self {
        self.statements.extend(statements);
        self
    }
}

impl Role {
    pub fn new(
        stack: &mut Stack,
        scope: &CompositeHandle,
        id: &str,
        props: RoleProps,
    ) -> Result<Self> {
        let name = props
            .role_name
            .unwrap_or_else(|| stack.config().resource_name(id));

        let mut properties = Properties::new();
        properties.insert("name".to_string(), Value::from(name));
        properties.insert("assumed_by".to_string(), props.assumed_by.to_value());

        let handle = stack.add_node(scope, ResourceKind::Role, id, properties)?;
        for statement in props.statements {
            stack.add_statement(&handle, statement)?;
        }
        Ok(Self { handle })
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    pub fn arn(&self) -> Reference {
        self.handle.output("arn")
    }

    /// Append a statement to the role's identity policy.
    pub fn add_to_policy(&self, stack: &mut Stack, statement: PolicyStatement) -> Result<()> {
        stack.add_statement(&self.handle, statement)
    }
}

/// A federated (OIDC) identity provider, e.g. for CI pipelines assuming
/// roles via web identity.
#[derive(Debug, Clone)]
pub struct OidcProvider {
    handle: NodeHandle,
}

#[derive(Debug, Clone)]
pub struct OidcProviderProps {
    /// Issuer URL. Required.
    pub url: String,

    /// Accepted client ids (audiences). Required, non-empty.
    pub client_ids: Vec<String>,
}

impl OidcProvider {
    pub fn new(
        stack: &mut Stack,
        scope: &CompositeHandle,
        id: &str,
        props: OidcProviderProps,
    ) -> Result<Self> {
        let mut properties = Properties::new();
        properties.insert("url".to_string(), Value::from(props.url));
        properties.insert(
            "client_ids".to_string(),
            Value::from(
                props
                    .client_ids
                    .into_iter()
                    .map(Value::from)
                    .collect::<Vec<_>>(),
            ),
        );

        let handle = stack.add_node(scope, ResourceKind::OidcProvider, id, properties)?;
        Ok(Self { handle })
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    pub fn arn(&self) -> Reference {
        self.handle.output("arn")
    }
}

/// Trust principal for a CI pipeline of one repository: the provider's
/// subject is restricted to `repo:<path>:*` with the token audience pinned.
pub fn federated_repo_principal(provider: &OidcProvider, repo_path: &str) -> Principal {
    Principal::Federated {
        provider: provider.arn(),
        conditions: BTreeMap::from([
            (
                "subject_pattern".to_string(),
                Value::from(format!("repo:{repo_path}:*")),
            ),
            ("audience".to_string(), Value::from("sts.amazonaws.com")),
        ]),
    }
}
