//! Storage resources: key-value tables, buckets and image repositories

use stackweave_core::{
    Capability, CompositeHandle, NodeHandle, Properties, Reference, ResourceKind, Result, Stack,
    Value,
};
use std::collections::BTreeMap;

/// Key attribute type of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Number => "number",
            AttributeType::Binary => "binary",
        }
    }
}

/// A named key attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub attr_type: AttributeType,
}

impl Attribute {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attr_type: AttributeType::String,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attr_type: AttributeType::Number,
        }
    }

    fn to_value(&self) -> Value {
        Value::Map(BTreeMap::from([
            ("name".to_string(), Value::from(self.name.clone())),
            ("type".to_string(), Value::from(self.attr_type.as_str())),
        ]))
    }
}

/// A provisioned key-value table.
#[derive(Debug, Clone)]
pub struct Table {
    handle: NodeHandle,
}

#[derive(Debug, Clone)]
pub struct TableProps {
    /// Explicit table name; defaults to the node id.
    pub table_name: Option<String>,

    /// Partition key. Required.
    pub partition_key: Attribute,

    /// Optional sort key.
    pub sort_key: Option<Attribute>,

    /// Provisioned read capacity units (default 2).
    pub read_capacity: Option<i64>,

    /// Provisioned write capacity units (default 2).
    pub write_capacity: Option<i64>,
}

impl TableProps {
    pub fn with_partition_key(partition_key: Attribute) -> Self {
        Self {
            table_name: None,
            partition_key,
            sort_key: None,
            read_capacity: None,
            write_capacity: None,
        }
    }

    pub fn with_sort_key(mut self, sort_key: Attribute) -> Self {
        self.sort_key = Some(sort_key);
        self
    }

    pub fn with_capacity(mut self, rcu: i64, wcu: i64) -> Self {
        self.read_capacity = Some(rcu);
        self.write_capacity = Some(wcu);
        self
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }
}

impl Table {
    /// Declare a table. Registers a `{id}_arn` stack output, and derives
    /// the removal policy from the stack environment (destroy in dev,
    /// retain in prod).
    pub fn new(
        stack: &mut Stack,
        scope: &CompositeHandle,
        id: &str,
        props: TableProps,
    ) -> Result<Self> {
        let mut properties = Properties::new();
        properties.insert(
            "name".to_string(),
            Value::from(props.table_name.unwrap_or_else(|| id.to_string())),
        );
        properties.insert("partition_key".to_string(), props.partition_key.to_value());
        if let Some(sort_key) = &props.sort_key {
            properties.insert("sort_key".to_string(), sort_key.to_value());
        }
        properties.insert(
            "read_capacity".to_string(),
            Value::from(props.read_capacity.unwrap_or(2)),
        );
        properties.insert(
            "write_capacity".to_string(),
            Value::from(props.write_capacity.unwrap_or(2)),
        );
        properties.insert(
            "removal_policy".to_string(),
            Value::from(stack.config().removal_policy().as_str()),
        );

        let handle = stack.add_node(scope, ResourceKind::Table, id, properties)?;
        stack.add_output_with_description(
            format!("{id}_arn"),
            handle.output("arn"),
            format!("{id} table ARN"),
        );
        Ok(Self { handle })
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    pub fn arn(&self) -> Reference {
        self.handle.output("arn")
    }

    pub fn grant_read(&self, stack: &mut Stack, grantee: &NodeHandle) -> Result<()> {
        stack.grant(Capability::Read, &self.handle, grantee)
    }

    pub fn grant_write(&self, stack: &mut Stack, grantee: &NodeHandle) -> Result<()> {
        stack.grant(Capability::Write, &self.handle, grantee)
    }

    pub fn grant_read_write(&self, stack: &mut Stack, grantee: &NodeHandle) -> Result<()> {
        stack.grant(Capability::ReadWrite, &self.handle, grantee)
    }
}

/// An object storage bucket.
#[derive(Debug, Clone)]
pub struct Bucket {
    handle: NodeHandle,
}

#[derive(Debug, Clone, Default)]
pub struct BucketProps {
    /// Explicit bucket name; defaults to the prefixed node id.
    pub bucket_name: Option<String>,
}

impl Bucket {
    pub fn new(
        stack: &mut Stack,
        scope: &CompositeHandle,
        id: &str,
        props: BucketProps,
    ) -> Result<Self> {
        let name = props
            .bucket_name
            .unwrap_or_else(|| stack.config().resource_name(id));
        let mut properties = Properties::new();
        properties.insert("name".to_string(), Value::from(name));
        properties.insert(
            "removal_policy".to_string(),
            Value::from(stack.config().removal_policy().as_str()),
        );

        let handle = stack.add_node(scope, ResourceKind::Bucket, id, properties)?;
        Ok(Self { handle })
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    pub fn arn(&self) -> Reference {
        self.handle.output("arn")
    }

    pub fn grant_put(&self, stack: &mut Stack, grantee: &NodeHandle) -> Result<()> {
        stack.grant(Capability::Put, &self.handle, grantee)
    }

    pub fn grant_read(&self, stack: &mut Stack, grantee: &NodeHandle) -> Result<()> {
        stack.grant(Capability::Read, &self.handle, grantee)
    }
}

/// A container image repository.
#[derive(Debug, Clone)]
pub struct Repository {
    handle: NodeHandle,
}

#[derive(Debug, Clone, Default)]
pub struct RepositoryProps {
    /// Explicit repository name; defaults to the prefixed node id.
    pub repository_name: Option<String>,
}

impl Repository {
    /// Declare a repository. Registers a `{id}_uri` stack output (the
    /// value CI pipelines push to).
    pub fn new(
        stack: &mut Stack,
        scope: &CompositeHandle,
        id: &str,
        props: RepositoryProps,
    ) -> Result<Self> {
        let name = props
            .repository_name
            .unwrap_or_else(|| stack.config().resource_name(id));
        let mut properties = Properties::new();
        properties.insert("name".to_string(), Value::from(name));

        let handle = stack.add_node(scope, ResourceKind::Repository, id, properties)?;
        stack.add_output_with_description(
            format!("{id}_uri"),
            handle.output("uri"),
            "Repository URI",
        );
        Ok(Self { handle })
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    pub fn uri(&self) -> Reference {
        self.handle.output("uri")
    }

    pub fn grant_pull(&self, stack: &mut Stack, grantee: &NodeHandle) -> Result<()> {
        stack.grant(Capability::Pull, &self.handle, grantee)
    }

    pub fn grant_push(&self, stack: &mut Stack, grantee: &NodeHandle) -> Result<()> {
        stack.grant(Capability::Push, &self.handle, grantee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackweave_core::{Environment, StackConfig};

    fn stack(environment: Environment) -> Stack {
        Stack::new(
            "infra",
            StackConfig::new(environment, "app", "us-east-1"),
        )
    }

    #[test]
    fn test_table_defaults_and_output() {
        let mut stack = stack(Environment::Dev);
        let root = stack.root_scope();
        let table = Table::new(
            &mut stack,
            &root,
            "patients",
            TableProps::with_partition_key(Attribute::string("id")),
        )
        .unwrap();

        let node = stack.node(table.handle().path()).unwrap();
        assert_eq!(node.properties.get("read_capacity"), Some(&Value::from(2)));
        assert_eq!(
            node.properties.get("removal_policy"),
            Some(&Value::from("destroy"))
        );
        assert!(stack.outputs().iter().any(|o| o.name == "patients_arn"));
    }

    #[test]
    fn test_prod_table_is_retained() {
        let mut stack = stack(Environment::Prod);
        let root = stack.root_scope();
        let table = Table::new(
            &mut stack,
            &root,
            "records",
            TableProps::with_partition_key(Attribute::string("id"))
                .with_sort_key(Attribute::string("patient_id"))
                .with_capacity(2, 2),
        )
        .unwrap();

        let node = stack.node(table.handle().path()).unwrap();
        assert_eq!(
            node.properties.get("removal_policy"),
            Some(&Value::from("retain"))
        );
        assert!(node.properties.contains_key("sort_key"));
    }
}
