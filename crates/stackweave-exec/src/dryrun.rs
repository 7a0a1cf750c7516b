//! Dry-run provisioner
//!
//! Realizes nothing: fabricates deterministic outputs per kind so plans can
//! be executed end to end (references resolved, reports produced) without
//! touching any provider. Also records the realization order, which the
//! ordering tests rely on.

use crate::error::ProvisionError;
use crate::provisioner::Provisioner;
use async_trait::async_trait;
use stackweave_core::{ScopePath, Value};
use stackweave_plan::ResolvedNode;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub struct DryRunProvisioner {
    region: String,
    order: Mutex<Vec<ScopePath>>,
    fail_on: Option<ScopePath>,
}

impl DryRunProvisioner {
    pub fn new() -> Self {
        Self {
            region: "us-east-1".to_string(),
            order: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Make realization of one node fail (for failure-path tests).
    pub fn with_failure(mut self, path: ScopePath) -> Self {
        self.fail_on = Some(path);
        self
    }

    /// Paths in the order they were realized.
    pub fn realization_order(&self) -> Vec<ScopePath> {
        self.order.lock().map(|o| o.clone()).unwrap_or_default()
    }

    fn fabricate(&self, node: &ResolvedNode, output: &str) -> Value {
        let name = node
            .properties
            .get("name")
            .and_then(Value::as_str)
            .or_else(|| node.path.id())
            .unwrap_or("unnamed")
            .to_string();

        match output {
            "arn" => Value::from(format!(
                "arn:aws:{}:{}:000000000000:{}",
                node.kind, self.region, name
            )),
            "name" => Value::from(name),
            "uri" => Value::from(format!("registry.{}.example.com/{}", self.region, name)),
            "dns_name" => Value::from(format!("{}.lb.{}.example.com", name, self.region)),
            "id" => Value::from(format!("i-{name}")),
            "public_ip" => Value::from("203.0.113.10"),
            other => Value::from(format!("{name}/{other}")),
        }
    }
}

impl Default for DryRunProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provisioner for DryRunProvisioner {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn realize(
        &self,
        node: &ResolvedNode,
    ) -> Result<BTreeMap<String, Value>, ProvisionError> {
        if self.fail_on.as_ref() == Some(&node.path) {
            return Err(ProvisionError::Provider(format!(
                "injected failure for '{}'",
                node.path
            )));
        }

        if let Ok(mut order) = self.order.lock() {
            order.push(node.path.clone());
        }

        Ok(node
            .kind
            .outputs()
            .iter()
            .map(|output| (output.to_string(), self.fabricate(node, output)))
            .collect())
    }
}
