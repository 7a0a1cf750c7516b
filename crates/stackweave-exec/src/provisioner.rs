//! Provisioner trait definition

use crate::error::ProvisionError;
use async_trait::async_trait;
use stackweave_core::Value;
use stackweave_plan::ResolvedNode;
use std::collections::BTreeMap;

/// Provisioning backend abstraction.
///
/// A provisioner turns one resolved node into an actual resource and
/// returns the outputs the node's kind promises. The engine decides *what*
/// to create and *in what order*; the provisioner owns the how, including
/// any retry policy.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Backend name (e.g. "dry-run").
    fn name(&self) -> &str;

    /// Realize a single node. Called only once per node, and only after
    /// every dependency of the node has been realized.
    async fn realize(
        &self,
        node: &ResolvedNode,
    ) -> Result<BTreeMap<String, Value>, ProvisionError>;
}
