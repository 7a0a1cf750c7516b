//! Stack configuration
//!
//! Configuration is an explicit struct passed once at root construction.
//! Component logic never reads ambient process state (environment
//! variables, current directory) on its own.

use serde::{Deserialize, Serialize};

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Dev => write!(f, "dev"),
            Environment::Prod => write!(f, "prod"),
        }
    }
}

/// What happens to a resource when its declaration is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

impl RemovalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "destroy",
            RemovalPolicy::Retain => "retain",
        }
    }
}

/// Configuration passed once at composite-root construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Deployment environment; drives naming and removal policy defaults.
    pub environment: Environment,

    /// Prefix applied to generated resource names.
    pub prefix: String,

    /// Target region, handed through to the plan for the provisioner.
    pub region: String,
}

impl StackConfig {
    pub fn new(
        environment: Environment,
        prefix: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            prefix: prefix.into(),
            region: region.into(),
        }
    }

    /// Prefixed resource name, e.g. `myproj-task-role`.
    pub fn resource_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.prefix, suffix)
    }

    /// Default removal policy: destroy in dev, retain in prod.
    pub fn removal_policy(&self) -> RemovalPolicy {
        match self.environment {
            Environment::Dev => RemovalPolicy::Destroy,
            Environment::Prod => RemovalPolicy::Retain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_policy_follows_environment() {
        let dev = StackConfig::new(Environment::Dev, "app", "us-east-1");
        let prod = StackConfig::new(Environment::Prod, "app", "us-east-1");

        assert_eq!(dev.removal_policy(), RemovalPolicy::Destroy);
        assert_eq!(prod.removal_policy(), RemovalPolicy::Retain);
        assert_eq!(dev.resource_name("cluster"), "app-cluster");
    }
}
