use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::env::Env;

/// Result of asking an integration to run the test suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    /// Did every selected test pass?
    pub passed: bool,

    /// Human-readable output captured from the test run.
    pub output: String,

    /// How long the run took.
    pub duration: Duration,
}

/// Pluggable way of executing the target test suite.
pub trait Integration: fmt::Debug + Send + Sync {
    /// Name the integration is registered under (`--use NAME`).
    fn name(&self) -> &str;

    /// Prepare the integration for a run. Called once by bootstrap.
    fn setup(&self, _env: &Env) -> Result<()> {
        Ok(())
    }

    /// Run the tests selected for `env`.
    fn call(&self, env: &Env) -> Result<TestResult>;
}

/// Integration that runs nothing and always passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIntegration;

impl Integration for NullIntegration {
    fn name(&self) -> &str {
        "null"
    }

    fn call(&self, _env: &Env) -> Result<TestResult> {
        Ok(TestResult {
            passed: true,
            output: String::new(),
            duration: Duration::ZERO,
        })
    }
}

/// Finds integrations by name.
pub trait IntegrationRegistry {
    fn lookup(&self, name: &str) -> Result<Arc<dyn Integration>>;
}

/// Registry of integrations compiled into the binary.
#[derive(Debug, Clone)]
pub struct BuiltinIntegrations {
    entries: BTreeMap<String, Arc<dyn Integration>>,
}

impl BuiltinIntegrations {
    /// Registry holding only the null integration.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
        .with(Arc::new(NullIntegration))
    }

    /// Register `integration` under its own name, replacing any previous entry.
    pub fn with(mut self, integration: Arc<dyn Integration>) -> Self {
        self.entries
            .insert(integration.name().to_string(), integration);
        self
    }
}

impl Default for BuiltinIntegrations {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationRegistry for BuiltinIntegrations {
    fn lookup(&self, name: &str) -> Result<Arc<dyn Integration>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("no integration named {name:?} is registered"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Failing;

    impl Integration for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn call(&self, _env: &Env) -> Result<TestResult> {
            Ok(TestResult {
                passed: false,
                output: "1 failure".to_string(),
                duration: Duration::from_millis(5),
            })
        }
    }

    #[test]
    fn builtin_registry_knows_null() {
        let registry = BuiltinIntegrations::new();

        assert_eq!(registry.lookup("null").unwrap().name(), "null");
    }

    #[test]
    fn unknown_integration_is_an_error() {
        let registry = BuiltinIntegrations::new();
        let err = registry.lookup("rspec").unwrap_err();
        assert_eq!(err.to_string(), r#"no integration named "rspec" is registered"#);
    }

    #[test]
    fn registered_integrations_are_shared() {
        let failing: Arc<dyn Integration> = Arc::new(Failing);
        let registry = BuiltinIntegrations::new().with(failing.clone());

        let found = registry.lookup("failing").unwrap();
        assert!(Arc::ptr_eq(&found, &failing));
        assert_eq!(registry.lookup("null").unwrap().name(), "null");
    }
}
