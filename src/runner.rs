use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::env::Env;
use crate::integration::TestResult;

/// Outcome of a run handed back to the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Tool name, stable across versions.
    pub tool: &'static str,

    /// Current crate version.
    pub version: &'static str,

    /// Integration that executed the tests.
    pub integration: String,

    /// Effective number of kill jobs.
    pub jobs: usize,

    /// Match expressions the run was scoped to, in expression syntax.
    pub match_expressions: Vec<String>,

    /// Result reported by the integration.
    pub test_result: TestResult,
}

impl Report {
    pub fn new(env: &Env, test_result: TestResult) -> Self {
        Self {
            tool: "mutant",
            version: crate::VERSION,
            integration: env.config.integration.name().to_string(),
            jobs: env.jobs,
            match_expressions: env
                .config
                .matcher
                .match_expressions
                .iter()
                .map(ToString::to_string)
                .collect(),
            test_result,
        }
    }

    /// Whether the run should be treated as a success by the caller.
    pub fn success(&self) -> bool {
        self.test_result.passed
    }
}

/// Executes a bootstrapped environment.
pub trait Runner {
    fn run(&self, env: Env) -> Result<Report>;
}

/// Runner used by the `mutant` binary: hands the environment to its integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRunner;

impl Runner for DefaultRunner {
    fn run(&self, env: Env) -> Result<Report> {
        let integration = env.config.integration.clone();
        let test_result = integration.call(&env)?;

        let report = Report::new(&env, test_result);

        info!(
            integration = %report.integration,
            success = report.success(),
            duration_ms = report.test_result.duration.as_millis() as u64,
            "run finished"
        );
        if let Ok(json) = serde_json::to_string(&report) {
            debug!(report = %json, "run report");
        }

        Ok(report)
    }
}
