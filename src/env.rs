use std::path::PathBuf;
use std::thread;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::config::Config;
use crate::context::Context;

/// Execution environment produced by bootstrap and consumed by the runner.
#[derive(Debug, Clone)]
pub struct Env {
    /// Configuration the environment was built from.
    pub config: Config,

    /// Include directories resolved against the context root.
    pub load_path: Vec<PathBuf>,

    /// Effective number of kill jobs.
    pub jobs: usize,
}

/// Turns a parsed configuration into an execution environment.
pub trait Bootstrap {
    fn bootstrap(&self, ctx: &dyn Context, config: Config) -> Result<Env>;
}

/// Bootstrap used by the `mutant` binary.
///
/// Missing include directories are reported as errors rather than skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBootstrap;

impl Bootstrap for DefaultBootstrap {
    fn bootstrap(&self, ctx: &dyn Context, config: Config) -> Result<Env> {
        let mut load_path = Vec::with_capacity(config.includes.len());

        for include in &config.includes {
            let dir = ctx.root().join(include);
            if !dir.is_dir() {
                bail!("include directory {:?} does not exist", dir);
            }
            debug!(dir = %dir.display(), "added to load path");
            load_path.push(dir);
        }

        let jobs = match config.jobs {
            Some(jobs) => jobs,
            None => thread::available_parallelism().map_or(1, usize::from),
        };

        let env = Env {
            config,
            load_path,
            jobs,
        };

        env.config.integration.setup(&env)?;

        info!(
            integration = env.config.integration.name(),
            jobs = env.jobs,
            requires = env.config.requires.len(),
            "environment ready"
        );

        Ok(env)
    }
}
