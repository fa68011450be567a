use std::process::ExitCode;

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use mutant::Cli;
use mutant::config::Config;
use mutant::context::ProcessContext;
use mutant::env::DefaultBootstrap;
use mutant::expression::DefaultExpressionParser;
use mutant::integration::BuiltinIntegrations;
use mutant::runner::DefaultRunner;

/// Diagnostics go to stderr so stdout only carries `--help`/`--version` output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Entry point for the `mutant` binary.
fn main() -> Result<ExitCode> {
    init_tracing();

    let ctx = ProcessContext::from_env().context("failed to determine working directory")?;
    let args: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let integrations = BuiltinIntegrations::new();
    let expressions = DefaultExpressionParser::new();
    let cli = Cli::new(&integrations, &expressions, &DefaultBootstrap, &DefaultRunner);

    if cli.run(&ctx, Config::default(), &args)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
