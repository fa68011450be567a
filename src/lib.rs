//! Command-line front end of the `mutant` mutation testing tool.
//!
//! [`cli::Cli`] turns raw arguments into a [`config::Config`] and hands it to
//! the bootstrap and runner collaborators. Everything past the configuration
//! (subject discovery, mutation, test execution) sits behind the traits in
//! [`env`], [`runner`] and [`integration`].

pub mod cli;
pub mod config;
pub mod context;
pub mod diff;
pub mod either;
pub mod env;
pub mod error;
pub mod expression;
pub mod integration;
pub mod options;
pub mod runner;

/// Version printed by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use cli::{Cli, USAGE};
pub use config::{Config, MatcherConfig};
pub use either::Either;
