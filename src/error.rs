use thiserror::Error;

use crate::expression::ExpressionError;

/// Problems found while turning arguments into a configuration.
///
/// The `Display` form of each variant is the exact one-line diagnostic
/// printed to the error stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid argument: {flag} {detail}")]
    InvalidArgument { flag: String, detail: String },

    #[error("missing argument: {0}")]
    MissingArgument(String),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("No expressions given")]
    NoExpressions,
}
