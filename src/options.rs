use tracing::debug;

use crate::config::Config;
use crate::context::Context;
use crate::diff::{DiffFilter, HEAD, SubjectFilter};
use crate::error::CliError;
use crate::expression::ExpressionParser;
use crate::integration::IntegrationRegistry;

/// Collaborators an option transform may consult.
pub struct Deps<'a> {
    pub ctx: &'a dyn Context,
    pub integrations: &'a dyn IntegrationRegistry,
    pub expressions: &'a dyn ExpressionParser,
}

/// Takes the current configuration and the option's value (empty for flags).
pub type Transform = fn(&Deps<'_>, Config, &str) -> Result<Config, CliError>;

/// What happens when an option is encountered.
#[derive(Clone, Copy)]
pub enum Action {
    /// Derive a new configuration.
    Apply(Transform),

    /// Print the usage text and exit.
    Help,

    /// Print the version and exit.
    Version,
}

impl Action {
    pub fn is_terminal(self) -> bool {
        matches!(self, Action::Help | Action::Version)
    }
}

/// One row of the option table.
#[derive(Clone, Copy)]
pub struct OptionSpec {
    /// Stable identifier, also used as the clap argument id.
    pub id: &'static str,
    pub short: Option<char>,
    pub long: &'static str,

    /// Placeholder for the value; `None` for flags.
    pub value_name: Option<&'static str>,
    pub action: Action,
}

impl OptionSpec {
    pub fn takes_value(&self) -> bool {
        self.value_name.is_some()
    }
}

impl std::fmt::Debug for OptionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--{}", self.long)
    }
}

/// Every option the command line understands, in usage order.
pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        id: "zombie",
        short: None,
        long: "zombie",
        value_name: None,
        action: Action::Apply(zombie),
    },
    OptionSpec {
        id: "include",
        short: Some('I'),
        long: "include",
        value_name: Some("DIRECTORY"),
        action: Action::Apply(include),
    },
    OptionSpec {
        id: "require",
        short: Some('r'),
        long: "require",
        value_name: Some("NAME"),
        action: Action::Apply(require),
    },
    OptionSpec {
        id: "jobs",
        short: Some('j'),
        long: "jobs",
        value_name: Some("NUMBER"),
        action: Action::Apply(jobs),
    },
    OptionSpec {
        id: "use",
        short: None,
        long: "use",
        value_name: Some("INTEGRATION"),
        action: Action::Apply(use_integration),
    },
    OptionSpec {
        id: "ignore_subject",
        short: None,
        long: "ignore-subject",
        value_name: Some("EXPRESSION"),
        action: Action::Apply(ignore_subject),
    },
    OptionSpec {
        id: "since",
        short: None,
        long: "since",
        value_name: Some("REVISION"),
        action: Action::Apply(since),
    },
    OptionSpec {
        id: "fail_fast",
        short: None,
        long: "fail-fast",
        value_name: None,
        action: Action::Apply(fail_fast),
    },
    OptionSpec {
        id: "print_version",
        short: None,
        long: "version",
        value_name: None,
        action: Action::Version,
    },
    OptionSpec {
        id: "print_help",
        short: Some('h'),
        long: "help",
        value_name: None,
        action: Action::Help,
    },
];

/// How a single token behaves during the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// Help or version; only the first `len` bytes of the token are kept.
    Terminal(usize),

    /// An option whose value is the next token.
    Detached,

    /// Anything else, including options with an attached value.
    Plain,
}

fn shape(token: &str) -> Shape {
    if let Some(long) = token.strip_prefix("--") {
        return match OPTIONS.iter().find(|spec| spec.long == long) {
            Some(spec) if spec.action.is_terminal() => Shape::Terminal(token.len()),
            Some(spec) if spec.takes_value() => Shape::Detached,
            _ => Shape::Plain,
        };
    }

    let Some(cluster) = token.strip_prefix('-') else {
        return Shape::Plain;
    };

    // Short flags may be clustered (`-hx`); the first one taking a value ends
    // the cluster.
    for (at, c) in cluster.char_indices() {
        let end = at + c.len_utf8();
        match OPTIONS.iter().find(|spec| spec.short == Some(c)) {
            Some(spec) if spec.action.is_terminal() => return Shape::Terminal(1 + end),
            Some(spec) if spec.takes_value() => {
                return if end == cluster.len() {
                    Shape::Detached
                } else {
                    Shape::Plain
                };
            }
            Some(_) => {}
            None => return Shape::Plain,
        }
    }

    Shape::Plain
}

/// Split the part of `args` that takes part in parsing into groups: an
/// option together with its detached value, or a single token.
///
/// Scanning stops right after the first help or version flag in option
/// position; nothing behind it is looked at, and a short cluster is cut right
/// after the flag. Detached values are never read as options, so
/// `--require --help` requires a library named `--help`. `--` and everything
/// after it form the last group.
pub fn scan<'a>(args: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut groups = Vec::new();
    let mut rest = args;

    while let Some((&token, tail)) = rest.split_first() {
        if token == "--" {
            groups.push(rest.to_vec());
            break;
        }

        match shape(token) {
            Shape::Terminal(len) => {
                groups.push(vec![&token[..len]]);
                break;
            }
            Shape::Detached => {
                let take = 1 + tail.len().min(1);
                groups.push(rest[..take].to_vec());
                rest = &rest[take..];
            }
            Shape::Plain => {
                groups.push(vec![token]);
                rest = tail;
            }
        }
    }

    groups
}

fn zombie(_: &Deps<'_>, config: Config, _: &str) -> Result<Config, CliError> {
    Ok(config.with_zombie(true))
}

fn include(_: &Deps<'_>, config: Config, directory: &str) -> Result<Config, CliError> {
    Ok(config.with_include(directory))
}

fn require(_: &Deps<'_>, config: Config, name: &str) -> Result<Config, CliError> {
    Ok(config.with_require(name))
}

fn jobs(_: &Deps<'_>, config: Config, number: &str) -> Result<Config, CliError> {
    let jobs = number
        .parse::<usize>()
        .map_err(|_| CliError::InvalidArgument {
            flag: "--jobs".to_string(),
            detail: number.to_string(),
        })?;
    Ok(config.with_jobs(jobs))
}

fn use_integration(deps: &Deps<'_>, config: Config, name: &str) -> Result<Config, CliError> {
    let integration = deps.integrations.lookup(name).map_err(|e| {
        debug!(integration = name, error = %e, "integration lookup failed");
        CliError::InvalidArgument {
            flag: "--use".to_string(),
            detail: format!(
                "Could not load integration \"{name}\" (you may want to try installing the gem mutant-{name})"
            ),
        }
    })?;
    Ok(config.with_integration(integration))
}

fn ignore_subject(deps: &Deps<'_>, config: Config, input: &str) -> Result<Config, CliError> {
    let expression = deps.expressions.parse(input)?;
    Ok(config.map_matcher(|m| m.with_ignore_expression(expression)))
}

fn since(deps: &Deps<'_>, config: Config, revision: &str) -> Result<Config, CliError> {
    let filter = DiffFilter::new(HEAD, revision, deps.ctx);
    Ok(config.map_matcher(|m| m.with_subject_filter(SubjectFilter::Diff(filter))))
}

fn fail_fast(_: &Deps<'_>, config: Config, _: &str) -> Result<Config, CliError> {
    Ok(config.with_fail_fast(true))
}
