use anyhow::Result;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::{debug, info};

use crate::VERSION;
use crate::config::Config;
use crate::context::Context;
use crate::either::Either;
use crate::env::Bootstrap;
use crate::error::CliError;
use crate::expression::ExpressionParser;
use crate::integration::IntegrationRegistry;
use crate::options::{Action, Deps, OPTIONS, OptionSpec, scan};
use crate::runner::Runner;

/// Text printed by `--help`.
pub const USAGE: &str = "\
usage: mutant [options] MATCH_EXPRESSION ...
Environment:
        --zombie                     Run mutant zombified
    -I, --include DIRECTORY          Add DIRECTORY to $LOAD_PATH
    -r, --require NAME               Require file with NAME
    -j, --jobs NUMBER                Number of kill jobs. Defaults to number of processors.

Options:
        --use INTEGRATION            Use INTEGRATION to kill mutations
        --ignore-subject EXPRESSION  Ignore subjects that match EXPRESSION as prefix
        --since REVISION              Only select subjects touched since REVISION
        --fail-fast                  Fail fast
        --version                    Print mutants version
    -h, --help                       Show this message";

const MATCH_EXPRESSIONS: &str = "match_expressions";

/// Command line front end: parses arguments and drives bootstrap and runner.
pub struct Cli<'a> {
    integrations: &'a dyn IntegrationRegistry,
    expressions: &'a dyn ExpressionParser,
    bootstrap: &'a dyn Bootstrap,
    runner: &'a dyn Runner,
}

impl<'a> Cli<'a> {
    pub fn new(
        integrations: &'a dyn IntegrationRegistry,
        expressions: &'a dyn ExpressionParser,
        bootstrap: &'a dyn Bootstrap,
        runner: &'a dyn Runner,
    ) -> Self {
        Self {
            integrations,
            expressions,
            bootstrap,
            runner,
        }
    }

    /// Parse `args` on top of `config`.
    ///
    /// Options are applied in command-line order and the first problem wins.
    /// Match expressions are parsed once every option went through.
    /// `--help` and `--version` print, ask `ctx` to exit and still return the
    /// configuration built from the options in front of them.
    pub fn apply<S: AsRef<str>>(
        &self,
        ctx: &dyn Context,
        config: Config,
        args: &[S],
    ) -> Either<String, Config> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let groups = scan(&args);

        let deps = Deps {
            ctx,
            integrations: self.integrations,
            expressions: self.expressions,
        };

        let scanned = match lex(&groups) {
            Ok(matches) => fold(&deps, config, &matches),
            Err(error) => Either::Left(first_error(&deps, config, &groups, &error)),
        };

        scanned
            .and_then(|s| s.finish(&deps))
            .map_left(|e| e.to_string())
    }

    /// Parse, bootstrap and run.
    ///
    /// Returns `Ok(false)` after printing the diagnostic when parsing fails;
    /// bootstrap and runner errors are passed through untouched.
    pub fn run<S: AsRef<str>>(
        &self,
        ctx: &dyn Context,
        config: Config,
        args: &[S],
    ) -> Result<bool> {
        match self.apply(ctx, config, args) {
            Either::Left(message) => {
                ctx.stderr(&message);
                Ok(false)
            }
            Either::Right(config) => {
                info!(
                    integration = config.integration.name(),
                    expressions = config.matcher.match_expressions.len(),
                    "configuration parsed"
                );
                let env = self.bootstrap.bootstrap(ctx, config)?;
                let report = self.runner.run(env)?;
                Ok(report.success())
            }
        }
    }
}

/// Positional or option token in command-line order.
enum Token {
    Option(&'static OptionSpec, String),
    Expression(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Scanning,
    Halted,
}

/// Accumulator threaded through the tokens.
struct Scan {
    config: Config,
    expressions: Vec<String>,
    phase: Phase,
}

impl Scan {
    fn new(config: Config) -> Self {
        Self {
            config,
            expressions: Vec::new(),
            phase: Phase::Scanning,
        }
    }

    fn step(self, deps: &Deps<'_>, token: Token) -> Result<Self, CliError> {
        if self.phase == Phase::Halted {
            return Ok(self);
        }

        match token {
            Token::Expression(input) => {
                let mut expressions = self.expressions;
                expressions.push(input);
                Ok(Self {
                    expressions,
                    ..self
                })
            }
            Token::Option(spec, value) => match spec.action {
                Action::Apply(transform) => {
                    debug!(option = ?spec, value = %value, "applying option");
                    let config = transform(deps, self.config, &value)?;
                    Ok(Self { config, ..self })
                }
                Action::Help => {
                    deps.ctx.stdout(&USAGE);
                    Ok(self.halt(deps.ctx))
                }
                Action::Version => {
                    deps.ctx.stdout(&format_args!("mutant-{VERSION}"));
                    Ok(self.halt(deps.ctx))
                }
            },
        }
    }

    fn halt(self, ctx: &dyn Context) -> Self {
        ctx.exit(0);
        Self {
            phase: Phase::Halted,
            ..self
        }
    }

    /// Parse the collected match expressions into the configuration.
    ///
    /// A halted scan has already answered the user and keeps no expressions.
    fn finish(self, deps: &Deps<'_>) -> Either<CliError, Config> {
        let Scan {
            config,
            expressions,
            phase,
        } = self;

        if phase == Phase::Halted {
            return Either::Right(config);
        }
        if expressions.is_empty() {
            return Either::Left(CliError::NoExpressions);
        }

        let parsed = expressions
            .iter()
            .map(|input| deps.expressions.parse(input))
            .collect::<Result<Vec<_>, _>>();

        match parsed {
            Ok(parsed) => {
                Either::Right(config.map_matcher(|m| m.with_match_expressions(parsed)))
            }
            Err(e) => Either::Left(e.into()),
        }
    }
}

/// clap command generated from the option table.
///
/// clap only lexes: help and version handling belong to the table.
fn command() -> Command {
    let options = OPTIONS.iter().map(|spec| {
        let arg = Arg::new(spec.id).long(spec.long);
        let arg = match spec.short {
            Some(c) => arg.short(c),
            None => arg,
        };
        match spec.value_name {
            Some(name) => arg
                .value_name(name)
                .num_args(1)
                .allow_hyphen_values(true)
                .action(ArgAction::Append),
            None => arg.action(ArgAction::Count),
        }
    });

    Command::new("mutant")
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .args(options)
        .arg(
            Arg::new(MATCH_EXPRESSIONS)
                .value_name("MATCH_EXPRESSION")
                .action(ArgAction::Append),
        )
}

/// Flatten clap matches back into command-line order.
fn tokens(matches: &ArgMatches) -> Vec<Token> {
    let given = |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);
    let mut indexed: Vec<(usize, Token)> = Vec::new();

    for spec in OPTIONS.iter().filter(|spec| given(spec.id)) {
        let Some(indices) = matches.indices_of(spec.id) else {
            continue;
        };

        if spec.takes_value() {
            let values = matches.get_many::<String>(spec.id).into_iter().flatten();
            indexed.extend(
                indices
                    .zip(values)
                    .map(|(i, v)| (i, Token::Option(spec, v.clone()))),
            );
        } else {
            indexed.extend(indices.map(|i| (i, Token::Option(spec, String::new()))));
        }
    }

    if given(MATCH_EXPRESSIONS) {
        if let (Some(indices), Some(values)) = (
            matches.indices_of(MATCH_EXPRESSIONS),
            matches.get_many::<String>(MATCH_EXPRESSIONS),
        ) {
            indexed.extend(
                indices
                    .zip(values)
                    .map(|(i, v)| (i, Token::Expression(v.clone()))),
            );
        }
    }

    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, token)| token).collect()
}

/// Lex the scanned groups with clap.
fn lex(groups: &[Vec<&str>]) -> Result<ArgMatches, clap::Error> {
    command().try_get_matches_from(groups.iter().flatten().copied())
}

/// Run the option tokens in command-line order.
fn fold(deps: &Deps<'_>, config: Config, matches: &ArgMatches) -> Either<CliError, Scan> {
    tokens(matches)
        .into_iter()
        .fold(Either::Right(Scan::new(config)), |scan, token| {
            scan.and_then(|s| Either::from(s.step(deps, token)))
        })
}

/// Find the group clap rejects and report it, unless an option in front of
/// that group fails first.
fn first_error(
    deps: &Deps<'_>,
    config: Config,
    groups: &[Vec<&str>],
    error: &clap::Error,
) -> CliError {
    let (at, kind) = (1..groups.len())
        .find_map(|len| lex(&groups[..len]).err().map(|e| (len - 1, e.kind())))
        .unwrap_or((groups.len().saturating_sub(1), error.kind()));

    if let Ok(matches) = lex(&groups[..at]) {
        if let Either::Left(earlier) = fold(deps, config, &matches) {
            return earlier;
        }
    }

    let token = groups
        .get(at)
        .and_then(|group| group.first())
        .copied()
        .unwrap_or_default();
    debug!(token, kind = ?kind, "clap rejected argument");
    clap_error(kind, token)
}

/// Map a clap lexing error for `token` onto the command-line diagnostics.
fn clap_error(kind: ErrorKind, token: &str) -> CliError {
    match kind {
        ErrorKind::UnknownArgument => CliError::InvalidOption(token.to_string()),
        // A flag that takes no value was given one: `--fail-fast=yes`.
        ErrorKind::TooManyValues | ErrorKind::NoEquals => {
            match token.split_once('=') {
                Some((flag, value)) => CliError::InvalidArgument {
                    flag: flag.to_string(),
                    detail: value.to_string(),
                },
                None => CliError::InvalidOption(token.to_string()),
            }
        }
        _ => CliError::MissingArgument(token.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::RecordingContext;
    use crate::diff::{DiffFilter, SubjectFilter};
    use crate::env::Env;
    use crate::expression::{DefaultExpressionParser, Expression};
    use crate::integration::{BuiltinIntegrations, Integration, NullIntegration, TestResult};
    use crate::runner::Report;
    use std::cell::RefCell;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    struct Rspec;

    impl Integration for Rspec {
        fn name(&self) -> &str {
            "rspec"
        }

        fn call(&self, _env: &Env) -> anyhow::Result<TestResult> {
            Ok(TestResult {
                passed: true,
                output: String::new(),
                duration: Duration::ZERO,
            })
        }
    }

    /// Bootstrap and runner doubles that record every call.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
        bootstrapped: RefCell<Option<Config>>,
        ran: RefCell<Option<Env>>,
        success: bool,
    }

    impl Bootstrap for Recorder {
        fn bootstrap(&self, _ctx: &dyn Context, config: Config) -> anyhow::Result<Env> {
            self.calls.borrow_mut().push("bootstrap".to_string());
            *self.bootstrapped.borrow_mut() = Some(config.clone());
            Ok(Env {
                config,
                load_path: Vec::new(),
                jobs: 7,
            })
        }
    }

    impl Runner for Recorder {
        fn run(&self, env: Env) -> anyhow::Result<Report> {
            self.calls.borrow_mut().push("runner".to_string());
            *self.ran.borrow_mut() = Some(env.clone());
            let mut report = Report::new(&env, NullIntegration.call(&env)?);
            report.test_result.passed = self.success;
            Ok(report)
        }
    }

    struct Fixture {
        ctx: RecordingContext,
        integrations: BuiltinIntegrations,
        expressions: DefaultExpressionParser,
        recorder: Recorder,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ctx: RecordingContext::new(),
                integrations: BuiltinIntegrations::new().with(Arc::new(Rspec)),
                expressions: DefaultExpressionParser::new(),
                recorder: Recorder {
                    success: true,
                    ..Recorder::default()
                },
            }
        }

        fn cli(&self) -> Cli<'_> {
            Cli::new(
                &self.integrations,
                &self.expressions,
                &self.recorder,
                &self.recorder,
            )
        }

        fn apply(&self, args: &[&str]) -> Either<String, Config> {
            self.cli().apply(&self.ctx, Config::default(), args)
        }

        fn parsed(&self, args: &[&str]) -> Config {
            match self.apply(args) {
                Either::Right(config) => config,
                Either::Left(message) => panic!("expected {args:?} to parse, got {message:?}"),
            }
        }

        fn rejected(&self, args: &[&str]) -> String {
            match self.apply(args) {
                Either::Left(message) => message,
                Either::Right(config) => panic!("expected {args:?} to fail, got {config:?}"),
            }
        }
    }

    fn expr(input: &str) -> Expression {
        DefaultExpressionParser::new().parse(input).unwrap()
    }

    #[test]
    fn unknown_options_are_rejected_wherever_they_appear() {
        let f = Fixture::new();

        assert_eq!(f.rejected(&["--foo", "Foo*"]), "invalid option: --foo");
        assert_eq!(
            f.rejected(&["--zombie", "Foo*", "--foo"]),
            "invalid option: --foo"
        );
        assert_eq!(
            f.rejected(&["--jobs", "2", "-x", "--fail-fast", "Foo*"]),
            "invalid option: -x"
        );
        assert_eq!(
            f.rejected(&["--bogus", "--help"]),
            "invalid option: --bogus"
        );
        assert!(f.ctx.out().is_empty());
        assert!(f.ctx.exits().is_empty());
    }

    #[test]
    fn option_errors_win_over_malformed_expressions() {
        let f = Fixture::new();
        assert_eq!(
            f.rejected(&["bar", "--jobs", "many"]),
            "invalid argument: --jobs many"
        );
    }

    #[test]
    fn first_problem_wins_between_bad_values_and_unknown_options() {
        let f = Fixture::new();

        assert_eq!(
            f.rejected(&["--jobs", "many", "--bogus", "Foo*"]),
            "invalid argument: --jobs many"
        );
        assert_eq!(
            f.rejected(&["--bogus", "--jobs", "many", "Foo*"]),
            "invalid option: --bogus"
        );
        assert_eq!(
            f.rejected(&["--use", "other", "Foo*", "--include"]),
            "invalid argument: --use Could not load integration \"other\" \
             (you may want to try installing the gem mutant-other)"
        );
    }

    #[test]
    fn unknown_options_are_reported_as_written() {
        let f = Fixture::new();
        assert_eq!(
            f.rejected(&["--foo=bar", "Foo*"]),
            "invalid option: --foo=bar"
        );
    }

    #[test]
    fn values_given_to_flags_are_invalid_arguments() {
        let f = Fixture::new();

        assert_eq!(
            f.rejected(&["--fail-fast=yes", "Foo*"]),
            "invalid argument: --fail-fast yes"
        );
        assert_eq!(
            f.rejected(&["--zombie", "--zombie=1", "Foo*"]),
            "invalid argument: --zombie 1"
        );
    }

    #[test]
    fn includes_and_requires_keep_order_and_duplicates() {
        let f = Fixture::new();
        let config = f.parsed(&[
            "--include", "foo", "-I", "bar", "--include=foo", "--require", "foo", "-r", "bar",
            "Foo*",
        ]);

        assert_eq!(config.includes, vec!["foo", "bar", "foo"]);
        assert_eq!(config.requires, vec!["foo", "bar"]);
    }

    #[test]
    fn jobs_accepts_zero_and_rejects_garbage() {
        let f = Fixture::new();

        assert_eq!(f.parsed(&["--jobs", "0", "Foo*"]).jobs, Some(0));
        assert_eq!(f.parsed(&["-j", "4", "Foo*"]).jobs, Some(4));
        assert_eq!(f.parsed(&["Foo*"]).jobs, None);
        assert_eq!(
            f.rejected(&["--jobs", "many", "Foo*"]),
            "invalid argument: --jobs many"
        );
        assert_eq!(
            f.rejected(&["--jobs", "-1", "Foo*"]),
            "invalid argument: --jobs -1"
        );
    }

    #[test]
    fn boolean_flags_default_to_the_baseline() {
        let f = Fixture::new();

        let plain = f.parsed(&["Foo*"]);
        assert!(!plain.fail_fast);
        assert!(!plain.zombie);

        let set = f.parsed(&["--fail-fast", "--zombie", "Foo*"]);
        assert!(set.fail_fast);
        assert!(set.zombie);

        let baseline = Config::default().with_fail_fast(true);
        let kept = match f.cli().apply(&f.ctx, baseline, &["Foo*"]) {
            Either::Right(config) => config,
            Either::Left(message) => panic!("{message}"),
        };
        assert!(kept.fail_fast);
    }

    #[test]
    fn use_sets_the_looked_up_integration() {
        let f = Fixture::new();
        let config = f.parsed(&["--use", "rspec", "Foo*"]);
        assert_eq!(config.integration.name(), "rspec");
    }

    #[test]
    fn use_reports_unknown_integrations() {
        let f = Fixture::new();
        assert_eq!(
            f.rejected(&["--use", "other", "Foo*"]),
            "invalid argument: --use Could not load integration \"other\" \
             (you may want to try installing the gem mutant-other)"
        );
    }

    #[test]
    fn ignore_subject_parses_expressions() {
        let f = Fixture::new();
        let config = f.parsed(&["--ignore-subject", "Foo#bar", "--ignore-subject", "Baz*", "Foo*"]);

        assert_eq!(
            config.matcher.ignore_expressions,
            vec![expr("Foo#bar"), expr("Baz*")]
        );
        assert_eq!(
            f.rejected(&["--ignore-subject", "foo", "Foo*"]),
            r#"Expression: "foo" is not valid"#
        );
    }

    #[test]
    fn since_adds_a_diff_filter_from_head() {
        let f = Fixture::new();
        let config = f.parsed(&["--since", "master", "Foo*"]);

        assert_eq!(
            config.matcher.subject_filters,
            vec![SubjectFilter::Diff(DiffFilter::new("HEAD", "master", &f.ctx))]
        );
    }

    #[test]
    fn match_expressions_are_required_and_parsed_in_order() {
        let f = Fixture::new();

        assert_eq!(f.rejected(&[]), "No expressions given");
        assert_eq!(f.rejected(&["--zombie"]), "No expressions given");
        assert_eq!(
            f.rejected(&["Foo*", "bar"]),
            r#"Expression: "bar" is not valid"#
        );

        let config = f.parsed(&["Foo*", "--zombie", "Bar#baz"]);
        assert_eq!(
            config.matcher.match_expressions,
            vec![expr("Foo*"), expr("Bar#baz")]
        );
    }

    #[test]
    fn double_dash_ends_option_processing() {
        let f = Fixture::new();
        assert_eq!(
            f.rejected(&["--", "--help"]),
            r#"Expression: "--help" is not valid"#
        );
        assert!(f.ctx.exits().is_empty());
    }

    #[test]
    fn value_flags_without_value_are_missing_arguments() {
        let f = Fixture::new();
        assert_eq!(f.rejected(&["Foo*", "--include"]), "missing argument: --include");
    }

    #[test]
    fn help_prints_usage_exits_once_and_keeps_earlier_options() {
        let f = Fixture::new();
        let config = f.parsed(&["--zombie", "-I", "lib", "Foo*", "--help", "--bogus", "-j", "x"]);

        assert_eq!(f.ctx.out(), vec![USAGE]);
        assert_eq!(f.ctx.exits(), vec![0]);
        assert!(f.ctx.err().is_empty());

        assert!(config.zombie);
        assert_eq!(config.includes, vec!["lib"]);
        assert_eq!(config.jobs, None);
        assert!(config.matcher.match_expressions.is_empty());
    }

    #[test]
    fn help_wins_over_malformed_expressions_in_front_of_it() {
        let f = Fixture::new();
        let config = f.parsed(&["bar", "--help"]);

        assert_eq!(f.ctx.out(), vec![USAGE]);
        assert_eq!(f.ctx.exits(), vec![0]);
        assert!(config.matcher.match_expressions.is_empty());

        let f = Fixture::new();
        assert!(f.apply(&["bar", "--version"]).is_right());
        assert_eq!(f.ctx.exits(), vec![0]);
    }

    #[test]
    fn help_at_the_start_of_a_short_cluster_is_terminal() {
        let f = Fixture::new();
        f.parsed(&["-hx", "Foo*"]);

        assert_eq!(f.ctx.out(), vec![USAGE]);
        assert_eq!(f.ctx.exits(), vec![0]);
        assert!(f.ctx.err().is_empty());
    }

    #[test]
    fn help_alone_needs_no_expressions() {
        let f = Fixture::new();
        let config = f.parsed(&["-h"]);

        assert!(config.matcher.match_expressions.is_empty());
        assert_eq!(f.ctx.exits(), vec![0]);
    }

    #[test]
    fn version_prints_name_and_version_then_exits() {
        let f = Fixture::new();
        let config = f.parsed(&["--fail-fast", "--version", "--help"]);

        assert_eq!(f.ctx.out(), vec![format!("mutant-{VERSION}")]);
        assert_eq!(f.ctx.exits(), vec![0]);
        assert!(config.fail_fast);
    }

    #[test]
    fn run_stops_at_parse_errors() {
        let f = Fixture::new();

        let ok = f.cli().run(&f.ctx, Config::default(), &[] as &[&str]).unwrap();

        assert!(!ok);
        assert_eq!(f.ctx.err(), vec!["No expressions given"]);
        assert!(f.recorder.calls.borrow().is_empty());
    }

    #[test]
    fn run_threads_values_through_bootstrap_and_runner() {
        let f = Fixture::new();

        let ok = f
            .cli()
            .run(&f.ctx, Config::default(), &["--jobs", "3", "TestApp*"])
            .unwrap();

        assert!(ok);
        assert_eq!(*f.recorder.calls.borrow(), vec!["bootstrap", "runner"]);
        assert!(f.ctx.err().is_empty());

        let bootstrapped = f.recorder.bootstrapped.borrow().clone().unwrap();
        assert_eq!(bootstrapped.jobs, Some(3));
        assert_eq!(
            bootstrapped.matcher.match_expressions,
            vec![expr("TestApp*")]
        );

        let ran = f.recorder.ran.borrow().clone().unwrap();
        assert_eq!(ran.jobs, 7);
        assert_eq!(ran.config.jobs, Some(3));
    }

    #[test]
    fn run_returns_the_report_verdict() {
        let f = Fixture {
            recorder: Recorder {
                success: false,
                ..Recorder::default()
            },
            ..Fixture::new()
        };

        let ok = f.cli().run(&f.ctx, Config::default(), &["TestApp*"]).unwrap();
        assert!(!ok);
        assert_eq!(*f.recorder.calls.borrow(), vec!["bootstrap", "runner"]);
    }

    #[test]
    fn run_propagates_bootstrap_failures() {
        struct Failing;

        impl Bootstrap for Failing {
            fn bootstrap(&self, _ctx: &dyn Context, _config: Config) -> anyhow::Result<Env> {
                anyhow::bail!("cannot load environment")
            }
        }

        let f = Fixture::new();
        let cli = Cli::new(&f.integrations, &f.expressions, &Failing, &f.recorder);

        let err = cli.run(&f.ctx, Config::default(), &["TestApp*"]).unwrap_err();
        assert_eq!(err.to_string(), "cannot load environment");
        assert!(f.recorder.calls.borrow().is_empty());
    }
}
