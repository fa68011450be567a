use std::sync::Arc;

use crate::diff::SubjectFilter;
use crate::expression::Expression;
use crate::integration::{Integration, NullIntegration};

/// Settings that select which subjects take part in a run.
#[derive(Debug, Clone, Default)]
pub struct MatcherConfig {
    /// Expressions given as positional arguments.
    pub match_expressions: Vec<Expression>,

    /// Expressions from repeated `--ignore-subject`.
    pub ignore_expressions: Vec<Expression>,

    /// Extra subject filters, for example from `--since`.
    pub subject_filters: Vec<SubjectFilter>,
}

impl MatcherConfig {
    pub fn with_match_expressions(self, match_expressions: Vec<Expression>) -> Self {
        Self {
            match_expressions,
            ..self
        }
    }

    pub fn with_ignore_expression(self, expression: Expression) -> Self {
        let mut ignore_expressions = self.ignore_expressions;
        ignore_expressions.push(expression);
        Self {
            ignore_expressions,
            ..self
        }
    }

    pub fn with_subject_filter(self, filter: SubjectFilter) -> Self {
        let mut subject_filters = self.subject_filters;
        subject_filters.push(filter);
        Self {
            subject_filters,
            ..self
        }
    }
}

/// Run configuration assembled from the command line.
///
/// Values are never changed in place: every `with_*` method consumes the
/// configuration and returns a new one with a single field replaced.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directories added to the load path, in command-line order.
    pub includes: Vec<String>,

    /// Libraries to require, in command-line order.
    pub requires: Vec<String>,

    /// Number of kill jobs. `None` lets the runner decide.
    pub jobs: Option<usize>,

    /// Stop at the first alive mutation.
    pub fail_fast: bool,

    /// Run the tool against itself.
    pub zombie: bool,

    /// How tests are executed.
    pub integration: Arc<dyn Integration>,

    /// Subject selection.
    pub matcher: MatcherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            requires: Vec::new(),
            jobs: None,
            fail_fast: false,
            zombie: false,
            integration: Arc::new(NullIntegration),
            matcher: MatcherConfig::default(),
        }
    }
}

impl Config {
    pub fn with_include(self, directory: impl Into<String>) -> Self {
        let mut includes = self.includes;
        includes.push(directory.into());
        Self { includes, ..self }
    }

    pub fn with_require(self, name: impl Into<String>) -> Self {
        let mut requires = self.requires;
        requires.push(name.into());
        Self { requires, ..self }
    }

    pub fn with_jobs(self, jobs: usize) -> Self {
        Self {
            jobs: Some(jobs),
            ..self
        }
    }

    pub fn with_fail_fast(self, fail_fast: bool) -> Self {
        Self { fail_fast, ..self }
    }

    pub fn with_zombie(self, zombie: bool) -> Self {
        Self { zombie, ..self }
    }

    pub fn with_integration(self, integration: Arc<dyn Integration>) -> Self {
        Self {
            integration,
            ..self
        }
    }

    /// Apply `f` to the nested matcher configuration.
    pub fn map_matcher(self, f: impl FnOnce(MatcherConfig) -> MatcherConfig) -> Self {
        let matcher = f(self.matcher);
        Self { matcher, ..self }
    }
}
