use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Constant path such as `Foo` or `Foo::Bar::Baz`.
const SCOPE_NAME: &str = r"[A-Z][A-Za-z0-9_]*(?:::[A-Z][A-Za-z0-9_]*)*";

/// Which side of a scope a method lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// `Foo#bar`
    Instance,

    /// `Foo.bar`
    Singleton,
}

impl MethodKind {
    fn symbol(self) -> char {
        match self {
            MethodKind::Instance => '#',
            MethodKind::Singleton => '.',
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "#" => Some(MethodKind::Instance),
            "." => Some(MethodKind::Singleton),
            _ => None,
        }
    }
}

/// Parsed subject-match expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// A single method, for example `Foo::Bar#baz`.
    Method {
        scope: String,
        kind: MethodKind,
        name: String,
    },

    /// All methods of one kind in a scope, for example `Foo::Bar#`.
    Methods { scope: String, kind: MethodKind },

    /// Exactly one namespace, for example `Foo::Bar`.
    Namespace { scope: String },

    /// A namespace and everything nested below it, for example `Foo*`.
    ///
    /// An empty scope (`*`) matches every subject.
    Recursive { scope: String },
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Method { scope, kind, name } => {
                write!(f, "{scope}{}{name}", kind.symbol())
            }
            Expression::Methods { scope, kind } => write!(f, "{scope}{}", kind.symbol()),
            Expression::Namespace { scope } => write!(f, "{scope}"),
            Expression::Recursive { scope } => write!(f, "{scope}*"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Expression: {0:?} is not valid")]
    Invalid(String),
}

/// Turns user input into [`Expression`]s.
pub trait ExpressionParser {
    fn parse(&self, input: &str) -> Result<Expression, ExpressionError>;
}

/// Regex-based parser for the standard expression grammar.
#[derive(Debug, Clone)]
pub struct DefaultExpressionParser {
    method: Regex,
    methods: Regex,
    namespace: Regex,
    recursive: Regex,
}

impl DefaultExpressionParser {
    pub fn new() -> Self {
        // The patterns are fixed strings; a failure here is a programming error.
        let compile = |pattern: String| Regex::new(&pattern).expect("valid expression pattern");

        Self {
            method: compile(format!(
                r"^(?P<scope>{SCOPE_NAME})(?P<symbol>[.#])(?P<name>[^.#*\s]+)$"
            )),
            methods: compile(format!(r"^(?P<scope>{SCOPE_NAME})(?P<symbol>[.#])$")),
            namespace: compile(format!(r"^(?P<scope>{SCOPE_NAME})$")),
            recursive: compile(format!(r"^(?P<scope>{SCOPE_NAME})?\*$")),
        }
    }
}

impl Default for DefaultExpressionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionParser for DefaultExpressionParser {
    fn parse(&self, input: &str) -> Result<Expression, ExpressionError> {
        let invalid = || ExpressionError::Invalid(input.to_string());
        let scope_of = |caps: &regex::Captures<'_>| {
            caps.name("scope")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        if let Some(caps) = self.method.captures(input) {
            let kind = MethodKind::from_symbol(&caps["symbol"]).ok_or_else(invalid)?;
            return Ok(Expression::Method {
                scope: scope_of(&caps),
                kind,
                name: caps["name"].to_string(),
            });
        }

        if let Some(caps) = self.methods.captures(input) {
            let kind = MethodKind::from_symbol(&caps["symbol"]).ok_or_else(invalid)?;
            return Ok(Expression::Methods {
                scope: scope_of(&caps),
                kind,
            });
        }

        if let Some(caps) = self.namespace.captures(input) {
            return Ok(Expression::Namespace {
                scope: scope_of(&caps),
            });
        }

        if let Some(caps) = self.recursive.captures(input) {
            return Ok(Expression::Recursive {
                scope: scope_of(&caps),
            });
        }

        Err(invalid())
    }
}
