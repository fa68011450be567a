use std::path::PathBuf;

use crate::context::Context;

/// Revision every `--since` comparison starts from.
pub const HEAD: &str = "HEAD";

/// Selects subjects touched between two git revisions.
///
/// The comparison itself belongs to the repository layer; this value only
/// records what to compare and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFilter {
    pub from: String,
    pub to: String,

    /// Working tree the revisions are resolved in.
    pub root: PathBuf,
}

impl DiffFilter {
    pub fn new(from: impl Into<String>, to: impl Into<String>, ctx: &dyn Context) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            root: ctx.root().to_path_buf(),
        }
    }
}

/// Predicate narrowing the set of mutation subjects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectFilter {
    Diff(DiffFilter),
}
