use console::{Term, style};
use std::{
    env,
    fmt::Display,
    path::{Path, PathBuf},
};

/// Everything the command line layer needs from its surroundings:
/// output streams, the ability to stop the process, and a working directory.
pub trait Context {
    /// Write one line to standard output.
    fn stdout(&self, msg: &dyn Display);

    /// Write one line to the error stream.
    fn stderr(&self, msg: &dyn Display);

    /// Stop the process with `status`.
    ///
    /// The production context never returns from this call. Test contexts
    /// record the request and return, so callers must not rely on it halting.
    fn exit(&self, status: i32);

    /// Directory relative paths and revisions are resolved in.
    fn root(&self) -> &Path;
}

/// Context backed by the real process.
///
/// Errors are styled only on a real TTY and when NO_COLOR/CI are not set.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    out: Term,
    err: Term,
    fancy: bool,
    root: PathBuf,
}

impl ProcessContext {
    pub fn new(root: PathBuf) -> Self {
        Self::with_style(
            root,
            env::var_os("NO_COLOR").is_some(),
            env::var_os("CI").is_some(),
        )
    }

    pub fn with_style(root: PathBuf, no_color: bool, in_ci: bool) -> Self {
        let out = Term::stdout();
        let err = Term::stderr();

        let fancy = err.is_term() && !no_color && !in_ci;

        Self {
            out,
            err,
            fancy,
            root,
        }
    }

    /// Context rooted at the current working directory.
    pub fn from_env() -> std::io::Result<Self> {
        Ok(Self::new(env::current_dir()?))
    }

    pub fn is_fancy(&self) -> bool {
        self.fancy
    }
}

impl Context for ProcessContext {
    fn stdout(&self, msg: &dyn Display) {
        let _ = self.out.write_line(&msg.to_string());
    }

    fn stderr(&self, msg: &dyn Display) {
        let s = msg.to_string();
        if self.fancy {
            let _ = self.err.write_line(&style(s).red().bold().to_string());
        } else {
            let _ = self.err.write_line(&s);
        }
    }

    fn exit(&self, status: i32) {
        let _ = self.out.flush();
        std::process::exit(status);
    }

    fn root(&self) -> &Path {
        &self.root
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingContext;
    use super::*;

    #[test]
    fn process_context_is_plain_under_no_color_or_ci() {
        let ctx = ProcessContext::with_style(PathBuf::from("."), true, false);
        assert!(!ctx.is_fancy());
        assert_eq!(ctx.root(), Path::new("."));

        let ctx = ProcessContext::with_style(PathBuf::from("/srv"), false, true);
        assert!(!ctx.is_fancy());
        assert_eq!(ctx.root(), Path::new("/srv"));
    }

    #[test]
    fn recording_context_captures_streams_and_exits() {
        let ctx = RecordingContext::new();

        ctx.stdout(&"hello");
        ctx.stderr(&format_args!("bad {}", 1));
        ctx.exit(0);

        assert_eq!(ctx.out(), vec!["hello"]);
        assert_eq!(ctx.err(), vec!["bad 1"]);
        assert_eq!(ctx.exits(), vec![0]);
    }
}
