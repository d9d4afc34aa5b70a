use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the child's output pipes a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable argument vector for the crawler invocation.
///
/// The first two tokens are the fixed interpreter and script; everything after them is
/// forwarded from the caller untouched and in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(
        interpreter: impl Into<String>,
        script: impl Into<String>,
        passthrough: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = vec![script.into()];
        args.extend(passthrough.into_iter().map(Into::into));
        Self {
            program: interpreter.into(),
            args,
        }
    }

    /// Executable that gets spawned (the interpreter).
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments handed to the program, script first.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Full argument vector including the program itself.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Lifecycle of a single supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    NotStarted,
    Spawning,
    /// Both relays are still reading.
    Running,
    /// One relay hit end of file, the other is still draining.
    Draining,
    Finished,
    /// Spawn failed; no relay was ever started.
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Finished | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::NotStarted => "not started",
            RunState::Spawning => "spawning",
            RunState::Running => "running",
            RunState::Draining => "draining",
            RunState::Finished => "finished",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}
