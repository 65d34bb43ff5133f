//! Types for the executor module.

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use super::error::ExecutionError;

/// Lines read from the process's stderr, in arrival order.
pub type StderrLines = BoxStream<'static, std::io::Result<String>>;

/// Settles once the process has exited (or failed to).
pub type ExitFuture = BoxFuture<'static, Result<(), ExecutionError>>;

/// A request to run an executable.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Executable path or bare command name.
    pub program: PathBuf,
    /// Ordered argument vector.
    pub args: Vec<String>,
    /// Cancelling this token kills the process.
    pub cancel: CancellationToken,
}

impl ExecRequest {
    /// Creates a request with a fresh cancellation token.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.to_string_lossy().to_string());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// A spawned process.
///
/// The stderr stream and the exit future are independent: both may be
/// driven concurrently from different tasks.
pub struct Execution {
    /// Resolved argument vector, program first.
    pub argv: Vec<String>,
    /// Stderr, line by line.
    pub stderr: StderrLines,
    /// Process completion.
    pub exit: ExitFuture,
}

impl Execution {
    /// The invocation as a single space-separated string.
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("argv", &self.argv)
            .finish_non_exhaustive()
    }
}
