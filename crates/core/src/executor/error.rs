//! Error types for the executor module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by an execution facility.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The executable could not be found.
    #[error("Executable not found: {program}")]
    NotFound { program: PathBuf },

    /// The process could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process exited with a non-zero code.
    #[error("Process exited with code {code}")]
    ExitCode { code: i32 },

    /// The process was terminated by a signal.
    #[error("Process was killed with signal {signal}")]
    Signal { signal: i32 },

    /// The process ended without an exit code or signal.
    #[error("Process terminated abnormally")]
    Terminated,

    /// The run was cancelled through its cancellation token.
    #[error("Execution cancelled")]
    Cancelled,

    /// I/O error while waiting on the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutionError {
    /// Creates an exit-code error.
    pub fn exit_code(code: i32) -> Self {
        Self::ExitCode { code }
    }

    /// Whether the process was stopped on request rather than failing.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
