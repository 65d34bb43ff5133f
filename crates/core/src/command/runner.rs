//! The run phase of a command.

use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::diagnostics::DiagnosticBuffer;
use super::events::{CommandEvent, EventRelay};
use crate::bridge::ChannelBridge;
use crate::executor::{ExecRequest, Execution, ExecutionError, Executor, StderrLines};
use crate::progress::{StderrInfo, StderrParser};

/// Final result of a run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// ffmpeg exited successfully.
    Completed { stderr: String },
    /// ffmpeg could not be started, failed, or was cancelled.
    Failed {
        error: Arc<ExecutionError>,
        stderr: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Retained stderr lines, newline-joined.
    pub fn stderr(&self) -> &str {
        match self {
            Self::Completed { stderr } | Self::Failed { stderr, .. } => stderr,
        }
    }

    /// The error, if the run failed.
    pub fn error(&self) -> Option<&ExecutionError> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    /// Converts into a `Result` carrying the retained stderr on success.
    pub fn into_result(self) -> Result<String, Arc<ExecutionError>> {
        match self {
            Self::Completed { stderr } => Ok(stderr),
            Self::Failed { error, .. } => Err(error),
        }
    }
}

/// Handle to a started run.
///
/// Dropping the handle does not stop the run.
#[derive(Debug)]
pub struct RunHandle {
    args: Vec<String>,
    cancel: CancellationToken,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Arguments passed to ffmpeg, bridge addresses included.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Asks the executor to kill the process.
    ///
    /// The run then ends with a single `Error` event carrying
    /// [`ExecutionError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token cancelling this run; useful to tie it to a larger shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the run to finish.
    pub async fn wait(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => RunOutcome::Failed {
                error: Arc::new(ExecutionError::Io(std::io::Error::other(format!(
                    "run task failed: {}",
                    e
                )))),
                stderr: String::new(),
            },
        }
    }
}

/// Everything the run task owns.
pub(crate) struct RunContext {
    pub executor: Arc<dyn Executor>,
    pub request: ExecRequest,
    pub bridges: Vec<ChannelBridge>,
    pub relay: EventRelay,
    pub stderr_line_limit: usize,
}

impl RunContext {
    /// Spawns the run task.
    pub(crate) fn start(self) -> RunHandle {
        let args = self.request.args.clone();
        let cancel = self.request.cancel.clone();
        let task = tokio::spawn(execute(self));
        RunHandle { args, cancel, task }
    }
}

async fn execute(context: RunContext) -> RunOutcome {
    let RunContext {
        executor,
        request,
        mut bridges,
        mut relay,
        stderr_line_limit,
    } = context;

    let program = request.program.clone();
    debug!(executor = executor.name(), program = %program.display(), "Starting run");

    let (result, diagnostics) = match executor.spawn(request).await {
        Ok(execution) => {
            let Execution { argv, stderr, exit } = execution;
            relay.emit(CommandEvent::Start {
                command_line: argv.join(" "),
            });

            let stderr_task = tokio::spawn(consume_stderr(
                stderr,
                relay.clone(),
                DiagnosticBuffer::new(stderr_line_limit),
            ));

            let result = exit.await;
            let diagnostics = match stderr_task.await {
                Ok(diagnostics) => diagnostics,
                Err(e) => {
                    warn!("stderr reader failed: {}", e);
                    DiagnosticBuffer::new(stderr_line_limit)
                }
            };
            (result, diagnostics)
        }
        Err(e) => (Err(e), DiagnosticBuffer::new(stderr_line_limit)),
    };

    for bridge in &bridges {
        bridge.close();
    }
    for bridge in &mut bridges {
        bridge.join().await;
    }

    let stderr = diagnostics.contents();
    match result {
        Ok(()) => {
            info!(program = %program.display(), "ffmpeg finished");
            relay.emit(CommandEvent::End {
                stdout: String::new(),
                stderr: stderr.clone(),
            });
            RunOutcome::Completed { stderr }
        }
        Err(e) => {
            if e.is_cancelled() {
                info!(program = %program.display(), "ffmpeg run cancelled");
            } else {
                error!(program = %program.display(), "ffmpeg failed: {}", e);
            }
            let error = Arc::new(e);
            relay.emit(CommandEvent::Error {
                error: Arc::clone(&error),
                stdout: String::new(),
                stderr: stderr.clone(),
            });
            RunOutcome::Failed { error, stderr }
        }
    }
}

/// Relays stderr lines until the stream ends and returns the retained ones.
async fn consume_stderr(
    mut lines: StderrLines,
    mut relay: EventRelay,
    mut diagnostics: DiagnosticBuffer,
) -> DiagnosticBuffer {
    let mut parser = StderrParser::new();

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read ffmpeg stderr: {}", e);
                break;
            }
        };

        diagnostics.push(line.clone());
        let found = parser.feed(&line);
        relay.emit(CommandEvent::Stderr(line));
        for info in found {
            relay.emit(info.into());
        }
    }

    if let Some(info) = parser.flush() {
        relay.emit(info.into());
    }
    diagnostics
}

impl From<StderrInfo> for CommandEvent {
    fn from(info: StderrInfo) -> Self {
        match info {
            StderrInfo::CodecData(data) => Self::CodecData(data),
            StderrInfo::Progress(progress) => Self::Progress(progress),
        }
    }
}
