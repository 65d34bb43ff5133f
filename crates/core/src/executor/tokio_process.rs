//! Executor backed by `tokio::process`.

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::error::ExecutionError;
use super::traits::Executor;
use super::types::{ExecRequest, Execution};

/// Spawns real processes.
///
/// stdin and stdout are not connected; stderr is read line by line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl TokioExecutor {
    pub fn new() -> Self {
        Self
    }
}

fn status_to_result(status: ExitStatus) -> Result<(), ExecutionError> {
    if status.success() {
        return Ok(());
    }
    if let Some(code) = status.code() {
        return Err(ExecutionError::exit_code(code));
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(ExecutionError::Signal { signal });
        }
    }
    Err(ExecutionError::Terminated)
}

#[async_trait]
impl Executor for TokioExecutor {
    fn name(&self) -> &str {
        "tokio"
    }

    async fn spawn(&self, request: ExecRequest) -> Result<Execution, ExecutionError> {
        let argv = request.argv();
        debug!(program = %request.program.display(), args = ?request.args, "Spawning process");

        let mut child = Command::new(&request.program)
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExecutionError::NotFound {
                        program: request.program.clone(),
                    }
                } else {
                    ExecutionError::Spawn {
                        program: request.program.clone(),
                        source: e,
                    }
                }
            })?;

        let pid = child.id();
        info!(?pid, "Process started: {}", argv.join(" "));

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;

        // A read error ends the stream after being reported once.
        let stderr = futures::stream::unfold(
            Some(BufReader::new(stderr).lines()),
            |state| async move {
                let mut lines = state?;
                match lines.next_line().await {
                    Ok(Some(line)) => Some((Ok(line), Some(lines))),
                    Ok(None) => None,
                    Err(e) => Some((Err(e), None)),
                }
            },
        )
        .boxed();

        let cancel = request.cancel.clone();
        let exit = async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!(?pid, "Failed to kill cancelled process: {}", e);
                    }
                    info!(?pid, "Process cancelled");
                    Err(ExecutionError::Cancelled)
                }
                status = child.wait() => {
                    let status = status?;
                    info!(?pid, %status, "Process exited");
                    status_to_result(status)
                }
            }
        }
        .boxed();

        Ok(Execution { argv, stderr, exit })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn sh(script: &str) -> ExecRequest {
        ExecRequest::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_stderr_lines_and_success() {
        let execution = TokioExecutor::new()
            .spawn(sh("echo one >&2; echo two >&2; echo ignored"))
            .await
            .unwrap();

        assert_eq!(execution.argv[0], "sh");
        let lines: Vec<String> = execution
            .stderr
            .map(|line| line.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["one", "two"]);
        assert!(execution.exit.await.is_ok());
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let execution = TokioExecutor::new().spawn(sh("exit 3")).await.unwrap();
        let err = execution.exit.await.unwrap_err();
        assert!(matches!(err, ExecutionError::ExitCode { code: 3 }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let request = ExecRequest::new(PathBuf::from("/nonexistent/ffmpeg"), Vec::new());
        let err = TokioExecutor::new().spawn(request).await.unwrap_err();
        assert!(matches!(err, ExecutionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_kills_process() {
        let request = sh("sleep 30");
        let cancel = request.cancel.clone();
        let execution = TokioExecutor::new().spawn(request).await.unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), execution.exit)
            .await
            .expect("cancelled process should settle");
        assert!(matches!(result, Err(ExecutionError::Cancelled)));
    }
}
