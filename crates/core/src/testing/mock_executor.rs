//! Mock executor for testing.

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::executor::{ExecRequest, Execution, ExecutionError, Executor};

/// Mock implementation of the Executor trait.
///
/// Provides controllable behavior for testing:
/// - Record every request for assertions
/// - Replay scripted stderr lines
/// - Simulate success, a non-zero exit, or a spawn failure
/// - Act as ffmpeg on bridge endpoints found in the arguments
///
/// # Example
///
/// ```rust,ignore
/// use ffwire_core::testing::MockExecutor;
///
/// let executor = MockExecutor::new();
/// executor.set_stderr_lines(["Input #0, wav, from 'a.wav':"]).await;
/// executor.set_exit_code(1).await;
///
/// let mut command = FfmpegCommand::new().with_executor(Arc::new(executor.clone()));
/// // ...
/// let requests = executor.recorded_requests().await;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    /// Recorded requests.
    requests: Arc<RwLock<Vec<ExecRequest>>>,
    /// Lines replayed on stderr.
    stderr_lines: Arc<RwLock<Vec<String>>>,
    /// Exit code of the simulated process; 0 or unset succeeds.
    exit_code: Arc<RwLock<Option<i32>>>,
    /// If set, the next spawn will fail with this error.
    next_error: Arc<RwLock<Option<ExecutionError>>>,
    /// Simulated run time.
    run_duration_ms: Arc<RwLock<u64>>,
    /// Whether to open `unix:` endpoints found in the arguments.
    connect_endpoints: Arc<RwLock<bool>>,
    /// Bytes written to every output endpoint.
    output_payload: Arc<RwLock<Vec<u8>>>,
    /// Bytes read from each input endpoint, in argument order.
    received: Arc<RwLock<Vec<Vec<u8>>>>,
}

impl MockExecutor {
    /// Create a new mock executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded requests.
    pub async fn recorded_requests(&self) -> Vec<ExecRequest> {
        self.requests.read().await.clone()
    }

    /// Get the number of spawn attempts.
    pub async fn execution_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Set the lines the simulated process writes to stderr.
    pub async fn set_stderr_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.stderr_lines.write().await = lines.into_iter().map(Into::into).collect();
    }

    /// Set the exit code of the simulated process.
    pub async fn set_exit_code(&self, code: i32) {
        *self.exit_code.write().await = Some(code);
    }

    /// Configure the next spawn to fail with the given error.
    pub async fn set_next_error(&self, error: ExecutionError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set how long the simulated process runs before exiting.
    pub async fn set_run_duration(&self, duration: Duration) {
        *self.run_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Enable or disable connecting to bridge endpoints.
    pub async fn set_connect_endpoints(&self, connect: bool) {
        *self.connect_endpoints.write().await = connect;
    }

    /// Set the bytes written to output endpoints.
    pub async fn set_output_payload(&self, payload: impl Into<Vec<u8>>) {
        *self.output_payload.write().await = payload.into();
    }

    /// Bytes read from input endpoints so far.
    pub async fn received_inputs(&self) -> Vec<Vec<u8>> {
        self.received.read().await.clone()
    }
}

#[cfg(unix)]
async fn serve_endpoints(
    args: &[String],
    payload: &[u8],
    received: &RwLock<Vec<Vec<u8>>>,
) -> Result<(), ExecutionError> {
    use crate::bridge::socket_path_from_address;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;

    for (index, arg) in args.iter().enumerate() {
        let Some(path) = socket_path_from_address(arg) else {
            continue;
        };
        let mut stream = UnixStream::connect(path).await?;

        let is_input = index > 0 && args[index - 1] == "-i";
        if is_input {
            let mut data = Vec::new();
            stream.read_to_end(&mut data).await?;
            received.write().await.push(data);
        } else {
            stream.write_all(payload).await?;
            stream.shutdown().await?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn serve_endpoints(
    _args: &[String],
    _payload: &[u8],
    _received: &RwLock<Vec<Vec<u8>>>,
) -> Result<(), ExecutionError> {
    Ok(())
}

#[async_trait]
impl Executor for MockExecutor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn spawn(&self, request: ExecRequest) -> Result<Execution, ExecutionError> {
        self.requests.write().await.push(request.clone());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let argv = request.argv();
        let lines = self.stderr_lines.read().await.clone();
        let stderr = futures::stream::iter(lines.into_iter().map(Ok)).boxed();

        let exit_code = *self.exit_code.read().await;
        let run_duration = Duration::from_millis(*self.run_duration_ms.read().await);
        let connect = *self.connect_endpoints.read().await;
        let payload = self.output_payload.read().await.clone();
        let received = Arc::clone(&self.received);
        let ExecRequest { args, cancel, .. } = request;

        let exit = async move {
            let work = async {
                if connect {
                    serve_endpoints(&args, &payload, &received).await?;
                }
                tokio::time::sleep(run_duration).await;
                Ok::<(), ExecutionError>(())
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
                result = work => result?,
            }

            match exit_code {
                Some(code) if code != 0 => Err(ExecutionError::exit_code(code)),
                _ => Ok(()),
            }
        }
        .boxed();

        Ok(Execution { argv, stderr, exit })
    }
}
