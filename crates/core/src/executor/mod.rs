//! Process execution facility.
//!
//! [`FfmpegCommand`](crate::command::FfmpegCommand) never spawns processes
//! itself; it hands an [`ExecRequest`] to an [`Executor`]. The default
//! [`TokioExecutor`] runs the program with `tokio::process`, discards
//! stdout and exposes stderr as a stream of lines. Tests substitute
//! [`MockExecutor`](crate::testing::MockExecutor).

mod error;
mod tokio_process;
mod traits;
mod types;

pub use error::ExecutionError;
pub use tokio_process::TokioExecutor;
pub use traits::Executor;
pub use types::{ExecRequest, Execution, ExitFuture, StderrLines};
