//! Trait definitions for the executor module.

use async_trait::async_trait;

use super::error::ExecutionError;
use super::types::{ExecRequest, Execution};

/// Something that can start external processes.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Returns the name of this executor implementation.
    fn name(&self) -> &str;

    /// Starts the requested process.
    ///
    /// Returns once the process is running; its stderr and completion are
    /// exposed through the returned [`Execution`].
    async fn spawn(&self, request: ExecRequest) -> Result<Execution, ExecutionError>;
}
