//! Testing utilities and mock implementations.
//!
//! [`MockExecutor`] stands in for ffmpeg so commands can be run end to end
//! without the real binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use ffwire_core::testing::MockExecutor;
//!
//! let executor = MockExecutor::new();
//! executor.set_stderr_lines(["frame=  10 fps=0.0 q=0.0 size=0kB time=00:00:00.40 bitrate=N/A"]).await;
//!
//! let mut command = FfmpegCommand::new().with_executor(Arc::new(executor.clone()));
//! ```

mod mock_executor;

pub use mock_executor::MockExecutor;
