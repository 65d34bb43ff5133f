//! Error types for the command module.

use thiserror::Error;

use crate::bridge::BridgeError;

/// Usage errors raised while building or starting a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// `run()` was already called on this command.
    #[error("Command has already been run")]
    AlreadyRun,

    /// An input-scoped call (or `run()`) with no input added.
    #[error("No input added")]
    NoInput,

    /// An output-scoped call (or `run()`) with no output added.
    #[error("No output added")]
    NoOutput,

    /// An audio/video setting on a track disabled with `no_audio`/`no_video`.
    #[error("Cannot configure {track}: {track} is disabled for this output")]
    TrackDisabled { track: &'static str },

    /// A size specification that cannot be lowered.
    #[error("Invalid size: {reason}")]
    InvalidSize { reason: String },

    /// A duration passed to `input_loop`.
    #[error("Input loop does not take a duration; set the duration on the output instead")]
    LoopDuration,

    /// A free-form option string that cannot be tokenized.
    #[error("Invalid options: {reason}")]
    InvalidOptions { reason: String },

    /// A channel endpoint could not be created for a stream.
    #[error("Bridge setup failed: {0}")]
    Bridge(#[from] BridgeError),
}

impl CommandError {
    /// Creates a new invalid size error.
    pub fn invalid_size(reason: impl Into<String>) -> Self {
        Self::InvalidSize {
            reason: reason.into(),
        }
    }

    /// Creates a new invalid options error.
    pub fn invalid_options(reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            reason: reason.into(),
        }
    }
}
