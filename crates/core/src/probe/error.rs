//! Error types for the probe module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while probing a media file.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// ffprobe binary not found.
    #[error("ffprobe not found at path: {path}")]
    NotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// ffprobe ran but reported a failure.
    #[error("ffprobe failed: {reason}")]
    Failed { reason: String },

    /// ffprobe output could not be understood.
    #[error("Failed to parse media info: {reason}")]
    Parse { reason: String },

    /// I/O error while running ffprobe.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Creates a new probe failure error.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}
