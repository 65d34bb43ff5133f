//! Error types for the bridge module.

use thiserror::Error;

/// Errors that can occur while setting up a channel bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The endpoint could not be bound.
    #[error("Failed to bind channel endpoint {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}
