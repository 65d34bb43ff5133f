//! Windows named pipe endpoints.

use tokio::net::windows::named_pipe::{NamedPipeServer, ServerOptions};
use tracing::debug;

use super::error::BridgeError;
use crate::config::BridgeConfig;

pub(super) type Connection = NamedPipeServer;

const PIPE_NAMESPACE: &str = r"\\.\pipe\";

/// A pipe instance that accepts a single client.
pub(super) struct Acceptor {
    server: NamedPipeServer,
}

impl Acceptor {
    /// Creates the first (and only) instance of a fresh pipe.
    ///
    /// The pipe namespace has no stale files to clean up; an existing pipe
    /// with the same name makes creation fail.
    pub(super) fn bind(config: &BridgeConfig, id: &str) -> Result<(Self, String), BridgeError> {
        let address = format!("{}{}-{}", PIPE_NAMESPACE, config.pipe_prefix, id);

        let server = ServerOptions::new()
            .first_pipe_instance(true)
            .max_instances(1)
            .create(&address)
            .map_err(|e| BridgeError::Bind {
                address: address.clone(),
                source: e,
            })?;
        debug!(%address, "Created bridge pipe");

        Ok((Self { server }, address))
    }

    /// Waits for the client to connect.
    pub(super) async fn accept(self) -> std::io::Result<Connection> {
        self.server.connect().await?;
        Ok(self.server)
    }
}
