//! Unix domain socket endpoints.

use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

use super::error::BridgeError;
use crate::config::BridgeConfig;

pub(super) type Connection = UnixStream;

/// Scheme prefix ffmpeg uses for unix socket URLs.
const UNIX_SCHEME: &str = "unix:";

/// A bound socket that accepts a single connection.
///
/// The socket file is removed when the acceptor is dropped, whether or
/// not a peer ever connected.
pub(super) struct Acceptor {
    listener: UnixListener,
    path: PathBuf,
}

impl Acceptor {
    /// Binds a fresh socket for the given endpoint id.
    ///
    /// Returns the acceptor and the address to hand to ffmpeg.
    pub(super) fn bind(config: &BridgeConfig, id: &str) -> Result<(Self, String), BridgeError> {
        let path = socket_path(&config.socket_dir, &config.pipe_prefix, id);

        // Stale leftovers are removed best-effort; bind reports real problems.
        let _ = std::fs::remove_file(&path);

        let listener = UnixListener::bind(&path).map_err(|e| BridgeError::Bind {
            address: path.display().to_string(),
            source: e,
        })?;
        debug!(path = %path.display(), "Bound bridge socket");

        let address = format!("{}{}", UNIX_SCHEME, path.display());
        Ok((Self { listener, path }, address))
    }

    /// Waits for the first peer and stops listening.
    pub(super) async fn accept(self) -> std::io::Result<Connection> {
        let (stream, _) = self.listener.accept().await?;
        Ok(stream)
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn socket_path(dir: &Path, prefix: &str, id: &str) -> PathBuf {
    dir.join(format!("{}-{}.sock", prefix, id))
}

/// Strips the `unix:` scheme from a bridge address.
pub fn socket_path_from_address(address: &str) -> Option<&Path> {
    address.strip_prefix(UNIX_SCHEME).map(Path::new)
}
