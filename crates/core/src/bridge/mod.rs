//! Channel bridge between in-process streams and ffmpeg.
//!
//! A [`ChannelBridge`] exposes an `AsyncRead` (for inputs) or an
//! `AsyncWrite` (for outputs) as a local endpoint whose [`address`] can be
//! passed to ffmpeg in place of a file path. On unix the endpoint is a
//! socket under the configured directory, addressed as `unix:<path>`; on
//! Windows it is a named pipe under `\\.\pipe\`.
//!
//! Each endpoint services exactly one connection. The acceptor is closed
//! as soon as that connection arrives, when [`close`] is called, when the
//! bridge is dropped, or (for inputs) when the in-process stream reaches
//! end-of-stream before anyone connected.
//!
//! [`address`]: ChannelBridge::address
//! [`close`]: ChannelBridge::close

mod error;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::BridgeConfig;

pub use error::BridgeError;
#[cfg(unix)]
pub use unix::socket_path_from_address;

#[cfg(unix)]
use unix::{Acceptor, Connection};
#[cfg(windows)]
use windows::{Acceptor, Connection};

/// An in-process source of bytes for an input.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// An in-process sink of bytes for an output.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Chunk size of the read-ahead used to detect an input stream ending early.
const READ_AHEAD_CHUNK: usize = 64 * 1024;

/// Bytes buffered while waiting for a peer; past this, reading pauses until
/// the peer connects.
const READ_AHEAD_LIMIT: usize = 4 * 1024 * 1024;

/// Piping behaviour for stream-backed outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeOptions {
    /// Shut the in-process writer down once ffmpeg closes its end.
    pub end: bool,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self { end: true }
    }
}

enum Role {
    Input(BoxedReader),
    Output {
        writer: BoxedWriter,
        options: PipeOptions,
    },
}

/// A single-use local endpoint relaying bytes to or from an in-process stream.
///
/// Must be created inside a tokio runtime: the accept-and-relay loop runs
/// on its own task.
pub struct ChannelBridge {
    id: String,
    address: String,
    shutdown: CancellationToken,
    closed: watch::Receiver<bool>,
    task: Option<JoinHandle<()>>,
}

impl ChannelBridge {
    /// Creates an endpoint ffmpeg can read `reader` from.
    pub fn for_input<R>(reader: R, config: &BridgeConfig) -> Result<Self, BridgeError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::open_input(Box::new(reader), config)
    }

    /// Creates an endpoint ffmpeg can write into `writer` through.
    pub fn for_output<W>(
        writer: W,
        options: PipeOptions,
        config: &BridgeConfig,
    ) -> Result<Self, BridgeError>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::open_output(Box::new(writer), options, config)
    }

    pub(crate) fn open_input(reader: BoxedReader, config: &BridgeConfig) -> Result<Self, BridgeError> {
        Self::open(Role::Input(reader), config)
    }

    pub(crate) fn open_output(
        writer: BoxedWriter,
        options: PipeOptions,
        config: &BridgeConfig,
    ) -> Result<Self, BridgeError> {
        Self::open(Role::Output { writer, options }, config)
    }

    fn open(role: Role, config: &BridgeConfig) -> Result<Self, BridgeError> {
        let id = Uuid::new_v4().simple().to_string();
        let (acceptor, address) = Acceptor::bind(config, &id)?;

        let shutdown = CancellationToken::new();
        let (closed_tx, closed_rx) = watch::channel(false);
        let task = tokio::spawn(serve(
            acceptor,
            role,
            shutdown.clone(),
            closed_tx,
            address.clone(),
        ));

        Ok(Self {
            id,
            address,
            shutdown,
            closed: closed_rx,
            task: Some(task),
        })
    }

    /// Random identifier embedded in the address.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Address to pass to ffmpeg.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Stops accepting connections.
    ///
    /// Idempotent. An input relay already in progress is stopped as well;
    /// an output relay keeps draining until ffmpeg closes its end.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Whether the acceptor has been closed.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Waits until the acceptor has been closed.
    pub async fn closed(&self) {
        let mut closed = self.closed.clone();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Waits for the relay task to finish.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(address = %self.address, "Bridge task failed: {}", e);
            }
        }
    }
}

impl Drop for ChannelBridge {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for ChannelBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBridge")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn serve(
    acceptor: Acceptor,
    role: Role,
    shutdown: CancellationToken,
    closed: watch::Sender<bool>,
    address: String,
) {
    match role {
        Role::Input(reader) => serve_input(acceptor, reader, &shutdown, &closed, &address).await,
        Role::Output { writer, options } => {
            serve_output(acceptor, writer, options, &shutdown, &closed, &address).await
        }
    }
    closed.send_replace(true);
}

async fn serve_input(
    acceptor: Acceptor,
    mut reader: BoxedReader,
    shutdown: &CancellationToken,
    closed: &watch::Sender<bool>,
    address: &str,
) {
    // Read ahead while waiting so an input that ends before ffmpeg
    // connects tears the endpoint down.
    let mut chunk = vec![0u8; READ_AHEAD_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    let accept = acceptor.accept();
    tokio::pin!(accept);

    let mut conn: Connection = loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(%address, "Bridge closed before a peer connected");
                return;
            }
            result = &mut accept => match result {
                Ok(conn) => break conn,
                Err(e) => {
                    warn!(%address, "Failed to accept bridge connection: {}", e);
                    return;
                }
            },
            read = reader.read(&mut chunk), if pending.len() < READ_AHEAD_LIMIT => match read {
                Ok(0) => {
                    debug!(
                        %address,
                        discarded = pending.len(),
                        "Input stream ended before a peer connected"
                    );
                    return;
                }
                Ok(n) => pending.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!(%address, "Input stream failed before a peer connected: {}", e);
                    return;
                }
            },
        }
    };
    closed.send_replace(true);
    debug!(%address, "Bridge peer connected");

    let relay = async {
        conn.write_all(&pending).await?;
        let total = pending.len() as u64 + tokio::io::copy(&mut reader, &mut conn).await?;
        conn.shutdown().await?;
        Ok::<u64, std::io::Error>(total)
    };

    tokio::select! {
        _ = shutdown.cancelled() => debug!(%address, "Bridge closed during input relay"),
        result = relay => match result {
            Ok(bytes) => debug!(%address, bytes, "Input relay finished"),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!(%address, "Peer stopped reading input")
            }
            Err(e) => warn!(%address, "Input relay failed: {}", e),
        },
    }
}

async fn serve_output(
    acceptor: Acceptor,
    mut writer: BoxedWriter,
    options: PipeOptions,
    shutdown: &CancellationToken,
    closed: &watch::Sender<bool>,
    address: &str,
) {
    let mut conn: Connection = tokio::select! {
        _ = shutdown.cancelled() => {
            debug!(%address, "Bridge closed before a peer connected");
            return;
        }
        result = acceptor.accept() => match result {
            Ok(conn) => conn,
            Err(e) => {
                warn!(%address, "Failed to accept bridge connection: {}", e);
                return;
            }
        },
    };
    closed.send_replace(true);
    debug!(%address, "Bridge peer connected");

    let copied = match tokio::io::copy(&mut conn, &mut writer).await {
        Ok(bytes) => bytes,
        // Named pipes report a disconnected writer as a broken pipe.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => 0,
        Err(e) => {
            warn!(%address, "Output relay failed: {}", e);
            return;
        }
    };

    let finished = if options.end {
        writer.shutdown().await
    } else {
        writer.flush().await
    };
    match finished {
        Ok(()) => debug!(%address, bytes = copied, "Output relay finished"),
        Err(e) => warn!(%address, "Failed to finish output stream: {}", e),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::UnixStream;

    fn test_config(dir: &TempDir) -> BridgeConfig {
        BridgeConfig::with_socket_dir(dir.path().to_path_buf())
    }

    async fn wait_closed(bridge: &ChannelBridge) {
        tokio::time::timeout(Duration::from_secs(5), bridge.closed())
            .await
            .expect("acceptor should close");
    }

    #[tokio::test]
    async fn test_address_format() {
        let dir = TempDir::new().unwrap();
        let (_tx, rx) = tokio::io::duplex(64);
        let bridge = ChannelBridge::for_input(rx, &test_config(&dir)).unwrap();

        let path = socket_path_from_address(bridge.address()).unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.to_string_lossy().contains(bridge.id()));
        assert!(path.to_string_lossy().ends_with(".sock"));
        assert_eq!(bridge.id().len(), 32);
    }

    #[tokio::test]
    async fn test_unique_addresses() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let (_a, ra) = tokio::io::duplex(64);
        let (_b, rb) = tokio::io::duplex(64);
        let first = ChannelBridge::for_input(ra, &config).unwrap();
        let second = ChannelBridge::for_input(rb, &config).unwrap();
        assert_ne!(first.address(), second.address());
    }

    #[tokio::test]
    async fn test_input_relay() {
        let dir = TempDir::new().unwrap();
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut bridge = ChannelBridge::for_input(rx, &test_config(&dir)).unwrap();
        let path = socket_path_from_address(bridge.address()).unwrap().to_path_buf();

        let mut client = UnixStream::connect(&path).await.unwrap();
        tx.write_all(b"hello bridge").await.unwrap();
        drop(tx);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello bridge");

        bridge.join().await;
        assert!(bridge.is_closed());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_read_ahead_is_not_lost() {
        let dir = TempDir::new().unwrap();
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut bridge = ChannelBridge::for_input(rx, &test_config(&dir)).unwrap();
        let path = socket_path_from_address(bridge.address()).unwrap().to_path_buf();

        // Buffered before anyone connects.
        tx.write_all(b"first chunk, ").await.unwrap();
        tx.write_all(b"second chunk, ").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!bridge.is_closed());

        let mut client = UnixStream::connect(&path).await.unwrap();
        tx.write_all(b"after connect").await.unwrap();
        drop(tx);

        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "first chunk, second chunk, after connect");

        bridge.join().await;
    }

    #[tokio::test]
    async fn test_input_stream_end_closes_acceptor() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = tokio::io::duplex(64);
        let bridge = ChannelBridge::for_input(rx, &test_config(&dir)).unwrap();
        let path = socket_path_from_address(bridge.address()).unwrap().to_path_buf();
        assert!(!bridge.is_closed());

        drop(tx);
        wait_closed(&bridge).await;

        assert!(bridge.is_closed());
        assert!(!path.exists());
        assert!(UnixStream::connect(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_slow_reader_is_relayed_in_order() {
        let dir = TempDir::new().unwrap();
        let reader = tokio_test::io::Builder::new()
            .read(b"header ")
            .wait(Duration::from_millis(300))
            .read(b"payload")
            .build();
        let mut bridge = ChannelBridge::for_input(reader, &test_config(&dir)).unwrap();
        let path = socket_path_from_address(bridge.address()).unwrap().to_path_buf();

        let mut client = UnixStream::connect(&path).await.unwrap();
        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "header payload");

        bridge.join().await;
    }

    #[tokio::test]
    async fn test_input_stream_end_after_data_closes_acceptor() {
        let dir = TempDir::new().unwrap();
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut bridge = ChannelBridge::for_input(rx, &test_config(&dir)).unwrap();
        let path = socket_path_from_address(bridge.address()).unwrap().to_path_buf();

        tx.write_all(b"abc").await.unwrap();
        drop(tx);
        wait_closed(&bridge).await;

        assert!(!path.exists());
        assert!(UnixStream::connect(&path).await.is_err());
        bridge.join().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (_tx, rx) = tokio::io::duplex(64);
        let mut bridge = ChannelBridge::for_input(rx, &test_config(&dir)).unwrap();
        let path = socket_path_from_address(bridge.address()).unwrap().to_path_buf();

        bridge.close();
        bridge.close();
        wait_closed(&bridge).await;
        bridge.close();
        bridge.join().await;
        bridge.join().await;

        assert!(bridge.is_closed());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_closes_acceptor() {
        let dir = TempDir::new().unwrap();
        let (_tx, rx) = tokio::io::duplex(64);
        let bridge = ChannelBridge::for_input(rx, &test_config(&dir)).unwrap();
        let path = socket_path_from_address(bridge.address()).unwrap().to_path_buf();

        drop(bridge);
        tokio::time::timeout(Duration::from_secs(5), async {
            while path.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("socket file should be removed");
    }

    #[tokio::test]
    async fn test_output_relay_accepts_one_connection() {
        let dir = TempDir::new().unwrap();
        let (writer, mut reader) = tokio::io::duplex(64);
        let mut bridge =
            ChannelBridge::for_output(writer, PipeOptions::default(), &test_config(&dir)).unwrap();
        let path = socket_path_from_address(bridge.address()).unwrap().to_path_buf();

        let mut first = UnixStream::connect(&path).await.unwrap();
        wait_closed(&bridge).await;
        assert!(UnixStream::connect(&path).await.is_err());

        first.write_all(b"encoded bytes").await.unwrap();
        first.shutdown().await.unwrap();
        drop(first);

        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"encoded bytes");

        bridge.join().await;
    }

    #[tokio::test]
    async fn test_output_close_before_connect() {
        let dir = TempDir::new().unwrap();
        let (writer, _reader) = tokio::io::duplex(64);
        let bridge =
            ChannelBridge::for_output(writer, PipeOptions { end: false }, &test_config(&dir))
                .unwrap();

        bridge.close();
        wait_closed(&bridge).await;
        assert!(bridge.is_closed());
    }
}
