use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub binaries: BinariesConfig,
    #[serde(default)]
    pub command: CommandConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Locations of the external tools.
///
/// Bare names are resolved through `PATH` when the process is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BinariesConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg: PathBuf,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe: PathBuf,
}

impl Default for BinariesConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg_path(),
            ffprobe: default_ffprobe_path(),
        }
    }
}

/// Executable locations as used by commands and probers.
pub type ToolPaths = BinariesConfig;

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

/// Per-command defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandConfig {
    /// Number of most recent stderr lines kept for the terminal event.
    /// 0 keeps every line.
    #[serde(default = "default_stderr_line_limit")]
    pub stderr_line_limit: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            stderr_line_limit: default_stderr_line_limit(),
        }
    }
}

fn default_stderr_line_limit() -> usize {
    100
}

/// Channel bridge addressing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Directory holding unix socket endpoints (ignored on Windows).
    #[serde(default = "default_socket_dir")]
    pub socket_dir: PathBuf,
    /// Prefix of every endpoint name.
    #[serde(default = "default_pipe_prefix")]
    pub pipe_prefix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            socket_dir: default_socket_dir(),
            pipe_prefix: default_pipe_prefix(),
        }
    }
}

fn default_socket_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_pipe_prefix() -> String {
    "ffwire".to_string()
}

impl BridgeConfig {
    /// Creates a bridge config rooted at the given socket directory.
    pub fn with_socket_dir(socket_dir: PathBuf) -> Self {
        Self {
            socket_dir,
            ..Default::default()
        }
    }
}
