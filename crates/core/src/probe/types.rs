//! Types for the probe module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What ffprobe reported about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    /// Container format names, most specific first (`matroska,webm` gives both).
    pub formats: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Overall bitrate in kbit/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u64>,
    /// Every stream in container order.
    pub streams: Vec<StreamInfo>,
}

/// One stream of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Stream index as used by `-map 0:<index>`.
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u64>,
    /// ISO 639 language tag, when the container carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(flatten)]
    pub details: StreamDetails,
}

/// Type-specific stream properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamDetails {
    Audio {
        #[serde(skip_serializing_if = "Option::is_none")]
        sample_rate: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        channels: Option<u32>,
    },
    Video {
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fps: Option<f64>,
    },
    Subtitle,
    /// Data, attachment or anything ffprobe labels otherwise.
    Other { kind: String },
}

impl StreamInfo {
    pub fn is_audio(&self) -> bool {
        matches!(self.details, StreamDetails::Audio { .. })
    }

    pub fn is_video(&self) -> bool {
        matches!(self.details, StreamDetails::Video { .. })
    }
}

impl MediaInfo {
    pub fn audio_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(|s| s.is_audio())
    }

    pub fn video_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(|s| s.is_video())
    }

    pub fn has_audio(&self) -> bool {
        self.audio_streams().next().is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video_streams().next().is_some()
    }

    /// The most specific container format name.
    pub fn format(&self) -> Option<&str> {
        self.formats.first().map(String::as_str)
    }
}
