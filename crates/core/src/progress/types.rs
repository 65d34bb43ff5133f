//! Types for the progress module.

use serde::{Deserialize, Serialize};

/// Stream information ffmpeg reports for one input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodecData {
    /// Index of the input (`Input #N`).
    pub input_index: usize,
    /// Demuxer names, e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`.
    pub format: String,
    /// Duration as printed, e.g. `"00:00:10.00"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// First audio stream codec description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    /// Remaining audio stream details (rate, layout, sample format...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_details: Option<String>,
    /// First video stream codec description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    /// Remaining video stream details (pixel format, size, rate...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_details: Option<String>,
}

/// A status line reported while encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Frames processed so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<u64>,
    /// Current processing frame rate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_fps: Option<f64>,
    /// Output size so far, in kB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_size_kb: Option<f64>,
    /// Output timestamp reached, e.g. `"00:00:04.00"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timemark: Option<String>,
    /// Current bitrate in kbit/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_kbps: Option<f64>,
    /// Processing speed relative to realtime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Structured information extracted from a stderr line.
#[derive(Debug, Clone, PartialEq)]
pub enum StderrInfo {
    CodecData(CodecData),
    Progress(Progress),
}
