//! ffprobe-backed prober.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::ProbeError;
use super::traits::Prober;
use super::types::{MediaInfo, StreamDetails, StreamInfo};
use crate::config::ToolPaths;

/// Flags asking ffprobe for a JSON report of the container and every stream.
const REPORT_ARGS: [&str; 7] = [
    "-hide_banner",
    "-loglevel",
    "error",
    "-of",
    "json",
    "-show_format",
    "-show_streams",
];

/// Runs ffprobe and turns its JSON report into [`MediaInfo`].
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Uses the configured ffprobe executable.
    pub fn from_config(paths: &ToolPaths) -> Self {
        Self::new(paths.ffprobe.clone())
    }

    /// Runs ffprobe on `path` and returns its stdout.
    async fn report(&self, path: &Path) -> Result<String, ProbeError> {
        let output = Command::new(&self.ffprobe_path)
            .args(REPORT_ARGS)
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ProbeError::NotFound {
                    path: self.ffprobe_path.clone(),
                },
                _ => ProbeError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match stderr.trim() {
                "" => format!("ffprobe exited with {}", output.status),
                message => message.to_string(),
            };
            return Err(ProbeError::failed(reason));
        }

        String::from_utf8(output.stdout).map_err(|e| ProbeError::Parse {
            reason: format!("report is not UTF-8: {}", e),
        })
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        debug!(path = %path.display(), ffprobe = %self.ffprobe_path.display(), "Probing");
        let report = self.report(path).await?;
        let info = parse_report(path, &report)?;
        debug!(
            path = %path.display(),
            streams = info.streams.len(),
            format = ?info.format(),
            "Probe finished"
        );
        Ok(info)
    }
}

// ffprobe prints most numbers as strings.

#[derive(Deserialize)]
struct Report {
    #[serde(default)]
    format: Option<ReportFormat>,
    #[serde(default)]
    streams: Vec<ReportStream>,
}

#[derive(Deserialize)]
struct ReportFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Deserialize)]
struct ReportStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    bit_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

fn number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

fn kbps(bits_per_second: Option<&str>) -> Option<u64> {
    number::<u64>(bits_per_second).map(|b| b / 1000)
}

/// Parses a rate like `"24000/1001"`, `"30/1"` or `"25"`; `0/0` means unknown.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => rate.parse().ok()?,
    };
    (fps > 0.0).then_some(fps)
}

impl From<ReportStream> for StreamInfo {
    fn from(stream: ReportStream) -> Self {
        let details = match stream.codec_type.as_deref() {
            Some("audio") => StreamDetails::Audio {
                sample_rate: number(stream.sample_rate.as_deref()),
                channels: stream.channels,
            },
            Some("video") => StreamDetails::Video {
                width: stream.width,
                height: stream.height,
                // Variable frame rate streams report 0/0 as their average.
                fps: stream
                    .avg_frame_rate
                    .as_deref()
                    .and_then(parse_frame_rate)
                    .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate)),
            },
            Some("subtitle") => StreamDetails::Subtitle,
            other => StreamDetails::Other {
                kind: other.unwrap_or("unknown").to_string(),
            },
        };

        Self {
            index: stream.index,
            codec: stream.codec_name,
            bitrate_kbps: kbps(stream.bit_rate.as_deref()),
            language: stream.tags.get("language").cloned(),
            details,
        }
    }
}

/// Turns ffprobe's JSON report into [`MediaInfo`].
pub(crate) fn parse_report(path: &Path, report: &str) -> Result<MediaInfo, ProbeError> {
    let report: Report = serde_json::from_str(report).map_err(|e| ProbeError::Parse {
        reason: format!("invalid ffprobe report: {}", e),
    })?;

    let Some(format) = report.format else {
        warn!(path = %path.display(), "ffprobe report has no format section");
        return Err(ProbeError::Parse {
            reason: "report has no format section".to_string(),
        });
    };

    Ok(MediaInfo {
        path: path.to_path_buf(),
        formats: format
            .format_name
            .as_deref()
            .map(|names| names.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        duration_secs: number(format.duration.as_deref()),
        size_bytes: number(format.size.as_deref()),
        bitrate_kbps: kbps(format.bit_rate.as_deref()),
        streams: report.streams.into_iter().map(StreamInfo::from).collect(),
    })
}
