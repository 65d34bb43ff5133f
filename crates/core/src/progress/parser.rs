//! Line parser for ffmpeg's stderr.

use regex_lite::Regex;

use super::types::{CodecData, Progress, StderrInfo};

/// Incremental parser fed one stderr line at a time.
///
/// Input sections (`Input #N` up to the next input, `Output #` or
/// `Stream mapping:`) are reported as one [`CodecData`] each; status lines
/// (`frame=... time=...`) are reported as [`Progress`].
pub struct StderrParser {
    current: Option<CodecData>,
    input_re: Option<Regex>,
    duration_re: Option<Regex>,
    stream_re: Option<Regex>,
    field_re: Option<Regex>,
}

impl Default for StderrParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StderrParser {
    pub fn new() -> Self {
        Self {
            current: None,
            input_re: Regex::new(r"^Input #(\d+), (.*), from ").ok(),
            duration_re: Regex::new(r"^\s*Duration: ([^,]+)").ok(),
            stream_re: Regex::new(r"^\s*Stream #\d+:\d+.*?: (Audio|Video): (.*)$").ok(),
            field_re: Regex::new(r"(\w+)=\s*(\S+)").ok(),
        }
    }

    /// Feeds one line; returns whatever it completed.
    pub fn feed(&mut self, line: &str) -> Vec<StderrInfo> {
        let mut found = Vec::new();

        if let Some(caps) = self.input_re.as_ref().and_then(|re| re.captures(line)) {
            found.extend(self.flush());
            self.current = Some(CodecData {
                input_index: caps[1].parse().unwrap_or(0),
                format: caps[2].to_string(),
                ..Default::default()
            });
            return found;
        }

        if line.starts_with("Output #") || line.starts_with("Stream mapping:") {
            found.extend(self.flush());
            return found;
        }

        if let Some(codec_data) = self.current.as_mut() {
            if let Some(caps) = self.duration_re.as_ref().and_then(|re| re.captures(line)) {
                codec_data.duration = Some(caps[1].trim().to_string());
            } else if let Some(caps) = self.stream_re.as_ref().and_then(|re| re.captures(line)) {
                let (codec, details) = split_stream_description(&caps[2]);
                match &caps[1] {
                    "Audio" if codec_data.audio.is_none() => {
                        codec_data.audio = Some(codec);
                        codec_data.audio_details = details;
                    }
                    "Video" if codec_data.video.is_none() => {
                        codec_data.video = Some(codec);
                        codec_data.video_details = details;
                    }
                    _ => {}
                }
            }
            return found;
        }

        if let Some(progress) = self.parse_progress(line) {
            found.push(StderrInfo::Progress(progress));
        }
        found
    }

    /// Completes a pending input section, if any.
    pub fn flush(&mut self) -> Option<StderrInfo> {
        self.current.take().map(StderrInfo::CodecData)
    }

    fn parse_progress(&self, line: &str) -> Option<Progress> {
        let trimmed = line.trim_start();
        if !(trimmed.starts_with("frame=") || trimmed.starts_with("size=")) || !line.contains("time=")
        {
            return None;
        }
        let re = self.field_re.as_ref()?;

        let mut progress = Progress::default();
        for caps in re.captures_iter(line) {
            let value = &caps[2];
            if value == "N/A" {
                continue;
            }
            match &caps[1] {
                "frame" => progress.frames = value.parse().ok(),
                "fps" => progress.current_fps = leading_number(value),
                "size" | "Lsize" => progress.target_size_kb = leading_number(value),
                "time" => progress.timemark = Some(value.to_string()),
                "bitrate" => progress.current_kbps = leading_number(value),
                "speed" => progress.speed = leading_number(value),
                _ => {}
            }
        }
        Some(progress)
    }
}

/// Splits `"aac (LC) (mp4a / 0x6134706D), 44100 Hz, stereo"` into the
/// codec part and the remaining details.
fn split_stream_description(description: &str) -> (String, Option<String>) {
    match description.split_once(", ") {
        Some((codec, details)) => (codec.trim().to_string(), Some(details.trim().to_string())),
        None => (description.trim().to_string(), None),
    }
}

/// Parses the numeric prefix of values like `"256kB"` or `"1.02x"`.
fn leading_number(value: &str) -> Option<f64> {
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER: &[&str] = &[
        "ffmpeg version 6.1 Copyright (c) 2000-2023 the FFmpeg developers",
        "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'input.mp4':",
        "  Metadata:",
        "    major_brand     : isom",
        "  Duration: 00:00:10.00, start: 0.000000, bitrate: 1234 kb/s",
        "  Stream #0:0[0x1](und): Video: h264 (High) (avc1 / 0x31637661), yuv420p(progressive), 1280x720, 1000 kb/s, 25 fps, 25 tbr, 12800 tbn (default)",
        "  Stream #0:1[0x2](und): Audio: aac (LC) (mp4a / 0x6134706D), 44100 Hz, stereo, fltp, 128 kb/s (default)",
        "Stream mapping:",
        "  Stream #0:0 -> #0:0 (h264 (native) -> h264 (libx264))",
    ];

    fn feed_all(parser: &mut StderrParser, lines: &[&str]) -> Vec<StderrInfo> {
        lines.iter().flat_map(|line| parser.feed(line)).collect()
    }

    #[test]
    fn test_codec_data() {
        let mut parser = StderrParser::new();
        let found = feed_all(&mut parser, BANNER);
        assert_eq!(found.len(), 1);

        let StderrInfo::CodecData(data) = &found[0] else {
            panic!("expected codec data, got {:?}", found[0]);
        };
        assert_eq!(data.input_index, 0);
        assert_eq!(data.format, "mov,mp4,m4a,3gp,3g2,mj2");
        assert_eq!(data.duration.as_deref(), Some("00:00:10.00"));
        assert_eq!(data.video.as_deref(), Some("h264 (High) (avc1 / 0x31637661)"));
        assert!(data
            .video_details
            .as_deref()
            .unwrap()
            .contains("1280x720"));
        assert_eq!(data.audio.as_deref(), Some("aac (LC) (mp4a / 0x6134706D)"));
        assert!(data
            .audio_details
            .as_deref()
            .unwrap()
            .starts_with("44100 Hz"));
    }

    #[test]
    fn test_multiple_inputs() {
        let mut parser = StderrParser::new();
        let found = feed_all(
            &mut parser,
            &[
                "Input #0, wav, from 'a.wav':",
                "  Duration: 00:00:03.00, bitrate: 1411 kb/s",
                "Input #1, image2, from 'cover.png':",
                "  Stream #1:0: Video: png, rgb24(pc), 600x600, 25 tbr",
                "Output #0, mp4, to 'out.mp4':",
            ],
        );

        assert_eq!(found.len(), 2);
        let indices: Vec<usize> = found
            .iter()
            .map(|info| match info {
                StderrInfo::CodecData(data) => data.input_index,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_progress_line() {
        let mut parser = StderrParser::new();
        let found = parser.feed(
            "frame=  100 fps= 25 q=28.0 size=     256kB time=00:00:04.00 bitrate= 524.3kbits/s speed=1.02x",
        );

        assert_eq!(
            found,
            vec![StderrInfo::Progress(Progress {
                frames: Some(100),
                current_fps: Some(25.0),
                target_size_kb: Some(256.0),
                timemark: Some("00:00:04.00".to_string()),
                current_kbps: Some(524.3),
                speed: Some(1.02),
            })]
        );
    }

    #[test]
    fn test_audio_only_progress_with_na() {
        let mut parser = StderrParser::new();
        let found =
            parser.feed("size=     512KiB time=00:00:30.00 bitrate=N/A speed=  12x");
        let StderrInfo::Progress(progress) = &found[0] else {
            panic!("expected progress");
        };
        assert_eq!(progress.frames, None);
        assert_eq!(progress.target_size_kb, Some(512.0));
        assert_eq!(progress.current_kbps, None);
        assert_eq!(progress.speed, Some(12.0));
    }

    #[test]
    fn test_unrelated_lines_ignored() {
        let mut parser = StderrParser::new();
        assert!(parser.feed("ffmpeg version 6.1").is_empty());
        assert!(parser.feed("[libx264 @ 0x55] using cpu capabilities").is_empty());
        assert!(parser.feed("frame=1 without timing").is_empty());
        assert!(parser.flush().is_none());
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("256kB"), Some(256.0));
        assert_eq!(leading_number("1.5x"), Some(1.5));
        assert_eq!(leading_number("kB"), None);
    }
}
