//! Types for the command module.

use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};

use super::size::SizeSpec;
use crate::bridge::{BoxedReader, BoxedWriter, PipeOptions};

/// Where an input's bytes come from.
pub enum InputSource {
    /// A path or URL ffmpeg opens itself.
    File(String),
    /// An in-process stream relayed through a channel bridge.
    Stream(BoxedReader),
}

impl InputSource {
    /// Wraps an in-process reader.
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream(Box::new(reader))
    }

    /// Whether this source needs a channel bridge.
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<&str> for InputSource {
    fn from(path: &str) -> Self {
        Self::File(path.to_string())
    }
}

impl From<String> for InputSource {
    fn from(path: String) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for InputSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_string_lossy().to_string())
    }
}

impl From<PathBuf> for InputSource {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

/// Where an output's bytes go.
pub enum OutputDestination {
    /// A path or URL ffmpeg writes itself.
    File(String),
    /// An in-process writer fed through a channel bridge.
    Stream {
        writer: BoxedWriter,
        options: PipeOptions,
    },
}

impl OutputDestination {
    /// Wraps an in-process writer with default pipe options.
    pub fn stream<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::stream_with_options(writer, PipeOptions::default())
    }

    /// Wraps an in-process writer.
    pub fn stream_with_options<W>(writer: W, options: PipeOptions) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::Stream {
            writer: Box::new(writer),
            options,
        }
    }

    /// Whether this destination needs a channel bridge.
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream { .. })
    }
}

impl fmt::Debug for OutputDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Stream { options, .. } => f
                .debug_struct("Stream")
                .field("options", options)
                .finish_non_exhaustive(),
        }
    }
}

impl From<&str> for OutputDestination {
    fn from(path: &str) -> Self {
        Self::File(path.to_string())
    }
}

impl From<String> for OutputDestination {
    fn from(path: String) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for OutputDestination {
    fn from(path: &Path) -> Self {
        Self::File(path.to_string_lossy().to_string())
    }
}

impl From<PathBuf> for OutputDestination {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

/// A bitrate, either in kbit/s or in ffmpeg's own notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bitrate {
    /// Rendered as `<n>k`.
    Kbps(u32),
    /// Passed through as-is, e.g. `"1M"` or `"128k"`.
    Raw(String),
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kbps(kbps) => write!(f, "{}k", kbps),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

impl From<u32> for Bitrate {
    fn from(kbps: u32) -> Self {
        Self::Kbps(kbps)
    }
}

impl From<&str> for Bitrate {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<String> for Bitrate {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

/// A timestamp or duration.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSpec {
    /// Seconds, e.g. `90` or `1.5`.
    Seconds(f64),
    /// ffmpeg time syntax, e.g. `"00:01:30.5"`.
    Raw(String),
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(seconds) => write!(f, "{}", seconds),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

impl From<f64> for TimeSpec {
    fn from(seconds: f64) -> Self {
        Self::Seconds(seconds)
    }
}

impl From<u32> for TimeSpec {
    fn from(seconds: u32) -> Self {
        Self::Seconds(f64::from(seconds))
    }
}

impl From<std::time::Duration> for TimeSpec {
    fn from(duration: std::time::Duration) -> Self {
        Self::Seconds(duration.as_secs_f64())
    }
}

impl From<&str> for TimeSpec {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<String> for TimeSpec {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

/// Options of a named filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterOptions {
    #[default]
    None,
    /// Already-formatted option string.
    Raw(String),
    /// Positional options, joined with `:`.
    List(Vec<String>),
    /// Named options in insertion order, rendered as `key=value` joined with `:`.
    Map(Vec<(String, String)>),
}

/// One entry of a filter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Passed through as-is, e.g. `"volume=0.5"`.
    Raw(String),
    /// A filter name with structured options.
    Named {
        name: String,
        options: FilterOptions,
    },
}

impl Filter {
    /// A named filter without options.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            options: FilterOptions::None,
        }
    }

    /// A named filter with a preformatted option string.
    pub fn with_options(name: impl Into<String>, options: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            options: FilterOptions::Raw(options.into()),
        }
    }

    /// A named filter with positional options.
    pub fn with_list<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Named {
            name: name.into(),
            options: FilterOptions::List(options.into_iter().map(Into::into).collect()),
        }
    }

    /// A named filter with `key=value` options, kept in the given order.
    pub fn with_map<I, K, V>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Named {
            name: name.into(),
            options: FilterOptions::Map(
                options
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(raw) => f.write_str(raw),
            Self::Named { name, options } => {
                let rendered = match options {
                    FilterOptions::None => String::new(),
                    FilterOptions::Raw(raw) => raw.clone(),
                    FilterOptions::List(list) => list.join(":"),
                    FilterOptions::Map(pairs) => pairs
                        .iter()
                        .map(|(key, value)| format!("{}={}", key, value))
                        .collect::<Vec<_>>()
                        .join(":"),
                };
                // ffmpeg rejects `name=` with nothing after it.
                if rendered.is_empty() {
                    f.write_str(name)
                } else {
                    write!(f, "{}={}", name, rendered)
                }
            }
        }
    }
}

impl From<&str> for Filter {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<String> for Filter {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

/// A stream type that may be switched off for an output.
#[derive(Debug, Clone, PartialEq)]
pub enum Track<T> {
    Enabled(T),
    /// Lowered to `-an` / `-vn`.
    Disabled,
}

impl<T: Default> Default for Track<T> {
    fn default() -> Self {
        Self::Enabled(T::default())
    }
}

impl<T> Track<T> {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    pub fn settings(&self) -> Option<&T> {
        match self {
            Self::Enabled(settings) => Some(settings),
            Self::Disabled => None,
        }
    }

    pub fn settings_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Enabled(settings) => Some(settings),
            Self::Disabled => None,
        }
    }
}

/// Audio encoding settings of an output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioSettings {
    pub codec: Option<String>,
    pub bitrate: Option<Bitrate>,
    pub channels: Option<u32>,
    /// Sample rate in Hz.
    pub frequency: Option<u32>,
    pub quality: Option<u32>,
    pub filters: Vec<Filter>,
}

/// Video encoding settings of an output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoSettings {
    pub codec: Option<String>,
    pub bitrate: Option<Bitrate>,
    pub fps: Option<f64>,
    /// Stop after this many frames.
    pub frames: Option<u64>,
    pub size: Option<SizeSpec>,
    pub filters: Vec<Filter>,
}

/// Per-input options, lowered before `-i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSettings {
    pub format: Option<String>,
    pub fps: Option<f64>,
    /// Read at native frame rate (`-re`).
    pub native: bool,
    pub seek: Option<TimeSpec>,
    pub looped: bool,
    pub extra_options: Vec<String>,
}

/// Per-output options, lowered before the destination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSettings {
    pub format: Option<String>,
    pub seek: Option<TimeSpec>,
    pub duration: Option<TimeSpec>,
    pub audio: Track<AudioSettings>,
    pub video: Track<VideoSettings>,
    pub extra_options: Vec<String>,
}

/// An input added with `input()`.
#[derive(Debug)]
pub struct InputSpec {
    pub source: InputSource,
    pub settings: InputSettings,
}

impl InputSpec {
    pub fn new(source: InputSource) -> Self {
        Self {
            source,
            settings: InputSettings::default(),
        }
    }
}

/// An output added with `output()`.
#[derive(Debug)]
pub struct OutputSpec {
    pub destination: OutputDestination,
    pub settings: OutputSettings,
}

impl OutputSpec {
    pub fn new(destination: OutputDestination) -> Self {
        Self {
            destination,
            settings: OutputSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitrate_display() {
        assert_eq!(Bitrate::from(128).to_string(), "128k");
        assert_eq!(Bitrate::from("1M").to_string(), "1M");
    }

    #[test]
    fn test_time_spec_display() {
        assert_eq!(TimeSpec::from(90u32).to_string(), "90");
        assert_eq!(TimeSpec::from(1.5).to_string(), "1.5");
        assert_eq!(TimeSpec::from("00:01:30.5").to_string(), "00:01:30.5");
        assert_eq!(
            TimeSpec::from(std::time::Duration::from_millis(2500)).to_string(),
            "2.5"
        );
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(Filter::from("volume=0.5").to_string(), "volume=0.5");
        assert_eq!(Filter::named("hflip").to_string(), "hflip");
        assert_eq!(
            Filter::with_options("crop", "640:480:0:0").to_string(),
            "crop=640:480:0:0"
        );
        assert_eq!(
            Filter::with_list("pad", ["640", "480"]).to_string(),
            "pad=640:480"
        );
        assert_eq!(
            Filter::with_map("scale", [("w", "1280"), ("h", "-2")]).to_string(),
            "scale=w=1280:h=-2"
        );
    }

    #[test]
    fn test_filter_without_options_renders_bare_name() {
        let no_pairs: [(&str, &str); 0] = [];
        let no_items: [&str; 0] = [];
        assert_eq!(Filter::with_map("hflip", no_pairs).to_string(), "hflip");
        assert_eq!(Filter::with_list("vflip", no_items).to_string(), "vflip");
        assert_eq!(Filter::with_options("null", "").to_string(), "null");
    }

    #[test]
    fn test_filter_map_keeps_insertion_order() {
        let filter = Filter::with_map("drawtext", [("text", "hi"), ("x", "10"), ("fontsize", "24")]);
        assert_eq!(filter.to_string(), "drawtext=text=hi:x=10:fontsize=24");
    }

    #[test]
    fn test_output_starts_with_tracks_enabled() {
        let output = OutputSpec::new("out.mp4".into());
        assert_eq!(output.settings.audio, Track::Enabled(AudioSettings::default()));
        assert_eq!(output.settings.video, Track::Enabled(VideoSettings::default()));
        assert!(!output.destination.is_stream());
    }

    #[test]
    fn test_source_conversions() {
        assert!(matches!(InputSource::from("a.wav"), InputSource::File(ref p) if p == "a.wav"));
        assert!(matches!(
            InputSource::from(PathBuf::from("/media/b.mkv")),
            InputSource::File(ref p) if p == "/media/b.mkv"
        ));
        assert!(InputSource::stream(tokio::io::empty()).is_stream());
        assert!(OutputDestination::stream(tokio::io::sink()).is_stream());
    }
}
