//! The fluent command builder.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::CommandError;
use super::events::{CommandEvent, EventRelay};
use super::lowering::{lower_input, lower_output};
use super::options::tokenize_options;
use super::runner::{RunContext, RunHandle};
use super::size::SizeSpec;
use super::types::{
    AudioSettings, Bitrate, Filter, InputSettings, InputSource, InputSpec, OutputDestination,
    OutputSettings, OutputSpec, TimeSpec, Track, VideoSettings,
};
use crate::bridge::ChannelBridge;
use crate::config::{BridgeConfig, Config};
use crate::executor::{ExecRequest, Executor, TokioExecutor};

/// Placeholder shown by [`FfmpegCommand::args`] for stream endpoints.
const STREAM_PLACEHOLDER: &str = "<stream>";

/// Builds and runs one ffmpeg invocation.
///
/// Input-scoped calls apply to the most recently added input and
/// output-scoped calls to the most recently added output:
///
/// ```rust,ignore
/// let mut command = FfmpegCommand::new();
/// command
///     .input("input.mp4")
///     .output("output.webm")
///     .no_audio()?
///     .video_codec("libvpx-vp9")?
///     .size("1280x?")?;
/// let outcome = command.run()?.wait().await;
/// ```
///
/// A command runs at most once.
pub struct FfmpegCommand {
    inputs: Vec<InputSpec>,
    outputs: Vec<OutputSpec>,
    ffmpeg_path: PathBuf,
    stderr_line_limit: usize,
    bridge_config: BridgeConfig,
    executor: Arc<dyn Executor>,
    cancel: CancellationToken,
    relay: EventRelay,
    ran: bool,
}

impl Default for FfmpegCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegCommand {
    /// Creates a command with built-in defaults, running `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Creates a command using the binary path, stderr limit and bridge
    /// settings of `config`.
    pub fn with_config(config: &Config) -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            ffmpeg_path: config.binaries.ffmpeg.clone(),
            stderr_line_limit: config.command.stderr_line_limit,
            bridge_config: config.bridge.clone(),
            executor: Arc::new(TokioExecutor::new()),
            cancel: CancellationToken::new(),
            relay: EventRelay::default(),
            ran: false,
        }
    }

    /// Replaces the execution facility.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Cancels the run when `token` is cancelled.
    ///
    /// Pass a child of a wider shutdown token to stop ffmpeg along with it.
    /// Without one the run gets its own token, reachable through
    /// [`RunHandle::cancellation_token`].
    pub fn cancellation_token(&mut self, token: CancellationToken) -> &mut Self {
        self.cancel = token;
        self
    }

    /// Receives every event of the run. Subscribe before calling [`run`](Self::run).
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<CommandEvent> {
        self.relay.subscribe()
    }

    /// Overrides the ffmpeg executable for this command.
    pub fn ffmpeg_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Number of stderr lines kept for the terminal event; 0 keeps all.
    pub fn stderr_line_limit(&mut self, limit: usize) -> &mut Self {
        self.stderr_line_limit = limit;
        self
    }

    // Inputs

    /// Adds an input: a path/URL, or an in-process stream via [`InputSource::stream`].
    pub fn input(&mut self, source: impl Into<InputSource>) -> &mut Self {
        self.inputs.push(InputSpec::new(source.into()));
        self
    }

    fn current_input(&mut self) -> Result<&mut InputSettings, CommandError> {
        if self.ran {
            return Err(CommandError::AlreadyRun);
        }
        self.inputs
            .last_mut()
            .map(|input| &mut input.settings)
            .ok_or(CommandError::NoInput)
    }

    /// Forces the input format (`-f`).
    pub fn input_format(&mut self, format: impl Into<String>) -> Result<&mut Self, CommandError> {
        self.current_input()?.format = Some(format.into());
        Ok(self)
    }

    /// Sets the input frame rate (`-r`).
    pub fn input_fps(&mut self, fps: f64) -> Result<&mut Self, CommandError> {
        self.current_input()?.fps = Some(fps);
        Ok(self)
    }

    /// Reads the input at its native frame rate (`-re`).
    pub fn native(&mut self) -> Result<&mut Self, CommandError> {
        self.current_input()?.native = true;
        Ok(self)
    }

    /// Starts reading the input at `time` (`-ss` before `-i`).
    pub fn seek_input(&mut self, time: impl Into<TimeSpec>) -> Result<&mut Self, CommandError> {
        self.current_input()?.seek = Some(time.into());
        Ok(self)
    }

    /// Loops the input (`-loop 1`).
    ///
    /// Looping has no duration of its own: passing one is an error, bound
    /// the output with [`duration`](Self::duration) instead.
    pub fn input_loop(&mut self, duration: Option<TimeSpec>) -> Result<&mut Self, CommandError> {
        let input = self.current_input()?;
        if duration.is_some() {
            return Err(CommandError::LoopDuration);
        }
        input.looped = true;
        Ok(self)
    }

    /// Appends free-form options placed before the input's `-i`.
    pub fn input_options(&mut self, options: &str) -> Result<&mut Self, CommandError> {
        let tokens = tokenize_options(options)?;
        self.current_input()?.extra_options.extend(tokens);
        Ok(self)
    }

    // Outputs

    /// Adds an output: a path/URL, or an in-process writer via
    /// [`OutputDestination::stream`]. Audio and video start enabled.
    pub fn output(&mut self, destination: impl Into<OutputDestination>) -> &mut Self {
        self.outputs.push(OutputSpec::new(destination.into()));
        self
    }

    fn current_output(&mut self) -> Result<&mut OutputSettings, CommandError> {
        if self.ran {
            return Err(CommandError::AlreadyRun);
        }
        self.outputs
            .last_mut()
            .map(|output| &mut output.settings)
            .ok_or(CommandError::NoOutput)
    }

    fn current_audio(&mut self) -> Result<&mut AudioSettings, CommandError> {
        self.current_output()?
            .audio
            .settings_mut()
            .ok_or(CommandError::TrackDisabled { track: "audio" })
    }

    fn current_video(&mut self) -> Result<&mut VideoSettings, CommandError> {
        self.current_output()?
            .video
            .settings_mut()
            .ok_or(CommandError::TrackDisabled { track: "video" })
    }

    /// Appends free-form options placed before the output's destination.
    pub fn output_options(&mut self, options: &str) -> Result<&mut Self, CommandError> {
        let tokens = tokenize_options(options)?;
        self.current_output()?.extra_options.extend(tokens);
        Ok(self)
    }

    /// Forces the output format (`-f`).
    pub fn format(&mut self, format: impl Into<String>) -> Result<&mut Self, CommandError> {
        self.current_output()?.format = Some(format.into());
        Ok(self)
    }

    /// Limits the output duration (`-t`).
    pub fn duration(&mut self, duration: impl Into<TimeSpec>) -> Result<&mut Self, CommandError> {
        self.current_output()?.duration = Some(duration.into());
        Ok(self)
    }

    /// Discards output up to `time` (`-ss` before the destination).
    pub fn seek(&mut self, time: impl Into<TimeSpec>) -> Result<&mut Self, CommandError> {
        self.current_output()?.seek = Some(time.into());
        Ok(self)
    }

    /// Drops audio from the current output (`-an`).
    pub fn no_audio(&mut self) -> Result<&mut Self, CommandError> {
        self.current_output()?.audio = Track::Disabled;
        Ok(self)
    }

    /// Drops video from the current output (`-vn`).
    pub fn no_video(&mut self) -> Result<&mut Self, CommandError> {
        self.current_output()?.video = Track::Disabled;
        Ok(self)
    }

    // Audio

    pub fn audio_codec(&mut self, codec: impl Into<String>) -> Result<&mut Self, CommandError> {
        self.current_audio()?.codec = Some(codec.into());
        Ok(self)
    }

    /// Sets the audio bitrate; integers are kbit/s.
    pub fn audio_bitrate(&mut self, bitrate: impl Into<Bitrate>) -> Result<&mut Self, CommandError> {
        self.current_audio()?.bitrate = Some(bitrate.into());
        Ok(self)
    }

    pub fn audio_channels(&mut self, channels: u32) -> Result<&mut Self, CommandError> {
        self.current_audio()?.channels = Some(channels);
        Ok(self)
    }

    /// Sets the audio sample rate in Hz.
    pub fn audio_frequency(&mut self, frequency: u32) -> Result<&mut Self, CommandError> {
        self.current_audio()?.frequency = Some(frequency);
        Ok(self)
    }

    pub fn audio_quality(&mut self, quality: u32) -> Result<&mut Self, CommandError> {
        self.current_audio()?.quality = Some(quality);
        Ok(self)
    }

    /// Appends audio filters, in order.
    pub fn audio_filters<I, F>(&mut self, filters: I) -> Result<&mut Self, CommandError>
    where
        I: IntoIterator<Item = F>,
        F: Into<Filter>,
    {
        self.current_audio()?
            .filters
            .extend(filters.into_iter().map(Into::into));
        Ok(self)
    }

    // Video

    pub fn video_codec(&mut self, codec: impl Into<String>) -> Result<&mut Self, CommandError> {
        self.current_video()?.codec = Some(codec.into());
        Ok(self)
    }

    /// Sets the video bitrate; integers are kbit/s.
    pub fn video_bitrate(&mut self, bitrate: impl Into<Bitrate>) -> Result<&mut Self, CommandError> {
        self.current_video()?.bitrate = Some(bitrate.into());
        Ok(self)
    }

    /// Sets the output frame rate (`-r`).
    pub fn fps(&mut self, fps: f64) -> Result<&mut Self, CommandError> {
        self.current_video()?.fps = Some(fps);
        Ok(self)
    }

    /// Stops after `frames` video frames (`-frames:v`).
    pub fn frames(&mut self, frames: u64) -> Result<&mut Self, CommandError> {
        self.current_video()?.frames = Some(frames);
        Ok(self)
    }

    /// Sets the frame size from `WxH`, `Wx?`, `?xH` or `N%`.
    pub fn size(&mut self, size: &str) -> Result<&mut Self, CommandError> {
        let size: SizeSpec = size.parse()?;
        self.size_spec(size)
    }

    /// Sets the frame size.
    pub fn size_spec(&mut self, size: SizeSpec) -> Result<&mut Self, CommandError> {
        self.current_video()?.size = Some(size);
        Ok(self)
    }

    /// Appends video filters, in order. A size is applied after them.
    pub fn video_filters<I, F>(&mut self, filters: I) -> Result<&mut Self, CommandError>
    where
        I: IntoIterator<Item = F>,
        F: Into<Filter>,
    {
        self.current_video()?
            .filters
            .extend(filters.into_iter().map(Into::into));
        Ok(self)
    }

    // Run

    /// The argument vector as it would be lowered now, with stream
    /// endpoints shown as `<stream>`.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for input in &self.inputs {
            let source = match &input.source {
                InputSource::File(path) => path.as_str(),
                InputSource::Stream(_) => STREAM_PLACEHOLDER,
            };
            args.extend(lower_input(&input.settings, source));
        }
        for output in &self.outputs {
            let destination = match &output.destination {
                OutputDestination::File(path) => path.as_str(),
                OutputDestination::Stream { .. } => STREAM_PLACEHOLDER,
            };
            args.extend(lower_output(&output.settings, destination));
        }
        args
    }

    /// Starts ffmpeg.
    ///
    /// Opens a channel bridge for every stream-backed input and output,
    /// then spawns the run on the current tokio runtime. Fails without
    /// spawning anything if the command already ran, has no input or no
    /// output, or a bridge cannot be bound.
    pub fn run(&mut self) -> Result<RunHandle, CommandError> {
        if self.ran {
            return Err(CommandError::AlreadyRun);
        }
        if self.inputs.is_empty() {
            return Err(CommandError::NoInput);
        }
        if self.outputs.is_empty() {
            return Err(CommandError::NoOutput);
        }
        self.ran = true;

        let inputs = std::mem::take(&mut self.inputs);
        let outputs = std::mem::take(&mut self.outputs);
        let mut bridges = Vec::new();
        let mut args = Vec::new();

        for input in inputs {
            let source = match input.source {
                InputSource::File(path) => path,
                InputSource::Stream(reader) => {
                    let bridge = ChannelBridge::open_input(reader, &self.bridge_config)?;
                    let address = bridge.address().to_string();
                    bridges.push(bridge);
                    address
                }
            };
            args.extend(lower_input(&input.settings, &source));
        }

        for output in outputs {
            let destination = match output.destination {
                OutputDestination::File(path) => path,
                OutputDestination::Stream { writer, options } => {
                    let bridge =
                        ChannelBridge::open_output(writer, options, &self.bridge_config)?;
                    let address = bridge.address().to_string();
                    bridges.push(bridge);
                    address
                }
            };
            args.extend(lower_output(&output.settings, &destination));
        }

        debug!(bridges = bridges.len(), ?args, "Lowered ffmpeg command");

        let context = RunContext {
            executor: Arc::clone(&self.executor),
            request: ExecRequest::new(self.ffmpeg_path.clone(), args)
                .with_cancel(self.cancel.clone()),
            bridges,
            relay: std::mem::take(&mut self.relay),
            stderr_line_limit: self.stderr_line_limit,
        };
        Ok(context.start())
    }

    /// Whether [`run`](Self::run) has been called successfully.
    pub fn has_run(&self) -> bool {
        self.ran
    }
}

impl std::fmt::Debug for FfmpegCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegCommand")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("executor", &self.executor.name())
            .field("ran", &self.ran)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_scoped_calls_need_an_input() {
        let mut command = FfmpegCommand::new();
        assert!(matches!(command.input_format("wav"), Err(CommandError::NoInput)));
        assert!(matches!(command.native(), Err(CommandError::NoInput)));
        assert!(matches!(command.input_options("-re"), Err(CommandError::NoInput)));
    }

    #[test]
    fn test_output_scoped_calls_need_an_output() {
        let mut command = FfmpegCommand::new();
        command.input("in.wav");
        assert!(matches!(command.no_audio(), Err(CommandError::NoOutput)));
        assert!(matches!(command.audio_codec("aac"), Err(CommandError::NoOutput)));
        assert!(matches!(command.size("50%"), Err(CommandError::NoOutput)));
    }

    #[test]
    fn test_input_calls_target_last_input() {
        let mut command = FfmpegCommand::new();
        command
            .input("a.wav")
            .input_format("wav")
            .unwrap()
            .input("cover.png")
            .input_loop(None)
            .unwrap()
            .input_fps(1.0)
            .unwrap();

        assert_eq!(
            command.args(),
            vec!["-f", "wav", "-i", "a.wav", "-r", "1", "-loop", "1", "-i", "cover.png"]
        );
    }

    #[test]
    fn test_input_loop_rejects_duration() {
        let mut command = FfmpegCommand::new();
        command.input("cover.png");
        assert!(matches!(
            command.input_loop(Some(TimeSpec::from(10u32))),
            Err(CommandError::LoopDuration)
        ));
        assert!(command.args().iter().all(|arg| arg != "-loop"));
    }

    #[test]
    fn test_disabled_track_rejects_settings_until_next_output() {
        let mut command = FfmpegCommand::new();
        command.input("in.mp4").output("a.mp4").no_audio().unwrap();

        assert!(matches!(
            command.audio_bitrate(128u32),
            Err(CommandError::TrackDisabled { track: "audio" })
        ));
        assert!(command.video_codec("libx264").is_ok());

        command.output("b.mp4");
        assert!(command.audio_bitrate(128u32).is_ok());

        command.no_video().unwrap();
        assert!(matches!(
            command.fps(25.0),
            Err(CommandError::TrackDisabled { track: "video" })
        ));
    }

    #[test]
    fn test_invalid_size_is_rejected_at_the_call() {
        let mut command = FfmpegCommand::new();
        command.input("in.mp4").output("out.mp4");
        assert!(matches!(command.size("?x?"), Err(CommandError::InvalidSize { .. })));
        assert!(!command.args().iter().any(|arg| arg == "-vf"));
    }

    #[test]
    fn test_size_spec_lowers_to_scale_filter() {
        let mut command = FfmpegCommand::new();
        command
            .input("in.mp4")
            .output("out.mp4")
            .size_spec(SizeSpec::dimensions(None, Some(720)).unwrap())
            .unwrap();
        assert_eq!(
            command.args(),
            vec!["-i", "in.mp4", "-vf", "scale=w=-2:h=720", "out.mp4"]
        );

        assert!(SizeSpec::dimensions(None, None).is_err());
        assert!(SizeSpec::percent(-50.0).is_err());
    }

    #[test]
    fn test_options_preserve_call_order() {
        let mut command = FfmpegCommand::new();
        command
            .input("in.mp4")
            .output("out.mp4")
            .output_options("-preset fast")
            .unwrap()
            .output_options("-crf 23 -metadata 'title=A B'")
            .unwrap();

        assert_eq!(
            command.args(),
            vec![
                "-i",
                "in.mp4",
                "-preset",
                "fast",
                "-crf",
                "23",
                "-metadata",
                "title=A B",
                "out.mp4"
            ]
        );
    }

    #[test]
    fn test_invalid_options_leave_command_unchanged() {
        let mut command = FfmpegCommand::new();
        command.input("in.mp4");
        assert!(matches!(
            command.input_options("-metadata 'oops"),
            Err(CommandError::InvalidOptions { .. })
        ));
        assert_eq!(command.args(), vec!["-i", "in.mp4"]);
    }

    #[test]
    fn test_streams_are_previewed_as_placeholders() {
        let mut command = FfmpegCommand::new();
        command
            .input(InputSource::stream(tokio::io::empty()))
            .input_format("s16le")
            .unwrap()
            .output(OutputDestination::stream(tokio::io::sink()))
            .format("mp3")
            .unwrap();

        assert_eq!(
            command.args(),
            vec!["-f", "s16le", "-i", "<stream>", "-f", "mp3", "<stream>"]
        );
    }

    #[test]
    fn test_run_requires_inputs_and_outputs() {
        let mut command = FfmpegCommand::new();
        assert!(matches!(command.run(), Err(CommandError::NoInput)));
        command.input("in.mp4");
        assert!(matches!(command.run(), Err(CommandError::NoOutput)));
        assert!(!command.has_run());
    }

    #[test]
    fn test_with_config_uses_binary_and_limit() {
        let mut config = Config::default();
        config.binaries.ffmpeg = PathBuf::from("/opt/ffmpeg/bin/ffmpeg");
        config.command.stderr_line_limit = 5;

        let command = FfmpegCommand::with_config(&config);
        assert_eq!(command.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(command.stderr_line_limit, 5);
    }
}
