use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ffwire_core::{
    load_config, load_default_config, validate_config, CommandEvent, Config, FfmpegCommand,
    FfprobeProber, InputSource, OutputDestination, Prober, RunOutcome, TimeSpec,
};

/// Config file used when `FFWIRE_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "ffwire.toml";

/// Placeholder for process stdin/stdout in INPUT/OUTPUT.
const STDIO: &str = "-";

/// Run ffmpeg through a fluent command builder
#[derive(Parser, Debug)]
#[command(name = "ffwire", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcode INPUT into OUTPUT; `-` streams stdin/stdout through a bridge
    Transcode(TranscodeArgs),
    /// Print stream information of a media file as JSON
    Probe { file: PathBuf },
    /// Print the ffmpeg arguments a transcode would use
    Args(TranscodeArgs),
}

#[derive(clap::Args, Debug)]
struct TranscodeArgs {
    input: String,

    output: String,

    /// Output container format
    #[arg(short, long)]
    format: Option<String>,

    /// Force the input format
    #[arg(long)]
    input_format: Option<String>,

    /// Start reading the input at this time
    #[arg(long)]
    seek: Option<String>,

    /// Limit the output duration
    #[arg(short, long)]
    duration: Option<String>,

    #[arg(long, conflicts_with = "no_audio")]
    audio_codec: Option<String>,

    /// Audio bitrate, e.g. 128k
    #[arg(long, conflicts_with = "no_audio")]
    audio_bitrate: Option<String>,

    #[arg(long, conflicts_with = "no_video")]
    video_codec: Option<String>,

    /// Video bitrate, e.g. 1M
    #[arg(long, conflicts_with = "no_video")]
    video_bitrate: Option<String>,

    /// Frame size: WxH, Wx?, ?xH or N%
    #[arg(short, long, conflicts_with = "no_video")]
    size: Option<String>,

    /// Output frame rate
    #[arg(long, conflicts_with = "no_video")]
    fps: Option<f64>,

    /// Drop audio from the output
    #[arg(long)]
    no_audio: bool,

    /// Drop video from the output
    #[arg(long)]
    no_video: bool,

    /// Extra options placed before the input
    #[arg(long, allow_hyphen_values = true)]
    input_options: Option<String>,

    /// Extra options placed before the output
    #[arg(long, allow_hyphen_values = true)]
    output_options: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // stdout may carry media, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_cli_config()?;
    validate_config(&config).context("Configuration validation failed")?;

    match cli.command {
        Command::Transcode(args) => transcode(&config, &args).await,
        Command::Probe { file } => probe(&config, &file).await,
        Command::Args(args) => {
            let command = build_command(&config, &args)?;
            println!("{}", command.args().join(" "));
            Ok(())
        }
    }
}

fn load_cli_config() -> Result<Config> {
    match std::env::var("FFWIRE_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        Err(_) => {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                load_config(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))
            } else {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                load_default_config().context("Failed to load default configuration")
            }
        }
    }
}

fn build_command(config: &Config, args: &TranscodeArgs) -> Result<FfmpegCommand> {
    let mut command = FfmpegCommand::with_config(config);

    if args.input == STDIO {
        command.input(InputSource::stream(tokio::io::stdin()));
    } else {
        command.input(args.input.as_str());
    }
    if let Some(format) = &args.input_format {
        command.input_format(format)?;
    }
    if let Some(seek) = &args.seek {
        command.seek_input(parse_time(seek))?;
    }
    if let Some(options) = &args.input_options {
        command.input_options(options)?;
    }

    if args.output == STDIO {
        command.output(OutputDestination::stream(tokio::io::stdout()));
    } else {
        command.output(args.output.as_str());
    }
    if let Some(format) = &args.format {
        command.format(format)?;
    }
    if let Some(duration) = &args.duration {
        command.duration(parse_time(duration))?;
    }

    // clap rejects track settings combined with --no-audio/--no-video.
    if args.no_audio {
        command.no_audio()?;
    }
    if let Some(codec) = &args.audio_codec {
        command.audio_codec(codec)?;
    }
    if let Some(bitrate) = &args.audio_bitrate {
        command.audio_bitrate(bitrate.as_str())?;
    }

    if args.no_video {
        command.no_video()?;
    }
    if let Some(codec) = &args.video_codec {
        command.video_codec(codec)?;
    }
    if let Some(bitrate) = &args.video_bitrate {
        command.video_bitrate(bitrate.as_str())?;
    }
    if let Some(fps) = args.fps {
        command.fps(fps)?;
    }
    if let Some(size) = &args.size {
        command.size(size)?;
    }

    if let Some(options) = &args.output_options {
        command.output_options(options)?;
    }

    Ok(command)
}

/// Plain numbers are seconds; anything else is passed to ffmpeg as-is.
fn parse_time(value: &str) -> TimeSpec {
    value
        .parse::<f64>()
        .map(TimeSpec::Seconds)
        .unwrap_or_else(|_| TimeSpec::from(value))
}

async fn transcode(config: &Config, args: &TranscodeArgs) -> Result<()> {
    let mut command = build_command(config, args)?;
    let mut events = command.subscribe();
    let handle = command.run().context("Failed to start ffmpeg")?;

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping ffmpeg");
            cancel.cancel();
        }
    });

    let logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                CommandEvent::Start { command_line } => info!("Running: {}", command_line),
                CommandEvent::CodecData(data) => info!(
                    input = data.input_index,
                    format = %data.format,
                    duration = ?data.duration,
                    audio = ?data.audio,
                    video = ?data.video,
                    "Input detected"
                ),
                CommandEvent::Progress(progress) => info!(
                    timemark = ?progress.timemark,
                    frames = ?progress.frames,
                    speed = ?progress.speed,
                    "Progress"
                ),
                CommandEvent::Stderr(line) => debug!("ffmpeg: {}", line),
                CommandEvent::End { .. } | CommandEvent::Error { .. } => {}
            }
        }
    });

    let outcome = handle.wait().await;
    let _ = logger.await;

    match outcome {
        RunOutcome::Completed { .. } => {
            info!("Done");
            Ok(())
        }
        RunOutcome::Failed { error, stderr } => {
            if !stderr.is_empty() {
                error!("ffmpeg output:\n{}", stderr);
            }
            bail!("ffmpeg failed: {}", error)
        }
    }
}

async fn probe(config: &Config, file: &std::path::Path) -> Result<()> {
    let prober = FfprobeProber::from_config(&config.binaries);
    let info = prober
        .probe(file)
        .await
        .with_context(|| format!("Failed to probe {:?}", file))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcode_args(argv: &[&str]) -> TranscodeArgs {
        let mut full = vec!["ffwire", "args"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Args(args) => args,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_build_command_args() {
        let args = transcode_args(&[
            "in.mp4",
            "out.webm",
            "--no-audio",
            "--video-codec",
            "libvpx-vp9",
            "--video-bitrate",
            "1M",
            "--size",
            "1280x?",
            "--duration",
            "10",
        ]);
        let command = build_command(&Config::default(), &args).unwrap();
        assert_eq!(
            command.args(),
            vec![
                "-i",
                "in.mp4",
                "-t",
                "10",
                "-an",
                "-c:v",
                "libvpx-vp9",
                "-b:v",
                "1M",
                "-vf",
                "scale=w=1280:h=-2",
                "out.webm"
            ]
        );
    }

    #[tokio::test]
    async fn test_stdio_is_bridged() {
        let args = transcode_args(&["-", "-", "--input-format", "wav", "--format", "mp3"]);
        let command = build_command(&Config::default(), &args).unwrap();
        assert_eq!(
            command.args(),
            vec!["-f", "wav", "-i", "<stream>", "-f", "mp3", "<stream>"]
        );
    }

    #[test]
    fn test_invalid_size_is_reported() {
        let args = transcode_args(&["in.mp4", "out.mp4", "--size", "?x?"]);
        assert!(build_command(&Config::default(), &args).is_err());
    }

    #[test]
    fn test_extra_options() {
        let args = transcode_args(&[
            "in.mp4",
            "out.mp4",
            "--input-options",
            "-thread_queue_size 512",
            "--output-options",
            "-movflags +faststart",
        ]);
        let command = build_command(&Config::default(), &args).unwrap();
        assert_eq!(
            command.args(),
            vec![
                "-thread_queue_size",
                "512",
                "-i",
                "in.mp4",
                "-movflags",
                "+faststart",
                "out.mp4"
            ]
        );
    }

    #[test]
    fn test_no_audio_and_no_video_together() {
        let args = transcode_args(&["in.mkv", "subs.srt", "--no-audio", "--no-video"]);
        let command = build_command(&Config::default(), &args).unwrap();
        assert_eq!(command.args(), vec!["-i", "in.mkv", "-an", "-vn", "subs.srt"]);
    }

    #[test]
    fn test_disabled_track_settings_conflict() {
        for argv in [
            ["in.mp4", "out.mp4", "--no-audio", "--audio-codec", "aac"],
            ["in.mp4", "out.mp4", "--no-audio", "--audio-bitrate", "128k"],
            ["in.mp4", "out.mp4", "--no-video", "--video-codec", "libx264"],
            ["in.mp4", "out.mp4", "--no-video", "--size", "50%"],
        ] {
            let mut full = vec!["ffwire", "args"];
            full.extend_from_slice(&argv);
            assert!(Cli::try_parse_from(full).is_err(), "{:?} should conflict", argv);
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("90"), TimeSpec::Seconds(90.0));
        assert_eq!(parse_time("00:01:30"), TimeSpec::Raw("00:01:30".to_string()));
    }
}
