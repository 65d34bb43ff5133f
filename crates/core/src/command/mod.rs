//! Fluent ffmpeg command builder.
//!
//! A [`FfmpegCommand`] accumulates inputs and outputs, each with its own
//! settings, and lowers them into ffmpeg's positional argument grammar:
//!
//! ```text
//! [input options] -i <input> ... [output options] <output> ...
//! ```
//!
//! Inputs and outputs may be files/URLs or in-process streams. Streams are
//! exposed to ffmpeg through a [`ChannelBridge`](crate::bridge::ChannelBridge)
//! opened when the command runs and closed once the process has exited.
//!
//! # Example
//!
//! ```rust,ignore
//! use ffwire_core::command::{CommandEvent, FfmpegCommand};
//!
//! let mut command = FfmpegCommand::new();
//! command
//!     .input("talk.wav")
//!     .output("talk.mp3")
//!     .audio_codec("libmp3lame")?
//!     .audio_bitrate(192)?;
//!
//! let mut events = command.subscribe();
//! let run = command.run()?;
//! while let Some(event) = events.recv().await {
//!     if let CommandEvent::Progress(progress) = event {
//!         println!("at {:?}", progress.timemark);
//!     }
//! }
//! let outcome = run.wait().await;
//! ```

mod builder;
mod diagnostics;
mod error;
mod events;
mod lowering;
mod options;
mod runner;
mod size;
mod types;

pub use builder::FfmpegCommand;
pub use diagnostics::DiagnosticBuffer;
pub use error::CommandError;
pub use events::CommandEvent;
pub use lowering::{filter_graph, lower_audio, lower_input, lower_output, lower_video};
pub use options::tokenize_options;
pub use runner::{RunHandle, RunOutcome};
pub use size::SizeSpec;
pub use types::{
    AudioSettings, Bitrate, Filter, FilterOptions, InputSettings, InputSource, InputSpec,
    OutputDestination, OutputSettings, OutputSpec, TimeSpec, Track, VideoSettings,
};
