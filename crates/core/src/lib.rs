pub mod bridge;
pub mod command;
pub mod config;
pub mod executor;
pub mod probe;
pub mod progress;
pub mod testing;

pub use bridge::{BridgeError, ChannelBridge, PipeOptions};
pub use command::{
    Bitrate, CommandError, CommandEvent, Filter, FfmpegCommand, InputSource, OutputDestination,
    RunHandle, RunOutcome, SizeSpec, TimeSpec,
};
pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config, ConfigError,
    ToolPaths,
};
pub use executor::{ExecRequest, Execution, ExecutionError, Executor, TokioExecutor};
pub use probe::{FfprobeProber, MediaInfo, ProbeError, Prober, StreamDetails, StreamInfo};
pub use progress::{CodecData, Progress};
