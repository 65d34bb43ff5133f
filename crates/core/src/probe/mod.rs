//! Media file inspection through ffprobe.

mod error;
mod ffprobe;
mod traits;
mod types;

pub use error::ProbeError;
pub use ffprobe::FfprobeProber;
pub use traits::Prober;
pub use types::{MediaInfo, StreamDetails, StreamInfo};
