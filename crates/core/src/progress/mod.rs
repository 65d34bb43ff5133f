//! Structured information scraped from ffmpeg's stderr.
//!
//! Feeds the `CodecData` and `Progress` events of a run. Nothing here
//! estimates completion; callers that know the input duration can compare
//! it against [`Progress::timemark`] themselves.

mod parser;
mod types;

pub use parser::StderrParser;
pub use types::{CodecData, Progress, StderrInfo};
