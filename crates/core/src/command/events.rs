use std::sync::Arc;
use tokio::sync::mpsc;

use crate::executor::ExecutionError;
use crate::progress::{CodecData, Progress};

/// Lifecycle notification of a run.
///
/// A run emits `Start` first and exactly one of `End` or `Error` last.
/// ffmpeg's stdout is never captured, so `stdout` is always empty.
#[derive(Debug, Clone)]
pub enum CommandEvent {
    /// The process was spawned.
    Start { command_line: String },
    /// Stream information for one input.
    CodecData(CodecData),
    /// An encoding status line.
    Progress(Progress),
    /// A raw stderr line.
    Stderr(String),
    /// The run failed; `stderr` holds the retained diagnostic lines.
    Error {
        error: Arc<ExecutionError>,
        stdout: String,
        stderr: String,
    },
    /// The run completed successfully.
    End { stdout: String, stderr: String },
}

impl CommandEvent {
    /// Get the event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::CodecData(_) => "codecData",
            Self::Progress(_) => "progress",
            Self::Stderr(_) => "stderr",
            Self::Error { .. } => "error",
            Self::End { .. } => "end",
        }
    }

    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::End { .. })
    }
}

/// Fans events out to every subscriber.
///
/// Subscribers whose receiver was dropped are pruned on the next emit.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventRelay {
    subscribers: Vec<mpsc::UnboundedSender<CommandEvent>>,
}

impl EventRelay {
    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<CommandEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn emit(&mut self, event: CommandEvent) {
        tracing::trace!(event = event.name(), "Emitting command event");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
