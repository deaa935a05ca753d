// Log sinks
//
// The engine never writes to a global logger. Every run receives a sink and
// reports progress and skip reasons to it; the caller decides where lines go.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.at.format("%Y/%m/%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Destination for run log lines. Shared by all extraction workers.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: LogLine);

    fn info(&self, message: String) {
        self.emit(LogLine::new(LogLevel::Info, message));
    }

    fn warn(&self, message: String) {
        self.emit(LogLine::new(LogLevel::Warn, message));
    }

    fn error(&self, message: String) {
        self.emit(LogLine::new(LogLevel::Error, message));
    }
}

/// Streams lines to a receiver that can be drained while the run is in progress.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LogLine>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelSink {
    fn emit(&self, line: LogLine) {
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(line);
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<LogLine>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.message).collect()
    }

    /// True if any line's message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|l| l.message.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn emit(&self, line: LogLine) {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).push(line);
    }
}

/// Forwards lines to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, line: LogLine) {
        match line.level {
            LogLevel::Info => tracing::info!(target: "listmerge", "{}", line.message),
            LogLevel::Warn => tracing::warn!(target: "listmerge", "{}", line.message),
            LogLevel::Error => tracing::error!(target: "listmerge", "{}", line.message),
        }
    }
}
