//! Log sink port for republishing backend output.
//!
//! The reader task forwards every line the child prints to a sink. The CLI
//! echoes lines to the terminal; library users that only want telemetry use
//! [`NoopLogSink`].

use std::fmt;

/// Which pipe a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port for receiving backend log lines.
///
/// Called from the reader task for every line; implementations must not
/// block.
pub trait LogSinkPort: Send + Sync {
    /// Append one line (without its trailing newline).
    fn append(&self, stream: LogStream, line: &str);
}

/// Sink that discards every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogSink;

impl LogSinkPort for NoopLogSink {
    fn append(&self, _stream: LogStream, _line: &str) {}
}
