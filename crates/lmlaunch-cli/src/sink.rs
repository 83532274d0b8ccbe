//! Terminal echo of backend output.

use std::io::{self, Write};

use lmlaunch_core::{LogSinkPort, LogStream};

/// Writes each backend line to this process's stdout or stderr, matching
/// the stream it came from.
#[derive(Debug, Clone, Copy)]
pub struct TerminalLogSink {
    enabled: bool,
}

impl TerminalLogSink {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl LogSinkPort for TerminalLogSink {
    fn append(&self, stream: LogStream, line: &str) {
        if !self.enabled {
            return;
        }
        // A closed terminal must not take the reader task down.
        let _ = match stream {
            LogStream::Stdout => writeln!(io::stdout().lock(), "{line}"),
            LogStream::Stderr => writeln!(io::stderr().lock(), "{line}"),
        };
    }
}
