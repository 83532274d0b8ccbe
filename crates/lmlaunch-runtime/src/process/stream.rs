//! Streaming log reader for backend output.
//!
//! Engines can emit non-UTF-8 bytes, so lines are split on raw `\n` and
//! decoded lossily. One task drains both pipes; it republishes each line to
//! the supervisor's queue and the log sink, and feeds the telemetry parser.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use lmlaunch_core::{LogSinkPort, LogStream, TelemetryWindow};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::telemetry::TelemetryParser;

/// One decoded output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub stream: LogStream,
    pub text: String,
}

/// Handle to the reader task of one child process.
#[derive(Debug)]
pub struct StreamingLogReader {
    task: JoinHandle<()>,
}

impl StreamingLogReader {
    /// Start reading `stdout` and `stderr` until both reach EOF.
    pub fn spawn<O, E>(
        stdout: O,
        stderr: E,
        queue: UnboundedSender<LogLine>,
        mut parser: TelemetryParser,
        telemetry: Arc<Mutex<TelemetryWindow>>,
        sink: Arc<dyn LogSinkPort>,
    ) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut out = BufReader::new(stdout).split(b'\n');
            let mut err = BufReader::new(stderr).split(b'\n');
            let (mut out_open, mut err_open) = (true, true);

            while out_open || err_open {
                let (stream, segment) = tokio::select! {
                    r = out.next_segment(), if out_open => (LogStream::Stdout, r),
                    r = err.next_segment(), if err_open => (LogStream::Stderr, r),
                };

                let bytes = match segment {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => {
                        close(stream, &mut out_open, &mut err_open);
                        continue;
                    }
                    Err(e) => {
                        debug!(%stream, error = %e, "log stream reader stopping on read error");
                        close(stream, &mut out_open, &mut err_open);
                        continue;
                    }
                };

                let text = decode_line(&bytes);
                trace!(%stream, "{text}");
                sink.append(stream, &text);

                if let Some(stat) = parser.feed(&text, Utc::now()) {
                    debug!(
                        tokens_generate = stat.tokens_generate,
                        tokens_process = ?stat.tokens_process,
                        "request telemetry"
                    );
                    telemetry
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(stat);
                }

                // The supervisor stops listening once the backend is ready.
                let _ = queue.send(LogLine { stream, text });
            }

            debug!("log stream reader task exiting");
        });

        Self { task }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait up to `grace` for the pipes to drain, then abort the task.
    ///
    /// Grandchildren may inherit the pipes and keep them open after the
    /// backend itself is gone.
    pub async fn join(mut self, grace: Duration) {
        if tokio::time::timeout(grace, &mut self.task).await.is_err() {
            debug!("log stream reader still running after child exit, aborting");
            self.task.abort();
        }
    }
}

impl Drop for StreamingLogReader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn close(stream: LogStream, out_open: &mut bool, err_open: &mut bool) {
    match stream {
        LogStream::Stdout => *out_open = false,
        LogStream::Stderr => *err_open = false,
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
