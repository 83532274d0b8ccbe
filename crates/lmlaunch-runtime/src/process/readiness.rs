//! Startup readiness loop.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::stream::LogLine;
use crate::backend::{BackendController, ReadySignal};

/// How a startup attempt ended.
#[derive(Debug)]
pub enum Readiness {
    Ready(ReadySignal),
    /// The child exited without signalling readiness.
    Exited(Option<ExitStatus>),
    /// No output for longer than the startup timeout.
    TimedOut,
    Cancelled,
}

/// Something that can report whether the child has exited.
pub trait ExitProbe {
    fn try_exit(&mut self) -> io::Result<Option<ExitStatus>>;
}

impl ExitProbe for tokio::process::Child {
    fn try_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        self.try_wait()
    }
}

/// Poll the line queue until the backend signals readiness.
///
/// Every `poll_interval` the queued lines are drained into `on_line` and
/// checked for the ready signal. The child is only checked for exit when
/// no output arrived in that tick. The timeout counts from the last line
/// seen, so a slow but chatty startup never times out.
pub async fn wait_for_ready(
    backend: &BackendController,
    child: &mut impl ExitProbe,
    lines: &mut UnboundedReceiver<LogLine>,
    poll_interval: Duration,
    startup_timeout: Duration,
    cancel: &CancellationToken,
    mut on_line: impl FnMut(&str),
) -> Readiness {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Readiness::Cancelled,
            _ = ticker.tick() => {}
        }

        let mut saw_output = false;
        while let Ok(line) = lines.try_recv() {
            saw_output = true;
            last_activity = Instant::now();
            on_line(&line.text);
            if let Some(signal) = backend.ready_signal(&line.text) {
                return Readiness::Ready(signal);
            }
        }

        if !saw_output {
            match child.try_exit() {
                Ok(Some(status)) => {
                    // Pick up whatever the reader delivered after the last drain.
                    while let Ok(line) = lines.try_recv() {
                        on_line(&line.text);
                    }
                    return Readiness::Exited(Some(status));
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(error = %e, "could not query child status");
                    return Readiness::Exited(None);
                }
            }
        }

        if last_activity.elapsed() > startup_timeout {
            return Readiness::TimedOut;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmlaunch_core::{BackendKind, GgufHeader, GgufParseError, GgufReaderPort, LogStream, Settings};
    use std::path::Path;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct NoGguf;

    impl GgufReaderPort for NoGguf {
        fn read_header(&self, path: &Path) -> Result<GgufHeader, GgufParseError> {
            Err(GgufParseError::NotFound(path.display().to_string()))
        }
    }

    /// Child stand-in that never exits, or exits on the first query.
    struct FakeChild(Option<ExitStatus>);

    impl ExitProbe for FakeChild {
        fn try_exit(&mut self) -> io::Result<Option<ExitStatus>> {
            Ok(self.0)
        }
    }

    #[cfg(unix)]
    fn exit_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    fn llama() -> BackendController {
        BackendController::for_kind(BackendKind::LlamaCpp, &Settings::with_defaults(), Arc::new(NoGguf))
    }

    fn line(text: &str) -> LogLine {
        LogLine {
            stream: LogStream::Stderr,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn ready_line_ends_wait() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(line("loading model")).unwrap();
        tx.send(line("main: server is listening on http://127.0.0.1:8080 - starting the main loop"))
            .unwrap();
        tx.send(line("after ready")).unwrap();

        let mut seen = Vec::new();
        let outcome = wait_for_ready(
            &llama(),
            &mut FakeChild(None),
            &mut rx,
            Duration::from_millis(10),
            Duration::from_secs(5),
            &CancellationToken::new(),
            |l| seen.push(l.to_string()),
        )
        .await;

        match outcome {
            Readiness::Ready(signal) => {
                assert_eq!(signal.access_url.as_deref(), Some("http://127.0.0.1:8080"));
            }
            other => panic!("expected ready, got {other:?}"),
        }
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn silence_times_out() {
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let started = std::time::Instant::now();
        let outcome = wait_for_ready(
            &llama(),
            &mut FakeChild(None),
            &mut rx,
            Duration::from_millis(10),
            Duration::from_millis(100),
            &CancellationToken::new(),
            |_| {},
        )
        .await;
        assert!(matches!(outcome, Readiness::TimedOut));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn exit_without_signal() {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogLine>();
        drop(tx);
        let outcome = wait_for_ready(
            &llama(),
            &mut FakeChild(Some(exit_status(1))),
            &mut rx,
            Duration::from_millis(10),
            Duration::from_secs(5),
            &CancellationToken::new(),
            |_| {},
        )
        .await;
        match outcome {
            Readiness::Exited(Some(status)) => assert_eq!(status.code(), Some(1)),
            other => panic!("expected exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_wins() {
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = wait_for_ready(
            &llama(),
            &mut FakeChild(None),
            &mut rx,
            Duration::from_millis(10),
            Duration::from_secs(5),
            &cancel,
            |_| {},
        )
        .await;
        assert!(matches!(outcome, Readiness::Cancelled));
    }
}
