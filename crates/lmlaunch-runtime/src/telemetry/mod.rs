//! Log-line telemetry parsers.
//!
//! Each engine prints request timings in its own format. A parser is fed
//! every output line in order and yields a [`RequestStat`] whenever a
//! request's timings are complete. Lines that fail numeric parsing are
//! ignored without disturbing state built from earlier lines.

mod single_line;
mod two_phase;

pub use single_line::SingleLineParser;
pub use two_phase::TwoPhaseParser;

use chrono::{DateTime, Utc};
use lmlaunch_core::{BackendKind, RequestStat};

/// Per-engine telemetry parser.
#[derive(Debug, Clone)]
pub enum TelemetryParser {
    /// llama.cpp: a `prompt eval time` line opens a request, the following
    /// `eval time` line closes it.
    TwoPhase(TwoPhaseParser),
    /// TabbyAPI: one metrics line per request, with prompt processing on the
    /// same line or the one before.
    SingleLine(SingleLineParser),
}

impl TelemetryParser {
    #[must_use]
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::LlamaCpp => Self::TwoPhase(TwoPhaseParser::default()),
            BackendKind::TabbyApi => Self::SingleLine(SingleLineParser::default()),
        }
    }

    /// Feed one line; returns a stat when a request completes.
    pub fn feed(&mut self, line: &str, now: DateTime<Utc>) -> Option<RequestStat> {
        match self {
            Self::TwoPhase(parser) => parser.feed(line, now),
            Self::SingleLine(parser) => parser.feed(line, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_per_backend() {
        let now = Utc::now();

        let mut llama = TelemetryParser::for_backend(BackendKind::LlamaCpp);
        assert!(matches!(llama, TelemetryParser::TwoPhase(_)));
        assert!(llama.feed("prompt eval time = 10.0 ms / 5 tokens", now).is_none());
        assert!(llama.feed("       eval time = 20.0 ms / 4 tokens", now).is_some());

        let mut tabby = TelemetryParser::for_backend(BackendKind::TabbyApi);
        assert!(matches!(tabby, TelemetryParser::SingleLine(_)));
        assert!(
            tabby
                .feed("7 tokens generated in 1.0 seconds (Generate: 7.0 T/s)", now)
                .is_some()
        );
    }
}
