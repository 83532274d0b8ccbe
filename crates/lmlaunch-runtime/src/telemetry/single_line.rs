//! TabbyAPI request metrics.
//!
//! ```text
//! Metrics (ID: 9c1f): 100 tokens generated in 2.2 seconds (Queue: 0.0 s, Process: 0 cached tokens and 40 new tokens at 200.0 T/s, Generate: 50.0 T/s, Context: 40 tokens)
//! ```
//!
//! Durations are derived from token count and rate.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use lmlaunch_core::RequestStat;
use regex::Regex;

static GENERATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) tokens generated .*? Generate: ([\d.]+) T/s")
        .expect("generation pattern is valid")
});

static PROCESSED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Process: .*? (\d+) new tokens at ([\d.]+) T/s").expect("process pattern is valid")
});

/// Milliseconds needed for `tokens` at `rate` tokens per second.
#[allow(clippy::cast_precision_loss)]
fn duration_ms(tokens: u64, rate: f64) -> Option<f64> {
    (rate > 0.0).then(|| tokens as f64 / rate * 1000.0)
}

fn parse_pair(caps: &regex::Captures<'_>) -> Option<(u64, f64)> {
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Emits one stat per `tokens generated` line.
///
/// Prompt processing figures are taken from the same line, or else from a
/// `Process:` line immediately before it. Any other line in between drops
/// the pending figures.
#[derive(Debug, Clone, Default)]
pub struct SingleLineParser {
    pending_process: Option<(u64, f64)>,
}

impl SingleLineParser {
    pub fn feed(&mut self, line: &str, now: DateTime<Utc>) -> Option<RequestStat> {
        let process = PROCESSED.captures(line).and_then(|c| parse_pair(&c));
        let Some((tokens, rate)) = GENERATED.captures(line).and_then(|c| parse_pair(&c)) else {
            self.pending_process = process;
            return None;
        };

        let process = process.or_else(|| self.pending_process.take());
        self.pending_process = None;

        Some(RequestStat {
            timestamp: now,
            time_process: process.and_then(|(t, r)| duration_ms(t, r)),
            time_generate: duration_ms(tokens, rate),
            tokens_process: process.map(|(t, _)| t),
            tokens_generate: tokens,
        })
    }
}
