//! llama.cpp request timings.
//!
//! llama-server prints, per request:
//!
//! ```text
//! prompt eval time =     120.00 ms /    50 tokens (    2.40 ms per token,   416.67 tokens per second)
//!        eval time =     900.00 ms /    80 tokens (   11.25 ms per token,    88.89 tokens per second)
//! ```

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use lmlaunch_core::RequestStat;
use regex::Regex;
use tracing::trace;

static PROMPT_EVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"prompt eval time =\s*([\d.]+) ms\s*/\s*(\d+) tokens")
        .expect("prompt eval pattern is valid")
});

static EVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"eval time =\s*([\d.]+) ms\s*/\s*(\d+) tokens").expect("eval pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
struct OpenRequest {
    timestamp: DateTime<Utc>,
    time_process: f64,
    tokens_process: u64,
}

/// Pairs `prompt eval time` lines with the next `eval time` line.
///
/// - A new prompt line replaces a request that was never closed.
/// - An `eval time` line with no open request is dropped.
#[derive(Debug, Clone, Default)]
pub struct TwoPhaseParser {
    open: Option<OpenRequest>,
}

impl TwoPhaseParser {
    pub fn feed(&mut self, line: &str, now: DateTime<Utc>) -> Option<RequestStat> {
        // "prompt eval time" also matches the generation pattern; test it first.
        if let Some(caps) = PROMPT_EVAL.captures(line) {
            if let (Ok(ms), Ok(tokens)) = (caps[1].parse::<f64>(), caps[2].parse::<u64>()) {
                self.open = Some(OpenRequest {
                    timestamp: now,
                    time_process: ms,
                    tokens_process: tokens,
                });
            }
            return None;
        }

        let caps = EVAL.captures(line)?;
        let (Ok(ms), Ok(tokens)) = (caps[1].parse::<f64>(), caps[2].parse::<u64>()) else {
            return None;
        };
        let Some(open) = self.open.take() else {
            trace!("generation timing without prompt timing, dropped");
            return None;
        };

        Some(RequestStat {
            timestamp: open.timestamp,
            time_process: Some(open.time_process),
            time_generate: Some(ms),
            tokens_process: Some(open.tokens_process),
            tokens_generate: tokens,
        })
    }
}
