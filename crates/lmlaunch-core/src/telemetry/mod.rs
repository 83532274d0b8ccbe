//! Request telemetry records and aggregates.

mod window;

pub use window::TelemetryWindow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timing of one completed request, as reported in the engine's log.
///
/// Durations are in milliseconds. They are `None` when the engine did not
/// report them, or reported a zero rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStat {
    pub timestamp: DateTime<Utc>,
    pub time_process: Option<f64>,
    pub time_generate: Option<f64>,
    pub tokens_process: Option<u64>,
    pub tokens_generate: u64,
}

/// Aggregates over the stats currently in a [`TelemetryWindow`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub request_count: usize,
    pub tokens_generated: u64,
    pub tokens_processed: u64,
    /// Generated tokens per second over stats that carry a generation time.
    pub tokens_per_sec_generation: f64,
    /// Prompt tokens per second over stats that carry a processing time.
    pub tokens_per_sec_processing: f64,
}

impl TelemetrySnapshot {
    /// Aggregate a sequence of stats.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_stats<'a>(stats: impl IntoIterator<Item = &'a RequestStat>) -> Self {
        let mut snapshot = Self::default();
        let (mut gen_tokens, mut gen_ms) = (0u64, 0f64);
        let (mut proc_tokens, mut proc_ms) = (0u64, 0f64);

        for stat in stats {
            snapshot.request_count += 1;
            snapshot.tokens_generated += stat.tokens_generate;
            snapshot.tokens_processed += stat.tokens_process.unwrap_or(0);

            if let Some(ms) = stat.time_generate {
                gen_tokens += stat.tokens_generate;
                gen_ms += ms;
            }
            if let (Some(ms), Some(tokens)) = (stat.time_process, stat.tokens_process) {
                proc_tokens += tokens;
                proc_ms += ms;
            }
        }

        snapshot.tokens_per_sec_generation = rate(gen_tokens, gen_ms);
        snapshot.tokens_per_sec_processing = rate(proc_tokens, proc_ms);
        snapshot
    }
}

#[allow(clippy::cast_precision_loss)]
fn rate(tokens: u64, millis: f64) -> f64 {
    if millis > 0.0 {
        tokens as f64 / (millis / 1000.0)
    } else {
        0.0
    }
}
