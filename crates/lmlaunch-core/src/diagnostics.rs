//! Recent-error ring buffer.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of errors kept.
pub const ERROR_LOG_CAPACITY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// The last [`ERROR_LOG_CAPACITY`] error messages, newest first.
///
/// Recording the same message as the newest entry only refreshes its
/// timestamp, so a crash loop does not flood the log.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: VecDeque<ErrorRecord>,
}

impl ErrorLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, message: impl Into<String>) {
        self.record_at(message, Utc::now());
    }

    pub fn record_at(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        let message = message.into();
        if let Some(newest) = self.entries.front_mut() {
            if newest.message == message {
                newest.at = at;
                return;
            }
        }
        self.entries.push_front(ErrorRecord { at, message });
        self.entries.truncate(ERROR_LOG_CAPACITY);
    }

    /// Entries, newest first.
    #[must_use]
    pub fn recent(&self) -> Vec<ErrorRecord> {
        self.entries.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
