//! Time-bounded collection of request stats.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::{RequestStat, TelemetrySnapshot};

/// Request stats from the last `retention` period, oldest first.
///
/// Every insertion and every query first evicts stats older than
/// `now - retention`. Timestamps never decrease: a stat older than the
/// newest one is clamped to the newest timestamp on insertion.
#[derive(Debug, Clone)]
pub struct TelemetryWindow {
    retention: TimeDelta,
    entries: VecDeque<RequestStat>,
}

impl TelemetryWindow {
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            retention: TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX),
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, stat: RequestStat) {
        self.push_at(stat, Utc::now());
    }

    /// Insert a stat, evicting relative to `now`.
    pub fn push_at(&mut self, mut stat: RequestStat, now: DateTime<Utc>) {
        if let Some(last) = self.entries.back() {
            if stat.timestamp < last.timestamp {
                stat.timestamp = last.timestamp;
            }
        }
        self.entries.push_back(stat);
        self.evict(now);
    }

    #[must_use]
    pub fn snapshot(&mut self) -> TelemetrySnapshot {
        self.snapshot_at(Utc::now())
    }

    /// Aggregate the window after evicting relative to `now`.
    #[must_use]
    pub fn snapshot_at(&mut self, now: DateTime<Utc>) -> TelemetrySnapshot {
        self.evict(now);
        TelemetrySnapshot::from_stats(&self.entries)
    }

    /// Stats currently held, oldest first, after evicting relative to `now`.
    pub fn stats_at(&mut self, now: DateTime<Utc>) -> Vec<RequestStat> {
        self.evict(now);
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn set_retention(&mut self, retention: Duration) {
        self.retention = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let Some(cutoff) = now.checked_sub_signed(self.retention) else {
            return;
        };
        while self
            .entries
            .front()
            .is_some_and(|stat| stat.timestamp < cutoff)
        {
            self.entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat_at(ts: DateTime<Utc>, tokens: u64) -> RequestStat {
        RequestStat {
            timestamp: ts,
            time_process: None,
            time_generate: Some(1000.0),
            tokens_process: None,
            tokens_generate: tokens,
        }
    }

    #[test]
    fn evicts_on_query() {
        let t0 = Utc::now();
        let mut window = TelemetryWindow::new(Duration::from_secs(60));
        window.push_at(stat_at(t0, 10), t0);
        window.push_at(stat_at(t0 + TimeDelta::seconds(30), 20), t0 + TimeDelta::seconds(30));
        assert_eq!(window.len(), 2);

        let snap = window.snapshot_at(t0 + TimeDelta::seconds(61));
        assert_eq!(snap.request_count, 1);
        assert_eq!(snap.tokens_generated, 20);

        let snap = window.snapshot_at(t0 + TimeDelta::seconds(200));
        assert_eq!(snap.request_count, 0);
        assert!(window.is_empty());
    }

    #[test]
    fn evicts_on_insert() {
        let t0 = Utc::now();
        let mut window = TelemetryWindow::new(Duration::from_secs(10));
        window.push_at(stat_at(t0, 1), t0);
        let later = t0 + TimeDelta::seconds(11);
        window.push_at(stat_at(later, 2), later);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn no_element_older_than_retention_survives_a_query() {
        let t0 = Utc::now();
        let retention = TimeDelta::seconds(5);
        let mut window = TelemetryWindow::new(Duration::from_secs(5));
        for i in 0..20 {
            let ts = t0 + TimeDelta::seconds(i);
            window.push_at(stat_at(ts, 1), ts);
        }
        let now = t0 + TimeDelta::seconds(30);
        for stat in window.stats_at(now) {
            assert!(stat.timestamp >= now - retention);
        }
    }

    #[test]
    fn out_of_order_timestamps_are_clamped() {
        let t0 = Utc::now();
        let mut window = TelemetryWindow::new(Duration::from_secs(60));
        window.push_at(stat_at(t0, 1), t0);
        window.push_at(stat_at(t0 - TimeDelta::seconds(5), 2), t0);
        let stats = window.stats_at(t0);
        assert_eq!(stats[1].timestamp, t0);
    }

    #[test]
    fn shrinking_retention_applies_on_next_query() {
        let t0 = Utc::now();
        let mut window = TelemetryWindow::new(Duration::from_secs(600));
        window.push_at(stat_at(t0, 1), t0);
        window.set_retention(Duration::from_secs(1));
        assert_eq!(window.snapshot_at(t0 + TimeDelta::seconds(2)).request_count, 0);
    }
}
