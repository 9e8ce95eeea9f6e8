use chrono::{DateTime, Duration as TimeDelta, Utc};
use std::time::Duration;

use super::MAX_EVENTS_PER_RULE;

/// Time-ordered buffer of event instants within a trailing span.
///
/// Timestamps are monotonically non-decreasing in insertion order; a sample
/// older than the newest buffered entry is clamped up to it rather than
/// reordered. All operations are total.
#[derive(Debug)]
pub struct SlidingWindow {
    span: TimeDelta,
    entries: Vec<DateTime<Utc>>,
    max_events: usize,
}

impl SlidingWindow {
    /// Create a window covering the trailing `span`.
    pub fn new(span: Duration) -> Self {
        Self::with_limit(span, MAX_EVENTS_PER_RULE)
    }

    /// Create a window with a custom per-rule event cap.
    pub fn with_limit(span: Duration, max_events: usize) -> Self {
        let span = TimeDelta::from_std(span).unwrap_or_else(|_| TimeDelta::days(365 * 100));
        Self {
            span,
            entries: Vec::new(),
            max_events: max_events.max(1),
        }
    }

    /// Record an event at instant `t`, pruning expired entries first.
    ///
    /// When the per-rule cap is exceeded, the oldest half is discarded so
    /// recent data survives.
    pub fn add(&mut self, t: DateTime<Utc>) {
        let t = match self.entries.last() {
            Some(last) if *last > t => *last,
            _ => t,
        };
        self.prune(t);
        self.entries.push(t);

        if self.entries.len() > self.max_events {
            let drop = self.entries.len() / 2;
            self.entries.drain(0..drop);
        }
    }

    /// Count events still inside the window as of instant `t`.
    pub fn count(&mut self, t: DateTime<Utc>) -> usize {
        self.prune(t);
        self.entries.len()
    }

    /// Discard all buffered entries.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Current number of buffered entries, without pruning.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Timestamp of the oldest buffered entry.
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.entries.first().copied()
    }

    /// Discard the oldest half of the entries (rounded up so a one-entry
    /// window still shrinks). Returns how many were discarded.
    pub fn evict_half(&mut self) -> usize {
        let drop = self.entries.len().div_ceil(2);
        self.entries.drain(0..drop);
        drop
    }

    /// Remove entries strictly older than `t - span`. An entry exactly at
    /// the cutoff is retained.
    fn prune(&mut self, t: DateTime<Utc>) {
        let cutoff = t - self.span;
        let keep_from = self.entries.partition_point(|e| *e < cutoff);
        if keep_from > 0 {
            self.entries.drain(0..keep_from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_count_within_window() {
        let mut w = SlidingWindow::new(Duration::from_secs(300));
        w.add(at(0));
        w.add(at(1));
        w.add(at(2));
        assert_eq!(w.count(at(2)), 3);
    }

    #[test]
    fn test_prune_keeps_entry_exactly_at_cutoff() {
        let mut w = SlidingWindow::new(Duration::from_secs(60));
        w.add(at(0));
        // Evaluating at t0 + W keeps the entry at t0.
        assert_eq!(w.count(at(60)), 1);
        // Any instant past t0 + W drops it.
        assert_eq!(w.count(at(61)), 0);
    }

    #[test]
    fn test_cap_halves_oldest() {
        let mut w = SlidingWindow::with_limit(Duration::from_secs(3600), 4);
        for i in 0..5 {
            w.add(at(i));
        }
        // Fifth insert exceeded the cap of 4; the oldest half was shed.
        assert_eq!(w.len(), 3);
        assert_eq!(w.oldest(), Some(at(2)));
    }

    #[test]
    fn test_out_of_order_sample_clamped() {
        let mut w = SlidingWindow::new(Duration::from_secs(60));
        w.add(at(10));
        w.add(at(5));
        assert_eq!(w.oldest(), Some(at(10)));
        assert_eq!(w.count(at(10)), 2);
    }

    #[test]
    fn test_evict_half_rounds_up() {
        let mut w = SlidingWindow::new(Duration::from_secs(60));
        w.add(at(0));
        assert_eq!(w.evict_half(), 1);
        assert!(w.is_empty());
    }

    #[test]
    fn test_reset() {
        let mut w = SlidingWindow::new(Duration::from_secs(60));
        w.add(at(0));
        w.add(at(1));
        w.reset();
        assert_eq!(w.count(at(1)), 0);
    }
}
