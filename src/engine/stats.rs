use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic evaluation counters, incremented lock-free on the hot path.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub(crate) entries_evaluated: AtomicU64,
    pub(crate) pattern_matches: AtomicU64,
    pub(crate) threshold_triggers: AtomicU64,
    pub(crate) expression_triggers: AtomicU64,
    pub(crate) alerts_suppressed: AtomicU64,
    pub(crate) alerts_dropped: AtomicU64,
    pub(crate) eval_errors: AtomicU64,
}

impl EngineStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            entries_evaluated: self.entries_evaluated.load(Ordering::Relaxed),
            pattern_matches: self.pattern_matches.load(Ordering::Relaxed),
            threshold_triggers: self.threshold_triggers.load(Ordering::Relaxed),
            expression_triggers: self.expression_triggers.load(Ordering::Relaxed),
            alerts_suppressed: self.alerts_suppressed.load(Ordering::Relaxed),
            alerts_dropped: self.alerts_dropped.load(Ordering::Relaxed),
            eval_errors: self.eval_errors.load(Ordering::Relaxed),
        }
    }
}

/// Read-only snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatsSnapshot {
    /// Records processed by `evaluate`
    pub entries_evaluated: u64,
    /// Pattern rules that matched and fired
    pub pattern_matches: u64,
    /// Threshold rules that fired
    pub threshold_triggers: u64,
    /// Expression rules that fired
    pub expression_triggers: u64,
    /// Firings swallowed by an active cooldown
    pub alerts_suppressed: u64,
    /// Alerts dropped because the alert channel was full
    pub alerts_dropped: u64,
    /// Expression evaluation errors (treated as non-matches)
    pub eval_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_increments() {
        let stats = EngineStats::new();
        EngineStats::incr(&stats.entries_evaluated);
        EngineStats::incr(&stats.entries_evaluated);
        EngineStats::incr(&stats.pattern_matches);

        let snap = stats.snapshot();
        assert_eq!(snap.entries_evaluated, 2);
        assert_eq!(snap.pattern_matches, 1);
        assert_eq!(snap.alerts_dropped, 0);
    }
}
