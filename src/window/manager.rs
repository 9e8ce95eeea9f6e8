use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use super::sliding::SlidingWindow;
use super::{MAX_EVENTS_PER_RULE, MAX_TOTAL_EVENTS};

/// Owns per-rule sliding windows and enforces a process-wide event budget.
///
/// Structural changes (create, delete, the global eviction scan) take the
/// map's write lock; intra-window append/prune takes only that window's
/// lock. Lock order is always manager first, then window.
#[derive(Debug)]
pub struct WindowManager {
    windows: RwLock<HashMap<String, Arc<Mutex<SlidingWindow>>>>,
    total_events: AtomicUsize,
    max_per_window: usize,
    max_total: usize,
}

impl WindowManager {
    /// Create a manager with the default per-rule and global caps.
    pub fn new() -> Self {
        Self::with_limits(MAX_EVENTS_PER_RULE, MAX_TOTAL_EVENTS)
    }

    /// Create a manager with custom caps (scaled down in tests).
    pub fn with_limits(max_per_window: usize, max_total: usize) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            total_events: AtomicUsize::new(0),
            max_per_window: max_per_window.max(1),
            max_total: max_total.max(1),
        }
    }

    /// Record an event for `rule` at instant `t`, creating the rule's
    /// window lazily with span `span`. Enforces the global budget by
    /// evicting half of whichever window holds the globally oldest entry,
    /// repeating until the budget holds.
    pub fn add_event(&self, rule: &str, span: Duration, t: DateTime<Utc>) {
        let window = self.get_or_create(rule, span);
        let delta = {
            let mut w = window.lock().unwrap();
            let before = w.len();
            w.add(t);
            w.len() as isize - before as isize
        };
        self.apply_delta(delta);

        if self.total_events.load(Ordering::Acquire) > self.max_total {
            self.enforce_budget();
        }
    }

    /// Count events currently inside `rule`'s window as of instant `t`.
    /// Returns 0 when the rule has no window.
    pub fn count(&self, rule: &str, t: DateTime<Utc>) -> usize {
        let window = match self.get(rule) {
            Some(w) => w,
            None => return 0,
        };
        let mut w = window.lock().unwrap();
        let before = w.len();
        let count = w.count(t);
        drop(w);
        self.apply_delta(count as isize - before as isize);
        count
    }

    /// Clear `rule`'s window without removing it.
    pub fn reset(&self, rule: &str) {
        if let Some(window) = self.get(rule) {
            let mut w = window.lock().unwrap();
            let n = w.len();
            w.reset();
            drop(w);
            self.apply_delta(-(n as isize));
        }
    }

    /// Remove `rule`'s window entirely. Returns true if one existed.
    pub fn remove(&self, rule: &str) -> bool {
        let removed = self.windows.write().unwrap().remove(rule);
        match removed {
            Some(window) => {
                let n = window.lock().unwrap().len();
                self.apply_delta(-(n as isize));
                true
            }
            None => false,
        }
    }

    /// Remove every window and zero the budget.
    pub fn clear(&self) {
        self.windows.write().unwrap().clear();
        self.total_events.store(0, Ordering::Release);
    }

    /// Events currently accounted across all windows.
    pub fn total_events(&self) -> usize {
        self.total_events.load(Ordering::Acquire)
    }

    /// Number of live windows.
    pub fn window_count(&self) -> usize {
        self.windows.read().unwrap().len()
    }

    fn get(&self, rule: &str) -> Option<Arc<Mutex<SlidingWindow>>> {
        self.windows.read().unwrap().get(rule).cloned()
    }

    fn get_or_create(&self, rule: &str, span: Duration) -> Arc<Mutex<SlidingWindow>> {
        if let Some(w) = self.get(rule) {
            return w;
        }
        let mut windows = self.windows.write().unwrap();
        windows
            .entry(rule.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SlidingWindow::with_limit(
                    span,
                    self.max_per_window,
                )))
            })
            .clone()
    }

    fn apply_delta(&self, delta: isize) {
        if delta >= 0 {
            self.total_events.fetch_add(delta as usize, Ordering::AcqRel);
        } else {
            let sub = (-delta) as usize;
            // Saturate at zero; accounting drift must not underflow.
            let mut current = self.total_events.load(Ordering::Acquire);
            loop {
                let next = current.saturating_sub(sub);
                match self.total_events.compare_exchange_weak(
                    current,
                    next,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => break,
                    Err(observed) => current = observed,
                }
            }
        }
    }

    /// Evict from the window whose oldest entry is globally oldest until
    /// the budget holds. Runs under the map's write lock so the scan sees
    /// a stable set of windows.
    fn enforce_budget(&self) {
        let windows = self.windows.write().unwrap();
        while self.total_events.load(Ordering::Acquire) > self.max_total {
            let mut victim: Option<(DateTime<Utc>, &Arc<Mutex<SlidingWindow>>)> = None;
            for window in windows.values() {
                let w = window.lock().unwrap();
                if let Some(oldest) = w.oldest() {
                    match victim {
                        Some((current, _)) if current <= oldest => {}
                        _ => victim = Some((oldest, window)),
                    }
                }
            }
            let Some((_, window)) = victim else { break };
            let evicted = window.lock().unwrap().evict_half();
            if evicted == 0 {
                break;
            }
            self.apply_delta(-(evicted as isize));
        }
    }
}

impl Default for WindowManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    const SPAN: Duration = Duration::from_secs(3600);

    #[test]
    fn test_lazy_creation_and_count() {
        let mgr = WindowManager::new();
        assert_eq!(mgr.count("missing", at(0)), 0);

        mgr.add_event("r1", SPAN, at(0));
        mgr.add_event("r1", SPAN, at(1));
        assert_eq!(mgr.count("r1", at(1)), 2);
        assert_eq!(mgr.total_events(), 2);
        assert_eq!(mgr.window_count(), 1);
    }

    #[test]
    fn test_count_prune_updates_total() {
        let mgr = WindowManager::new();
        let span = Duration::from_secs(10);
        mgr.add_event("r1", span, at(0));
        mgr.add_event("r1", span, at(1));
        assert_eq!(mgr.total_events(), 2);

        // Both entries expire by t=20.
        assert_eq!(mgr.count("r1", at(20)), 0);
        assert_eq!(mgr.total_events(), 0);
    }

    #[test]
    fn test_reset_and_remove() {
        let mgr = WindowManager::new();
        mgr.add_event("r1", SPAN, at(0));
        mgr.add_event("r2", SPAN, at(1));

        mgr.reset("r1");
        assert_eq!(mgr.count("r1", at(1)), 0);
        assert_eq!(mgr.total_events(), 1);

        assert!(mgr.remove("r2"));
        assert!(!mgr.remove("r2"));
        assert_eq!(mgr.total_events(), 0);
    }

    #[test]
    fn test_global_eviction_targets_oldest_window() {
        let mgr = WindowManager::with_limits(100, 10);
        // r1 holds the six globally oldest events.
        for i in 0..6 {
            mgr.add_event("old", SPAN, at(i));
        }
        for i in 6..10 {
            mgr.add_event("new", SPAN, at(i));
        }
        assert_eq!(mgr.total_events(), 10);

        // The eleventh event breaches the budget; "old" sheds half.
        mgr.add_event("new", SPAN, at(10));
        assert!(mgr.total_events() <= 10);
        assert_eq!(mgr.count("new", at(10)), 5);
        assert_eq!(mgr.count("old", at(10)), 3);
    }

    #[test]
    fn test_clear_zeroes_budget() {
        let mgr = WindowManager::new();
        mgr.add_event("r1", SPAN, at(0));
        mgr.clear();
        assert_eq!(mgr.total_events(), 0);
        assert_eq!(mgr.window_count(), 0);
    }
}
