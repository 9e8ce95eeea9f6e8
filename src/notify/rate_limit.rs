use chrono::{DateTime, Duration as TimeDelta, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Default cap on notifications per window.
pub const DEFAULT_MAX_PER_WINDOW: usize = 10;

/// Default admission window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct LimiterState {
    admissions: VecDeque<DateTime<Utc>>,
    dropped: u64,
}

/// Sliding-window token admission protecting downstream sinks.
///
/// Admission timestamps older than the window are pruned on every check,
/// so capacity is fully restored once the window elapses. The most recent
/// admission can be refunded when the protected work did not effectively
/// happen.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    max: usize,
    window: TimeDelta,
    window_std: Duration,
    enabled: bool,
}

impl RateLimiter {
    /// Create a limiter admitting `max` notifications per `window`.
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            state: Mutex::new(LimiterState::default()),
            max,
            window: TimeDelta::from_std(window).unwrap_or_else(|_| TimeDelta::days(365 * 100)),
            window_std: window,
            enabled: true,
        }
    }

    /// Create a disabled limiter that admits everything.
    pub fn disabled() -> Self {
        let mut limiter = Self::default();
        limiter.enabled = false;
        limiter
    }

    /// Whether admission control is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Try to admit one notification at instant `t`. Denials are counted.
    pub fn try_acquire(&self, t: DateTime<Utc>) -> bool {
        if !self.enabled {
            return true;
        }
        let mut state = self.state.lock().unwrap();
        let cutoff = t - self.window;
        while state.admissions.front().is_some_and(|a| *a < cutoff) {
            state.admissions.pop_front();
        }
        if state.admissions.len() < self.max {
            state.admissions.push_back(t);
            true
        } else {
            state.dropped += 1;
            false
        }
    }

    /// Refund the most recent admission, if any.
    pub fn release(&self) {
        if !self.enabled {
            return;
        }
        self.state.lock().unwrap().admissions.pop_back();
    }

    /// Clear admissions and the drop counter.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.admissions.clear();
        state.dropped = 0;
    }

    /// Point-in-time limiter counters.
    pub fn stats(&self) -> RateLimiterStats {
        let state = self.state.lock().unwrap();
        RateLimiterStats {
            current: state.admissions.len(),
            max: self.max,
            window: self.window_std,
            enabled: self.enabled,
            dropped: state.dropped,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW)
    }
}

/// Read-only snapshot of limiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterStats {
    /// Admissions currently inside the window
    pub current: usize,
    /// Cap on admissions per window
    pub max: usize,
    /// Window span
    pub window: Duration,
    /// Whether admission control is active
    pub enabled: bool,
    /// Total denials since the last reset
    pub dropped: u64,
}
