use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Per-rule "do not re-fire before" timestamps.
///
/// A single lock covers all entries; the hot path is a map lookup.
#[derive(Debug, Default)]
pub struct CooldownMap {
    expiries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CooldownMap {
    /// Create an empty cooldown map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `rule` is suppressed at instant `t`.
    pub fn is_on_cooldown(&self, rule: &str, t: DateTime<Utc>) -> bool {
        match self.expiries.lock().unwrap().get(rule) {
            Some(expires_at) => t < *expires_at,
            None => false,
        }
    }

    /// Suppress `rule` until `t + duration`.
    pub fn set(&self, rule: &str, duration: Duration, t: DateTime<Utc>) {
        let expires_at = t + chrono::Duration::from_std(duration)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        self.expiries
            .lock()
            .unwrap()
            .insert(rule.to_string(), expires_at);
    }

    /// Drop `rule`'s cooldown if present.
    pub fn clear(&self, rule: &str) {
        self.expiries.lock().unwrap().remove(rule);
    }

    /// Drop every cooldown.
    pub fn clear_all(&self) {
        self.expiries.lock().unwrap().clear();
    }

    /// Number of rules currently tracked (expired entries included until
    /// cleared).
    pub fn len(&self) -> usize {
        self.expiries.lock().unwrap().len()
    }

    /// Whether no cooldowns are tracked.
    pub fn is_empty(&self) -> bool {
        self.expiries.lock().unwrap().is_empty()
    }
}
