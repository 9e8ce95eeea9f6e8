use crate::alert::Alert;
use crate::errors::{AlertError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

use super::rate_limit::RateLimiter;
use super::sink::Sink;

/// Registry of named sinks with rate-limited fan-out.
///
/// Reads (dispatch) snapshot the registry and release the lock before any
/// delivery await; register/unregister/close take exclusive access.
pub struct Dispatcher {
    sinks: RwLock<HashMap<String, Arc<dyn Sink>>>,
    limiter: RateLimiter,
}

impl Dispatcher {
    /// Create a dispatcher with the default rate limiter.
    pub fn new() -> Self {
        Self::with_rate_limiter(RateLimiter::default())
    }

    /// Create a dispatcher with a custom rate limiter.
    pub fn with_rate_limiter(limiter: RateLimiter) -> Self {
        Self {
            sinks: RwLock::new(HashMap::new()),
            limiter,
        }
    }

    /// Register a sink under its own name, replacing any previous sink
    /// with that name.
    pub fn register(&self, sink: Arc<dyn Sink>) {
        let name = sink.name().to_string();
        self.sinks.write().unwrap().insert(name, sink);
    }

    /// Remove a sink by name. Returns true if one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.sinks.write().unwrap().remove(name).is_some()
    }

    /// Names of all registered sinks, sorted.
    pub fn sink_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sinks.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// The admission limiter, exposed for stats observation.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Deliver `alert` to the sinks its `notify` list names. Unknown names
    /// are skipped silently. Returns [`AlertError::RateLimited`] on
    /// admission denial and an aggregate [`AlertError::Dispatch`] if any
    /// invoked sink failed.
    pub async fn dispatch(&self, cancel: &CancellationToken, alert: &Alert) -> Result<()> {
        if alert.notify.is_empty() {
            return Ok(());
        }
        let targets = {
            let sinks = self.sinks.read().unwrap();
            alert
                .notify
                .iter()
                .filter_map(|name| sinks.get(name).cloned())
                .collect::<Vec<_>>()
        };
        self.deliver(cancel, alert, targets).await
    }

    /// Deliver `alert` to every registered sink, ignoring its `notify`
    /// list.
    pub async fn dispatch_all(&self, cancel: &CancellationToken, alert: &Alert) -> Result<()> {
        let targets = {
            let sinks = self.sinks.read().unwrap();
            let mut targets: Vec<_> = sinks.values().cloned().collect();
            targets.sort_by(|a, b| a.name().cmp(b.name()));
            targets
        };
        self.deliver(cancel, alert, targets).await
    }

    /// Close every sink and empty the registry.
    pub async fn close(&self) {
        let targets: Vec<Arc<dyn Sink>> = {
            let mut sinks = self.sinks.write().unwrap();
            sinks.drain().map(|(_, sink)| sink).collect()
        };
        for sink in targets {
            if let Err(e) = sink.close().await {
                log::warn!("sink {} failed to close: {}", sink.name(), e);
            }
        }
    }

    /// Rate-limit, invoke sequentially, and apply the refund policy: keep
    /// the token only when at least one delivery succeeded.
    async fn deliver(
        &self,
        cancel: &CancellationToken,
        alert: &Alert,
        targets: Vec<Arc<dyn Sink>>,
    ) -> Result<()> {
        if !self.limiter.try_acquire(Utc::now()) {
            log::warn!("alert for rule {} rate-limited", alert.rule_name);
            return Err(AlertError::RateLimited);
        }

        if targets.is_empty() {
            // Nothing was invoked; the token goes back.
            self.limiter.release();
            return Ok(());
        }

        let mut failures = Vec::new();
        for sink in &targets {
            if let Err(e) = sink.send(cancel, alert).await {
                log::warn!(
                    "sink {} failed to deliver alert for rule {}: {}",
                    sink.name(),
                    alert.rule_name,
                    e
                );
                failures.push(format!("{}: {}", sink.name(), e));
            }
        }

        if failures.len() == targets.len() {
            // Every attempt failed; no delivery effectively happened.
            self.limiter.release();
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AlertError::Dispatch { failures })
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
