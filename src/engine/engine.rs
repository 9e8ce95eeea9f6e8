use crate::alert::Alert;
use crate::entry::LogEntry;
use crate::errors::{AlertError, Result};
use crate::matcher::field::match_field;
use crate::rules::rule::{AggregateFn, Rule, RuleKind};
use crate::window::{WindowManager, MAX_EVENTS_PER_RULE, MAX_TOTAL_EVENTS};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::cooldown::CooldownMap;
use super::stats::{EngineStats, EngineStatsSnapshot};

/// Configuration options for the alerting engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the bounded alert channel
    pub alert_buffer: usize,
    /// Cap on buffered events for a single rule's window
    pub max_events_per_rule: usize,
    /// Cap on buffered events across all windows
    pub max_total_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alert_buffer: 100,
            max_events_per_rule: MAX_EVENTS_PER_RULE,
            max_total_events: MAX_TOTAL_EVENTS,
        }
    }
}

/// Online rules engine: evaluates structured log entries against the
/// current rule set and emits deduplicated alerts.
///
/// `evaluate` may be called concurrently from multiple producers; one
/// consumer drains the alert stream. Evaluation never blocks on the
/// stream: when the channel is full the alert is dropped and counted.
pub struct AlertEngine {
    rules: RwLock<Vec<Arc<Rule>>>,
    windows: WindowManager,
    cooldowns: CooldownMap,
    stats: EngineStats,
    alert_tx: Mutex<Option<mpsc::Sender<Alert>>>,
    alert_rx: Mutex<Option<mpsc::Receiver<Alert>>>,
}

impl AlertEngine {
    /// Create an engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with a custom configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let (alert_tx, alert_rx) = mpsc::channel(config.alert_buffer.max(1));
        Self {
            rules: RwLock::new(Vec::new()),
            windows: WindowManager::with_limits(
                config.max_events_per_rule,
                config.max_total_events,
            ),
            cooldowns: CooldownMap::new(),
            stats: EngineStats::new(),
            alert_tx: Mutex::new(Some(alert_tx)),
            alert_rx: Mutex::new(Some(alert_rx)),
        }
    }

    /// Evaluate one entry against every enabled rule at instant `now`.
    ///
    /// Triggered alerts are returned to the caller and also offered to the
    /// alert stream; a full stream drops the alert rather than blocking.
    pub fn evaluate(&self, entry: &LogEntry, now: DateTime<Utc>) -> Vec<Alert> {
        EngineStats::incr(&self.stats.entries_evaluated);
        let rules = self.list_rules();
        let mut alerts = Vec::new();
        for rule in &rules {
            if !rule.enabled || !rule.matches_filters(entry) {
                continue;
            }
            let alert = match &rule.kind {
                RuleKind::Pattern { pattern, regex, .. } => {
                    self.eval_pattern(rule, pattern, regex, entry, now)
                }
                RuleKind::Threshold { .. } => self.eval_threshold(rule, entry, now),
                RuleKind::Expression { .. } => self.eval_expression(rule, entry, now),
            };
            if let Some(alert) = alert {
                self.offer_alert(&alert);
                alerts.push(alert);
            }
        }
        alerts
    }

    /// Evaluate one entry at the current system time.
    pub fn evaluate_now(&self, entry: &LogEntry) -> Vec<Alert> {
        self.evaluate(entry, Utc::now())
    }

    /// Pull entries from `entries` until the channel closes or `cancel`
    /// fires, evaluating each in order. Returns promptly after the entry
    /// in flight completes when cancelled.
    pub async fn evaluate_stream(
        &self,
        cancel: CancellationToken,
        mut entries: mpsc::Receiver<LogEntry>,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                entry = entries.recv() => match entry {
                    Some(entry) => {
                        self.evaluate(&entry, Utc::now());
                    }
                    None => break,
                },
            }
        }
    }

    /// Take the receive side of the alert stream. The channel is
    /// single-consumer, so this yields `Some` exactly once.
    pub fn alerts_stream(&self) -> Option<mpsc::Receiver<Alert>> {
        self.alert_rx.lock().unwrap().take()
    }

    /// Add one rule. Fails on a duplicate name.
    pub fn add_rule(&self, rule: Rule) -> Result<()> {
        let mut rules = self.rules.write().unwrap();
        if rules.iter().any(|r| r.name == rule.name) {
            return Err(AlertError::validation(format!(
                "rule '{}' already exists",
                rule.name
            )));
        }
        log::info!("rule {} added", rule.name);
        rules.push(Arc::new(rule));
        Ok(())
    }

    /// Remove one rule along with its window and cooldown state. Returns
    /// true if the rule existed.
    pub fn remove_rule(&self, name: &str) -> bool {
        let removed = {
            let mut rules = self.rules.write().unwrap();
            let before = rules.len();
            rules.retain(|r| r.name != name);
            rules.len() != before
        };
        if removed {
            self.windows.remove(name);
            self.cooldowns.clear(name);
            log::info!("rule {} removed", name);
        }
        removed
    }

    /// Look up a rule by name.
    pub fn get_rule(&self, name: &str) -> Option<Arc<Rule>> {
        self.rules
            .read()
            .unwrap()
            .iter()
            .find(|r| r.name == name)
            .cloned()
    }

    /// Snapshot the current rule set. Evaluation iterates the snapshot so
    /// the rule-set lock is never held across a record.
    pub fn list_rules(&self) -> Vec<Arc<Rule>> {
        self.rules.read().unwrap().clone()
    }

    /// Number of installed rules.
    pub fn rule_count(&self) -> usize {
        self.rules.read().unwrap().len()
    }

    /// Atomically replace the rule set, clearing all window and cooldown
    /// state. Rejects batches with duplicate names; on error nothing
    /// changes.
    pub fn reload_rules(&self, new_rules: Vec<Rule>) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &new_rules {
            if !seen.insert(rule.name.clone()) {
                return Err(AlertError::validation(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
        }
        let count = new_rules.len();
        {
            let mut rules = self.rules.write().unwrap();
            *rules = new_rules.into_iter().map(Arc::new).collect();
        }
        self.windows.clear();
        self.cooldowns.clear_all();
        log::info!("reloaded {} rules", count);
        Ok(())
    }

    /// Point-in-time snapshot of the evaluation counters.
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Events currently buffered across all rule windows.
    pub fn buffered_events(&self) -> usize {
        self.windows.total_events()
    }

    /// Close the alert stream. Idempotent; later `evaluate` calls still
    /// return alerts to direct callers but no longer write to the stream.
    pub fn close(&self) {
        self.alert_tx.lock().unwrap().take();
    }

    fn eval_pattern(
        &self,
        rule: &Rule,
        pattern: &str,
        regex: &regex::Regex,
        entry: &LogEntry,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let matched = regex.is_match(&entry.message)
            || (!entry.raw.is_empty() && regex.is_match(&entry.raw));
        if !matched {
            return None;
        }
        if self.cooldowns.is_on_cooldown(&rule.name, now) {
            EngineStats::incr(&self.stats.alerts_suppressed);
            return None;
        }
        if let Some(cooldown) = rule.effective_cooldown() {
            self.cooldowns.set(&rule.name, cooldown, now);
        }
        EngineStats::incr(&self.stats.pattern_matches);

        let mut alert = self.base_alert(rule, now);
        alert.message = format!("Pattern match: {}", pattern);
        alert.triggering_entry = Some(entry.clone());
        Some(alert)
    }

    fn eval_threshold(&self, rule: &Rule, entry: &LogEntry, now: DateTime<Utc>) -> Option<Alert> {
        let RuleKind::Threshold {
            field,
            value,
            op,
            threshold,
            window,
        } = &rule.kind
        else {
            return None;
        };
        if let Some(field) = field {
            if !match_field(entry, field, *op, value) {
                return None;
            }
        }
        self.windows.add_event(&rule.name, *window, now);
        let count = self.windows.count(&rule.name, now);
        if (count as u64) < *threshold {
            return None;
        }
        if self.cooldowns.is_on_cooldown(&rule.name, now) {
            // Suppressed firings keep their events buffered.
            EngineStats::incr(&self.stats.alerts_suppressed);
            return None;
        }
        if let Some(cooldown) = rule.effective_cooldown() {
            self.cooldowns.set(&rule.name, cooldown, now);
        }
        // Drain the pile so the same events cannot re-fire the rule.
        self.windows.reset(&rule.name);
        EngineStats::incr(&self.stats.threshold_triggers);

        let window_text = humantime::format_duration(*window).to_string();
        let mut alert = self.base_alert(rule, now);
        alert.message = format!("Threshold exceeded: {} events in {}", count, window_text);
        alert.count = Some(count as u64);
        alert.threshold = Some(*threshold as f64);
        alert.window = Some(window_text);
        Some(alert)
    }

    fn eval_expression(&self, rule: &Rule, entry: &LogEntry, now: DateTime<Utc>) -> Option<Alert> {
        let RuleKind::Expression {
            program,
            aggregation,
        } = &rule.kind
        else {
            return None;
        };
        match program.eval(entry) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                EngineStats::incr(&self.stats.eval_errors);
                log::debug!("rule {}: expression evaluation failed: {}", rule.name, e);
                return None;
            }
        }
        self.windows.add_event(&rule.name, aggregation.window, now);
        let count = self.windows.count(&rule.name, now);
        let value = match aggregation.function {
            AggregateFn::Count => count as f64,
            AggregateFn::Rate => {
                let minutes = aggregation.window.as_secs_f64() / 60.0;
                if minutes > 0.0 {
                    count as f64 / minutes
                } else {
                    0.0
                }
            }
        };
        if !aggregation.op.compare_f64(value, aggregation.threshold) {
            return None;
        }
        if self.cooldowns.is_on_cooldown(&rule.name, now) {
            EngineStats::incr(&self.stats.alerts_suppressed);
            return None;
        }
        if let Some(cooldown) = rule.effective_cooldown() {
            self.cooldowns.set(&rule.name, cooldown, now);
        }
        self.windows.reset(&rule.name);
        EngineStats::incr(&self.stats.expression_triggers);

        let window_text = humantime::format_duration(aggregation.window).to_string();
        let mut alert = self.base_alert(rule, now);
        alert.message = format!(
            "Expression matched: {} = {:.2} {} {} in {}",
            aggregation.function.as_str(),
            value,
            aggregation.op,
            aggregation.threshold,
            window_text
        );
        alert.count = Some(count as u64);
        alert.threshold = Some(aggregation.threshold);
        alert.window = Some(window_text);
        Some(alert)
    }

    fn base_alert(&self, rule: &Rule, now: DateTime<Utc>) -> Alert {
        let mut alert = Alert::new(rule.name.clone(), String::new());
        alert.description = rule.description.clone();
        alert.severity = rule.severity;
        alert.timestamp = now;
        alert.notify = rule.notify.clone();
        alert.labels = rule.labels.clone();
        alert
    }

    /// Offer an alert to the stream without blocking. Drops are counted
    /// and logged sporadically (first drop, then every 100th).
    fn offer_alert(&self, alert: &Alert) {
        let tx = match self.alert_tx.lock().unwrap().as_ref() {
            Some(tx) => tx.clone(),
            None => return,
        };
        match tx.try_send(alert.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = EngineStats::incr(&self.stats.alerts_dropped);
                if dropped == 1 || dropped % 100 == 0 {
                    log::warn!(
                        "alert channel full; dropped alert for rule {} ({} dropped so far)",
                        alert.rule_name,
                        dropped
                    );
                }
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new()
    }
}
