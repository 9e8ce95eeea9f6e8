//! Alert Output Type
//!
//! The value emitted when a rule fires, delivered to notification sinks.

use crate::entry::LogEntry;
use crate::types::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A rule firing, delivered to the sinks named in `notify`.
///
/// Alerts are plain values; downstream consumers may hold them
/// indefinitely. Unset optional fields are omitted from the JSON encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Name of the rule that fired
    pub rule_name: String,
    /// Rule description, copied verbatim
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Severity copied from the rule
    pub severity: Severity,
    /// Human-formatted summary of the firing
    pub message: String,
    /// When the rule fired
    pub timestamp: DateTime<Utc>,
    /// Matching event count, present for aggregating rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Configured trigger threshold, present for aggregating rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Window duration in humantime form (e.g. "5m"), for aggregating rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    /// The entry that triggered the firing, present for pattern rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggering_entry: Option<LogEntry>,
    /// Sink names to deliver to, copied from the rule
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notify: Vec<String>,
    /// Labels copied from the rule
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

impl Alert {
    /// Create a minimal alert for the given rule.
    pub fn new(rule_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            description: String::new(),
            severity: Severity::default(),
            message: message.into(),
            timestamp: Utc::now(),
            count: None,
            threshold: None,
            window: None,
            triggering_entry: None,
            notify: Vec::new(),
            labels: HashMap::new(),
        }
    }

    /// Encode the alert as a JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_omitted() {
        let alert = Alert::new("fatal", "Pattern match: FATAL");
        let json = serde_json::to_value(&alert).unwrap();

        assert_eq!(json["rule_name"], "fatal");
        assert_eq!(json["severity"], "medium");
        assert!(json.get("count").is_none());
        assert!(json.get("threshold").is_none());
        assert!(json.get("window").is_none());
        assert!(json.get("triggering_entry").is_none());
        assert!(json.get("notify").is_none());
        assert!(json.get("labels").is_none());
    }

    #[test]
    fn test_aggregating_fields_present() {
        let mut alert = Alert::new("errs", "Threshold exceeded: 3 events in 5m");
        alert.count = Some(3);
        alert.threshold = Some(3.0);
        alert.window = Some("5m".to_string());
        alert.notify = vec!["email".to_string()];

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["count"], 3);
        assert_eq!(json["threshold"], 3.0);
        assert_eq!(json["window"], "5m");
        assert_eq!(json["notify"][0], "email");
    }

    #[test]
    fn test_timestamp_is_iso8601() {
        let alert = Alert::new("r", "m");
        let text = alert.to_json().unwrap();
        // chrono's serde encoding is RFC 3339 / ISO-8601
        assert!(text.contains("\"timestamp\":\""));
        assert!(text.contains('T'));
    }
}
