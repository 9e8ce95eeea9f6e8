//! Structured Log Entry Types
//!
//! Core data structure for the records flowing into the alerting engine.

use crate::types::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A structured log record, immutable to the alerting core.
///
/// Producers construct entries from whatever ingestion pipeline they run;
/// the engine only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was produced
    pub timestamp: DateTime<Utc>,
    /// Log level (e.g. "INFO", "ERROR", "FATAL")
    #[serde(default)]
    pub level: String,
    /// Producer's log family (e.g. "syslog", "nginx", "app")
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Origin of the entry (host, service, unit)
    #[serde(default)]
    pub source: String,
    /// Path of the file the entry was read from, if any
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_path: String,
    /// Original unparsed line; empty when unavailable
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw: String,
    /// Parsed structured fields with heterogeneous scalar values
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, Value>,
    /// Free-form string labels attached by the producer
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

impl LogEntry {
    /// Create a new entry with the given level and message, stamped now.
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.into(),
            kind: String::new(),
            message: message.into(),
            source: String::new(),
            file_path: String::new(),
            raw: String::new(),
            fields: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    /// Set the entry timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the producer's log family.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Set the entry source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the originating file path.
    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    /// Attach the original unparsed line.
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    /// Add a structured field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Get a structured field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a label by name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Get a field coerced to a number, if present and coercible.
    pub fn numeric_field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::to_number)
    }
}
