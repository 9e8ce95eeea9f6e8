use crate::entry::LogEntry;
use crate::errors::{AlertError, Result};
use crate::matcher::expr::Program;
use crate::types::{CompareOp, Severity, Value};
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;

/// Aggregate function applied to an expression rule's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    /// Number of matching events inside the window
    Count,
    /// Matching events per minute of window span
    Rate,
}

impl AggregateFn {
    /// Parse an aggregate function name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "count" => Some(AggregateFn::Count),
            "rate" => Some(AggregateFn::Rate),
            _ => None,
        }
    }

    /// The function's configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFn::Count => "count",
            AggregateFn::Rate => "rate",
        }
    }
}

/// Windowed aggregation attached to an expression rule.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Function computed over the window
    pub function: AggregateFn,
    /// Comparison applied to the computed value
    pub op: CompareOp,
    /// Trigger threshold the computed value is compared against
    pub threshold: f64,
    /// Window span events are counted over
    pub window: Duration,
}

impl Aggregation {
    /// Create an aggregation with the default `>=` comparison.
    pub fn new(function: AggregateFn, threshold: f64, window: Duration) -> Result<Self> {
        Self::with_op(function, CompareOp::Ge, threshold, window)
    }

    /// Create an aggregation with an explicit comparison operator.
    pub fn with_op(
        function: AggregateFn,
        op: CompareOp,
        threshold: f64,
        window: Duration,
    ) -> Result<Self> {
        if threshold <= 0.0 {
            return Err(AlertError::validation(
                "aggregation threshold must be positive",
            ));
        }
        if window.is_zero() {
            return Err(AlertError::validation("aggregation window must be positive"));
        }
        Ok(Self {
            function,
            op,
            threshold,
            window,
        })
    }
}

/// The kind-discriminated condition of a rule, holding its compiled
/// artifacts. Compiled once during validation, read-only afterwards.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Regex match against the entry message (falling back to the raw line)
    Pattern {
        /// Regex source as configured
        pattern: String,
        /// Whether matching distinguishes case
        case_sensitive: bool,
        /// Compiled regex
        regex: Regex,
    },
    /// Count entries passing a field comparison inside a window
    Threshold {
        /// Field to test; `None` counts every entry passing the filters
        field: Option<String>,
        /// Value the field is compared against
        value: Value,
        /// Comparison operator
        op: CompareOp,
        /// Event count that triggers the rule
        threshold: u64,
        /// Window span events are counted over
        window: Duration,
    },
    /// Compiled boolean expression with a windowed aggregation
    Expression {
        /// Compiled expression program
        program: Program,
        /// Aggregation applied to matching entries
        aggregation: Aggregation,
    },
}

impl RuleKind {
    /// The kind's configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Pattern { .. } => "pattern",
            RuleKind::Threshold { .. } => "threshold",
            RuleKind::Expression { .. } => "expression",
        }
    }
}

/// A validated, compiled alerting rule.
///
/// Rules are immutable once constructed and safe to evaluate concurrently;
/// all mutable evaluation state lives in the engine's window manager and
/// cooldown map.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Unique name within the engine
    pub name: String,
    /// Optional human description, copied into alerts
    pub description: String,
    /// Severity copied into alerts
    pub severity: Severity,
    /// Sink names alerts are delivered to; may be empty
    pub notify: Vec<String>,
    /// Minimum interval between consecutive firings
    pub cooldown: Option<Duration>,
    /// Label selector; value `*` matches any value of a present label
    pub labels: HashMap<String, String>,
    /// Restrict to one producer log family; `*` or unset means any
    pub log_type: Option<String>,
    /// Disabled rules are skipped during evaluation
    pub enabled: bool,
    /// Kind-specific condition with compiled artifacts
    pub kind: RuleKind,
}

impl Rule {
    fn base(name: String, kind: RuleKind) -> Self {
        Self {
            name,
            description: String::new(),
            severity: Severity::default(),
            notify: Vec::new(),
            cooldown: None,
            labels: HashMap::new(),
            log_type: None,
            enabled: true,
            kind,
        }
    }

    /// Create a pattern rule, compiling its regex. Matching is
    /// case-insensitive unless `case_sensitive` is set.
    pub fn pattern(
        name: impl Into<String>,
        pattern: impl Into<String>,
        case_sensitive: bool,
    ) -> Result<Self> {
        let name = validated_name(name.into())?;
        let pattern = pattern.into();
        let regex = compile_pattern(&pattern, case_sensitive)?;
        Ok(Self::base(
            name,
            RuleKind::Pattern {
                pattern,
                case_sensitive,
                regex,
            },
        ))
    }

    /// Create a threshold rule counting entries whose `field` satisfies
    /// `op value`, firing at `threshold` events inside `window`.
    pub fn threshold(
        name: impl Into<String>,
        field: Option<String>,
        value: Value,
        op: CompareOp,
        threshold: u64,
        window: Duration,
    ) -> Result<Self> {
        let name = validated_name(name.into())?;
        if threshold == 0 {
            return Err(AlertError::validation("threshold must be positive"));
        }
        if window.is_zero() {
            return Err(AlertError::validation("threshold window must be positive"));
        }
        let field = field.filter(|f| !f.is_empty());
        Ok(Self::base(
            name,
            RuleKind::Threshold {
                field,
                value,
                op,
                threshold,
                window,
            },
        ))
    }

    /// Create an expression rule, compiling its program.
    pub fn expression(
        name: impl Into<String>,
        source: &str,
        aggregation: Aggregation,
    ) -> Result<Self> {
        let name = validated_name(name.into())?;
        let program = Program::compile(source)?;
        Ok(Self::base(
            name,
            RuleKind::Expression {
                program,
                aggregation,
            },
        ))
    }

    /// Add a description to the rule.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the severity of the rule.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the sinks alerts are delivered to.
    pub fn with_notify(mut self, notify: Vec<String>) -> Self {
        self.notify = notify;
        self
    }

    /// Set the cooldown interval between firings.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Add a label selector entry.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Restrict the rule to one producer log family.
    pub fn with_log_type(mut self, log_type: impl Into<String>) -> Self {
        self.log_type = Some(log_type.into());
        self
    }

    /// Enable or disable the rule.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Apply the common pre-filter: the label selector and the log-type
    /// restriction. Missing entry labels fail the match.
    pub fn matches_filters(&self, entry: &LogEntry) -> bool {
        for (key, want) in &self.labels {
            match entry.label(key) {
                Some(got) => {
                    if want != "*" && got != want {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if let Some(log_type) = &self.log_type {
            if log_type != "*" && *log_type != entry.kind {
                return false;
            }
        }
        true
    }

    /// The cooldown to apply after a firing, if one is configured and
    /// non-zero.
    pub fn effective_cooldown(&self) -> Option<Duration> {
        self.cooldown.filter(|d| !d.is_zero())
    }
}

fn validated_name(name: String) -> Result<String> {
    if name.is_empty() {
        return Err(AlertError::validation("rule name must not be empty"));
    }
    Ok(name)
}

fn compile_pattern(pattern: &str, case_sensitive: bool) -> Result<Regex> {
    let source = if case_sensitive {
        pattern.to_string()
    } else {
        format!("(?i){}", pattern)
    };
    Regex::new(&source)
        .map_err(|e| AlertError::validation(format!("invalid pattern regex: {}", e)))
}
