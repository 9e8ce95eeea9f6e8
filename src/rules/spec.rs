use crate::errors::{AlertError, Result};
use crate::types::{CompareOp, Severity, Value};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::rule::{AggregateFn, Aggregation, Rule};

/// Declarative rule form, as it appears in configuration documents.
///
/// The loader deserializes a top-level sequence of these and hands the
/// compiled [`Rule`]s to the engine; every compiled artifact (regex,
/// expression program, durations) is produced here, once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleSpec {
    /// Unique rule name
    #[serde(default)]
    pub name: String,
    /// Human description
    #[serde(default)]
    pub description: String,
    /// Rule kind: `pattern`, `threshold` or `expression`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Severity name; defaults to `medium`
    #[serde(default)]
    pub severity: Option<String>,
    /// Sink names to notify
    #[serde(default)]
    pub notify: Vec<String>,
    /// Cooldown duration, e.g. `30s`, `5m`, `1h30m`
    #[serde(default)]
    pub cooldown: Option<String>,
    /// Label selector; value `*` matches any value of a present label
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Producer log family restriction; `*` means any
    #[serde(default)]
    pub log_type: Option<String>,
    /// Unset means enabled
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Pattern rules: regex source
    #[serde(default)]
    pub pattern: Option<String>,
    /// Pattern rules: case sensitivity, default false
    #[serde(default)]
    pub case_sensitive: Option<bool>,

    /// Threshold rules: field to test; empty matches any entry
    #[serde(default)]
    pub field: Option<String>,
    /// Threshold rules: value the field is compared against
    #[serde(default)]
    pub value: Option<Value>,
    /// Threshold rules: comparison operator, default `==`
    #[serde(default)]
    pub operator: Option<String>,
    /// Threshold rules: event count that triggers the rule
    #[serde(default)]
    pub threshold: Option<i64>,
    /// Threshold rules: window duration, e.g. `5m`
    #[serde(default)]
    pub window: Option<String>,

    /// Expression rules: expression source
    #[serde(default)]
    pub expression: Option<String>,
    /// Expression rules: windowed aggregation
    #[serde(default)]
    pub aggregation: Option<AggregationSpec>,
}

/// Declarative aggregation form for expression rules.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregationSpec {
    /// Aggregate function: `count` or `rate`
    pub function: String,
    /// Comparison operator, default `>=`
    #[serde(default)]
    pub operator: Option<String>,
    /// Trigger threshold
    pub threshold: f64,
    /// Window duration, e.g. `1m`
    pub window: String,
}

impl RuleSpec {
    /// Validate and compile this spec into a [`Rule`].
    pub fn compile(&self) -> Result<Rule> {
        if self.name.is_empty() {
            return Err(AlertError::validation("rule name must not be empty"));
        }

        let severity = match &self.severity {
            Some(s) => Severity::parse(s).ok_or_else(|| {
                AlertError::validation(format!("rule '{}': unknown severity '{}'", self.name, s))
            })?,
            None => Severity::default(),
        };

        let cooldown = match &self.cooldown {
            Some(s) => Some(self.parse_duration(s, "cooldown")?),
            None => None,
        };

        let mut rule = match self.kind.as_str() {
            "pattern" => {
                let pattern = self.pattern.as_deref().ok_or_else(|| {
                    AlertError::validation(format!(
                        "rule '{}': pattern rules require a pattern",
                        self.name
                    ))
                })?;
                Rule::pattern(self.name.as_str(), pattern, self.case_sensitive.unwrap_or(false))?
            }
            "threshold" => {
                let threshold = self.threshold.ok_or_else(|| {
                    AlertError::validation(format!(
                        "rule '{}': threshold rules require a threshold",
                        self.name
                    ))
                })?;
                if threshold <= 0 {
                    return Err(AlertError::validation(format!(
                        "rule '{}': threshold must be positive",
                        self.name
                    )));
                }
                let window = self.window.as_deref().ok_or_else(|| {
                    AlertError::validation(format!(
                        "rule '{}': threshold rules require a window",
                        self.name
                    ))
                })?;
                let window = self.parse_duration(window, "window")?;
                let op = self.parse_operator(self.operator.as_deref(), CompareOp::Eq)?;
                let field = self.field.clone().filter(|f| !f.is_empty());
                if field.is_some() && self.value.is_none() {
                    return Err(AlertError::validation(format!(
                        "rule '{}': threshold rules with a field require a value",
                        self.name
                    )));
                }
                Rule::threshold(
                    self.name.as_str(),
                    field,
                    self.value.clone().unwrap_or(Value::Null),
                    op,
                    threshold as u64,
                    window,
                )?
            }
            "expression" => {
                let expression = self.expression.as_deref().ok_or_else(|| {
                    AlertError::validation(format!(
                        "rule '{}': expression rules require an expression",
                        self.name
                    ))
                })?;
                let agg = self.aggregation.as_ref().ok_or_else(|| {
                    AlertError::validation(format!(
                        "rule '{}': expression rules require an aggregation",
                        self.name
                    ))
                })?;
                let function = AggregateFn::parse(&agg.function).ok_or_else(|| {
                    AlertError::validation(format!(
                        "rule '{}': unknown aggregation function '{}'",
                        self.name, agg.function
                    ))
                })?;
                let op = self.parse_operator(agg.operator.as_deref(), CompareOp::Ge)?;
                let window = self.parse_duration(&agg.window, "aggregation window")?;
                let aggregation = Aggregation::with_op(function, op, agg.threshold, window)
                    .map_err(|e| {
                        AlertError::validation(format!("rule '{}': {}", self.name, e))
                    })?;
                Rule::expression(self.name.as_str(), expression, aggregation)?
            }
            other => {
                return Err(AlertError::validation(format!(
                    "rule '{}': invalid rule kind '{}'",
                    self.name, other
                )));
            }
        };

        rule.description = self.description.clone();
        rule.severity = severity;
        rule.notify = self.notify.clone();
        rule.cooldown = cooldown;
        rule.labels = self.labels.clone();
        rule.log_type = self.log_type.clone().filter(|t| !t.is_empty() && t != "*");
        rule.enabled = self.enabled.unwrap_or(true);
        Ok(rule)
    }

    fn parse_duration(&self, s: &str, what: &str) -> Result<Duration> {
        humantime::parse_duration(s).map_err(|e| {
            AlertError::validation(format!(
                "rule '{}': unparseable {} '{}': {}",
                self.name, what, s, e
            ))
        })
    }

    fn parse_operator(&self, s: Option<&str>, default: CompareOp) -> Result<CompareOp> {
        match s {
            Some(s) => CompareOp::parse(s).ok_or_else(|| {
                AlertError::validation(format!(
                    "rule '{}': unknown operator '{}'",
                    self.name, s
                ))
            }),
            None => Ok(default),
        }
    }
}

/// Compile a batch of specs, all-or-nothing: the first validation failure
/// (including duplicate names) aborts the whole batch.
pub fn compile_rules(specs: &[RuleSpec]) -> Result<Vec<Rule>> {
    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(specs.len());
    for spec in specs {
        let rule = spec.compile()?;
        if !seen.insert(rule.name.clone()) {
            return Err(AlertError::validation(format!(
                "duplicate rule name '{}'",
                rule.name
            )));
        }
        rules.push(rule);
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::rule::RuleKind;

    fn pattern_spec(name: &str) -> RuleSpec {
        RuleSpec {
            name: name.to_string(),
            kind: "pattern".to_string(),
            pattern: Some("ERROR".to_string()),
            ..RuleSpec::default()
        }
    }

    #[test]
    fn test_pattern_spec_compiles() {
        let mut spec = pattern_spec("errs");
        spec.severity = Some("high".to_string());
        spec.cooldown = Some("30s".to_string());
        spec.notify = vec!["email".to_string()];

        let rule = spec.compile().unwrap();
        assert_eq!(rule.name, "errs");
        assert_eq!(rule.severity, Severity::High);
        assert_eq!(rule.cooldown, Some(Duration::from_secs(30)));
        assert!(rule.enabled);
        assert_eq!(rule.kind.name(), "pattern");
    }

    #[test]
    fn test_threshold_spec_defaults_operator() {
        let spec = RuleSpec {
            name: "t".to_string(),
            kind: "threshold".to_string(),
            field: Some("level".to_string()),
            value: Some("error".into()),
            threshold: Some(3),
            window: Some("5m".to_string()),
            ..RuleSpec::default()
        };
        let rule = spec.compile().unwrap();
        let RuleKind::Threshold { op, window, .. } = &rule.kind else {
            panic!("wrong kind");
        };
        assert_eq!(*op, CompareOp::Eq);
        assert_eq!(*window, Duration::from_secs(300));
    }

    #[test]
    fn test_expression_spec() {
        let spec = RuleSpec {
            name: "e".to_string(),
            kind: "expression".to_string(),
            expression: Some("http_status >= 500".to_string()),
            aggregation: Some(AggregationSpec {
                function: "rate".to_string(),
                operator: None,
                threshold: 2.0,
                window: "1m".to_string(),
            }),
            ..RuleSpec::default()
        };
        let rule = spec.compile().unwrap();
        let RuleKind::Expression { aggregation, .. } = &rule.kind else {
            panic!("wrong kind");
        };
        assert_eq!(aggregation.function, AggregateFn::Rate);
        assert_eq!(aggregation.op, CompareOp::Ge);
    }

    #[test]
    fn test_validation_failures() {
        // Empty name.
        assert!(RuleSpec::default().compile().is_err());
        // Invalid kind.
        let spec = RuleSpec {
            name: "x".to_string(),
            kind: "anomaly".to_string(),
            ..RuleSpec::default()
        };
        assert!(spec.compile().is_err());
        // Missing pattern.
        let spec = RuleSpec {
            name: "x".to_string(),
            kind: "pattern".to_string(),
            ..RuleSpec::default()
        };
        assert!(spec.compile().is_err());
        // Bad duration.
        let mut spec = pattern_spec("x");
        spec.cooldown = Some("5 parsecs".to_string());
        assert!(spec.compile().is_err());
        // Bad operator.
        let spec = RuleSpec {
            name: "x".to_string(),
            kind: "threshold".to_string(),
            field: Some("level".to_string()),
            value: Some("error".into()),
            operator: Some("~=".to_string()),
            threshold: Some(1),
            window: Some("1m".to_string()),
            ..RuleSpec::default()
        };
        assert!(spec.compile().is_err());
        // Non-positive threshold.
        let spec = RuleSpec {
            name: "x".to_string(),
            kind: "threshold".to_string(),
            threshold: Some(0),
            window: Some("1m".to_string()),
            ..RuleSpec::default()
        };
        assert!(spec.compile().is_err());
    }

    #[test]
    fn test_wildcard_log_type_normalized() {
        let mut spec = pattern_spec("x");
        spec.log_type = Some("*".to_string());
        assert_eq!(spec.compile().unwrap().log_type, None);
    }

    #[test]
    fn test_batch_compile_is_all_or_nothing() {
        let good = pattern_spec("a");
        let bad = RuleSpec {
            name: "b".to_string(),
            kind: "pattern".to_string(),
            pattern: Some("f(".to_string()),
            ..RuleSpec::default()
        };
        assert!(compile_rules(&[good.clone(), bad]).is_err());

        // Duplicate names abort too.
        assert!(compile_rules(&[good.clone(), good.clone()]).is_err());
        assert_eq!(compile_rules(&[good]).unwrap().len(), 1);
    }
}
