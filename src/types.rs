use serde::{Deserialize, Serialize};

/// A scalar value carried by a log entry field or a rule condition.
///
/// Field maps on incoming entries are heterogeneous, so comparisons inspect
/// the tag and coerce at the comparison site rather than assuming a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point number
    Number(f64),
    /// String value
    String(String),
    /// Array of values (expression array literals, membership tests)
    Array(Vec<Value>),
    /// Null value (absent map lookups at expression runtime)
    Null,
}

impl Value {
    /// Render the value as a plain string (no quoting).
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Array(_) => "[array]".to_string(),
            Value::Null => "null".to_string(),
        }
    }

    /// Convert to a number if possible. Strings are parsed as decimal
    /// float first, then decimal integer.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .or_else(|| s.parse::<i64>().ok().map(|i| i as f64)),
            _ => None,
        }
    }

    /// Borrow the string payload if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whether this value is the null tag.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json_value: serde_json::Value) -> Self {
        match json_value {
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Number(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Null | serde_json::Value::Object(_) => Value::Null,
        }
    }
}

/// Comparison operators usable in threshold conditions and aggregations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equality comparison
    Eq,
    /// Inequality comparison
    Ne,
    /// Greater than comparison
    Gt,
    /// Greater than or equal comparison
    Ge,
    /// Less than comparison
    Lt,
    /// Less than or equal comparison
    Le,
}

/// Absolute tolerance for floating-point equality in aggregations.
pub const FLOAT_TOLERANCE: f64 = 1e-9;

impl CompareOp {
    /// Parse an operator from its source form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            _ => None,
        }
    }

    /// The operator's source form.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    /// Apply the operator to two floats. Equality uses an absolute
    /// tolerance so rates computed from division compare sanely.
    pub fn compare_f64(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => (lhs - rhs).abs() <= FLOAT_TOLERANCE,
            CompareOp::Ne => (lhs - rhs).abs() > FLOAT_TOLERANCE,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
        }
    }

    /// Apply the operator to two strings lexicographically.
    pub fn compare_str(&self, lhs: &str, rhs: &str) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
        }
    }

    /// Whether this operator is defined for the string-form fallback
    /// comparison of otherwise incomparable values.
    pub fn is_equality(&self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity attached to rules and propagated to alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, low urgency
    Low,
    /// Default severity
    #[default]
    Medium,
    /// Needs attention soon
    High,
    /// Page somebody
    Critical,
}

impl Severity {
    /// Parse a severity name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// The lowercase severity name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_numeric_coercion() {
        assert_eq!(Value::Integer(42).to_number(), Some(42.0));
        assert_eq!(Value::Number(1.5).to_number(), Some(1.5));
        assert_eq!(Value::String("3.25".to_string()).to_number(), Some(3.25));
        assert_eq!(Value::String("404".to_string()).to_number(), Some(404.0));
        assert_eq!(Value::String("abc".to_string()).to_number(), None);
        assert_eq!(Value::Boolean(true).to_number(), None);
    }

    #[test]
    fn test_compare_op_parse() {
        assert_eq!(CompareOp::parse(">="), Some(CompareOp::Ge));
        assert_eq!(CompareOp::parse("=="), Some(CompareOp::Eq));
        assert_eq!(CompareOp::parse("~="), None);
    }

    #[test]
    fn test_float_equality_tolerance() {
        assert!(CompareOp::Eq.compare_f64(0.1 + 0.2, 0.3));
        assert!(!CompareOp::Ne.compare_f64(0.1 + 0.2, 0.3));
        assert!(CompareOp::Ge.compare_f64(3.0, 3.0));
    }

    #[test]
    fn test_severity_ordering_and_parse() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert_eq!(Severity::parse("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::default(), Severity::Medium);
        assert_eq!(Severity::parse("urgent"), None);
    }

    #[test]
    fn test_value_untagged_serde() {
        let v: Value = serde_json::from_str("503").unwrap();
        assert_eq!(v, Value::Integer(503));
        let v: Value = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(v, Value::String("error".to_string()));
        let v: Value = serde_json::from_str("true").unwrap();
        assert_eq!(v, Value::Boolean(true));
    }
}
