use crate::entry::LogEntry;
use crate::types::{CompareOp, Value};

/// Extract a named attribute from an entry.
///
/// Reserved names map to record attributes; anything else is looked up in
/// `fields`, then `labels`. Returns `None` when the name resolves nowhere.
pub fn resolve_field(entry: &LogEntry, name: &str) -> Option<Value> {
    match name {
        "level" => Some(Value::String(entry.level.clone())),
        "message" => Some(Value::String(entry.message.clone())),
        "type" => Some(Value::String(entry.kind.clone())),
        "source" => Some(Value::String(entry.source.clone())),
        "raw" => Some(Value::String(entry.raw.clone())),
        "file_path" | "filepath" => Some(Value::String(entry.file_path.clone())),
        _ => entry
            .field(name)
            .cloned()
            .or_else(|| entry.label(name).map(|v| Value::String(v.to_string()))),
    }
}

/// Compare an entry attribute against a rule value.
///
/// Resolution order per operand shape:
/// 1. absent attribute never matches;
/// 2. a string attribute compares lexicographically against the rule
///    value's string form;
/// 3. otherwise both sides are coerced to floats when possible;
/// 4. otherwise fall back to string-form comparison, where only equality
///    operators are defined.
pub fn match_field(entry: &LogEntry, name: &str, op: CompareOp, rhs: &Value) -> bool {
    match resolve_field(entry, name) {
        Some(lhs) => compare_values(op, &lhs, rhs),
        None => false,
    }
}

/// Apply the coercing comparison of [`match_field`] to two values.
pub fn compare_values(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    if let Value::String(l) = lhs {
        return op.compare_str(l, &rhs.render());
    }

    if let (Some(l), Some(r)) = (lhs.to_number(), rhs.to_number()) {
        return op.compare_f64(l, r);
    }

    if op.is_equality() {
        return op.compare_str(&lhs.render(), &rhs.render());
    }
    false
}
