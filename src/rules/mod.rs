//! Rule Model
//!
//! Validated, compiled rule objects and their declarative configuration
//! form. Compiled artifacts (regex, expression program, parsed durations)
//! are produced once during validation and read many times during
//! evaluation.

/// Compiled rule objects
pub mod rule;
/// Declarative rule specs and validation
pub mod spec;

pub use rule::{AggregateFn, Aggregation, Rule, RuleKind};
pub use spec::{compile_rules, AggregationSpec, RuleSpec};
