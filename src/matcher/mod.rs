//! Record Matchers
//!
//! The two matcher layers rules are built on: literal-field comparison with
//! cross-type numeric coercion, and a compiled boolean expression
//! sub-language evaluated against a fixed record environment.

/// Boolean expression sub-language: lexer, parser, type checker, evaluator
pub mod expr;
/// Literal-field comparison with cross-type coercion
pub mod field;

pub use expr::Program;
pub use field::{match_field, resolve_field};
