//! Boolean Expression Sub-Language
//!
//! Compiles a small boolean expression over a fixed record environment and
//! evaluates it against incoming entries. Supported: comparison operators,
//! `&&`, `||`, `!`, parentheses, numeric/string/boolean literals, the
//! membership operator `in [..]`, the string predicates `contains`,
//! `startsWith`, `endsWith`, and `fields["k"]` / `labels["k"]` indexing.
//!
//! Compilation type-checks against the environment and rejects programs
//! that do not evaluate to a boolean; evaluation errors surface to the
//! caller, who treats them as non-matches.

use crate::entry::LogEntry;
use crate::errors::{AlertError, Result};
use crate::types::{CompareOp, Value};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Static type of a checked expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExprType {
    Bool,
    Int,
    Float,
    Str,
    /// Map lookups; the concrete tag is only known at evaluation time.
    Dynamic,
}

impl ExprType {
    fn name(&self) -> &'static str {
        match self {
            ExprType::Bool => "bool",
            ExprType::Int => "int",
            ExprType::Float => "float",
            ExprType::Str => "string",
            ExprType::Dynamic => "dynamic",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, ExprType::Int | ExprType::Float | ExprType::Dynamic)
    }

    fn is_stringish(&self) -> bool {
        matches!(self, ExprType::Str | ExprType::Dynamic)
    }

    fn is_boolish(&self) -> bool {
        matches!(self, ExprType::Bool | ExprType::Dynamic)
    }
}

/// Identifiers resolvable at compile time, with their static types.
static IDENT_TYPES: Lazy<HashMap<&'static str, ExprType>> = Lazy::new(|| {
    HashMap::from([
        ("level", ExprType::Str),
        ("message", ExprType::Str),
        ("source", ExprType::Str),
        ("type", ExprType::Str),
        ("file_path", ExprType::Str),
        ("http_status", ExprType::Int),
        ("http_method", ExprType::Str),
        ("uri", ExprType::Str),
    ])
});

/// Which record map an index expression reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapName {
    Fields,
    Labels,
}

/// String predicates usable as binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrPred {
    Contains,
    StartsWith,
    EndsWith,
}

impl StrPred {
    fn name(&self) -> &'static str {
        match self {
            StrPred::Contains => "contains",
            StrPred::StartsWith => "startsWith",
            StrPred::EndsWith => "endsWith",
        }
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Ident(String),
    Index { map: MapName, key: String },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    StrPred {
        pred: StrPred,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    In {
        needle: Box<Expr>,
        haystack: Vec<Value>,
    },
}

/// A compiled, type-checked expression, owned by its rule and evaluated
/// read-only against entries.
#[derive(Debug, Clone)]
pub struct Program {
    source: String,
    root: Expr,
}

impl Program {
    /// Compile and type-check an expression source.
    pub fn compile(source: &str) -> Result<Program> {
        let tokens = lex(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.expression()?;
        if parser.pos != parser.tokens.len() {
            return Err(AlertError::validation(format!(
                "invalid expression: unexpected trailing input at token {}",
                parser.pos
            )));
        }
        let ty = check(&root)?;
        if ty != ExprType::Bool {
            return Err(AlertError::validation(format!(
                "expression must evaluate to a boolean, got {}",
                ty.name()
            )));
        }
        Ok(Program {
            source: source.to_string(),
            root,
        })
    }

    /// The original expression source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the program against an entry.
    pub fn eval(&self, entry: &LogEntry) -> Result<bool> {
        match eval_expr(&self.root, entry)? {
            Value::Boolean(b) => Ok(b),
            other => Err(AlertError::evaluation(format!(
                "expression produced {}, expected boolean",
                value_type_name(&other)
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    True,
    False,
    And,
    Or,
    Not,
    Cmp(CompareOp),
    In,
    Pred(StrPred),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn lex(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_none() {
                    return Err(AlertError::validation("invalid expression: expected '&&'"));
                }
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_none() {
                    return Err(AlertError::validation("invalid expression: expected '||'"));
                }
                tokens.push(Token::Or);
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(AlertError::validation("invalid expression: expected '=='"));
                }
                tokens.push(Token::Cmp(CompareOp::Eq));
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Cmp(CompareOp::Ne));
                } else {
                    tokens.push(Token::Not);
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Cmp(CompareOp::Le));
                } else {
                    tokens.push(Token::Cmp(CompareOp::Lt));
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Cmp(CompareOp::Ge));
                } else {
                    tokens.push(Token::Cmp(CompareOp::Gt));
                }
            }
            '"' | '\'' => {
                tokens.push(Token::Str(lex_string(&mut chars)?));
            }
            '0'..='9' => {
                tokens.push(lex_number(&mut chars)?);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "in" => Token::In,
                    "contains" => Token::Pred(StrPred::Contains),
                    "startsWith" => Token::Pred(StrPred::StartsWith),
                    "endsWith" => Token::Pred(StrPred::EndsWith),
                    _ => Token::Ident(ident),
                });
            }
            other => {
                return Err(AlertError::validation(format!(
                    "invalid expression: unexpected character '{}'",
                    other
                )));
            }
        }
    }

    Ok(tokens)
}

fn lex_string(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String> {
    let quote = chars.next().unwrap();
    let mut out = String::new();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                Some(c) => {
                    return Err(AlertError::validation(format!(
                        "invalid expression: unknown escape '\\{}'",
                        c
                    )));
                }
                None => {
                    return Err(AlertError::validation(
                        "invalid expression: unterminated string literal",
                    ));
                }
            },
            Some(c) if c == quote => return Ok(out),
            Some(c) => out.push(c),
            None => {
                return Err(AlertError::validation(
                    "invalid expression: unterminated string literal",
                ));
            }
        }
    }
}

fn lex_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Token> {
    let mut text = String::new();
    let mut is_float = false;
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            chars.next();
        } else if c == '.' && !is_float {
            is_float = true;
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| AlertError::validation(format!("invalid expression: bad number '{}'", text)))
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| AlertError::validation(format!("invalid expression: bad number '{}'", text)))
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token, context: &str) -> Result<()> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(AlertError::validation(format!(
                "invalid expression: expected {} ({:?}), got {:?}",
                context, expected, other
            ))),
        }
    }

    /// expression := and ( '||' and )*
    fn expression(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.next();
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// and := comparison ( '&&' comparison )*
    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.comparison()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.next();
            let rhs = self.comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// comparison := unary ( cmp-op unary | 'in' array | pred unary )?
    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.unary()?;
        match self.peek() {
            Some(Token::Cmp(op)) => {
                let op = *op;
                self.next();
                let rhs = self.unary()?;
                Ok(Expr::Compare {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            Some(Token::In) => {
                self.next();
                let haystack = self.array_literal()?;
                Ok(Expr::In {
                    needle: Box::new(lhs),
                    haystack,
                })
            }
            Some(Token::Pred(pred)) => {
                let pred = *pred;
                self.next();
                let rhs = self.unary()?;
                Ok(Expr::StrPred {
                    pred,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            _ => Ok(lhs),
        }
    }

    /// unary := '!' unary | primary
    fn unary(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.next();
            let inner = self.unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    /// primary := literal | ident | ident '[' string ']' | '(' expression ')'
    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Integer(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Number(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Boolean(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Boolean(false))),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(&Token::RParen, "closing parenthesis")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LBracket)) {
                    let map = match name.as_str() {
                        "fields" => MapName::Fields,
                        "labels" => MapName::Labels,
                        _ => {
                            return Err(AlertError::validation(format!(
                                "invalid expression: '{}' is not indexable",
                                name
                            )));
                        }
                    };
                    self.next();
                    let key = match self.next() {
                        Some(Token::Str(k)) => k,
                        other => {
                            return Err(AlertError::validation(format!(
                                "invalid expression: map index must be a string literal, got {:?}",
                                other
                            )));
                        }
                    };
                    self.expect(&Token::RBracket, "closing bracket")?;
                    Ok(Expr::Index { map, key })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(AlertError::validation(format!(
                "invalid expression: unexpected token {:?}",
                other
            ))),
        }
    }

    /// array := '[' literal ( ',' literal )* ']'
    fn array_literal(&mut self) -> Result<Vec<Value>> {
        self.expect(&Token::LBracket, "array literal")?;
        let mut elements = Vec::new();
        if matches!(self.peek(), Some(Token::RBracket)) {
            self.next();
            return Ok(elements);
        }
        loop {
            let value = match self.next() {
                Some(Token::Int(i)) => Value::Integer(i),
                Some(Token::Float(f)) => Value::Number(f),
                Some(Token::Str(s)) => Value::String(s),
                Some(Token::True) => Value::Boolean(true),
                Some(Token::False) => Value::Boolean(false),
                other => {
                    return Err(AlertError::validation(format!(
                        "invalid expression: array literals may contain only literals, got {:?}",
                        other
                    )));
                }
            };
            elements.push(value);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                other => {
                    return Err(AlertError::validation(format!(
                        "invalid expression: expected ',' or ']' in array literal, got {:?}",
                        other
                    )));
                }
            }
        }
        Ok(elements)
    }
}

// ---------------------------------------------------------------------------
// Type checker
// ---------------------------------------------------------------------------

fn check(expr: &Expr) -> Result<ExprType> {
    match expr {
        Expr::Literal(v) => Ok(match v {
            Value::Boolean(_) => ExprType::Bool,
            Value::Integer(_) => ExprType::Int,
            Value::Number(_) => ExprType::Float,
            Value::String(_) => ExprType::Str,
            Value::Array(_) | Value::Null => ExprType::Dynamic,
        }),
        Expr::Ident(name) => match IDENT_TYPES.get(name.as_str()) {
            Some(ty) => Ok(*ty),
            None if name == "fields" || name == "labels" => Err(AlertError::validation(format!(
                "map identifier '{}' must be indexed",
                name
            ))),
            None => Err(AlertError::validation(format!(
                "unknown identifier: {}",
                name
            ))),
        },
        Expr::Index { .. } => Ok(ExprType::Dynamic),
        Expr::Not(inner) => {
            let ty = check(inner)?;
            if !ty.is_boolish() {
                return Err(AlertError::validation(format!(
                    "operator '!' requires a boolean operand, got {}",
                    ty.name()
                )));
            }
            Ok(ExprType::Bool)
        }
        Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
            for side in [lhs, rhs] {
                let ty = check(side)?;
                if !ty.is_boolish() {
                    return Err(AlertError::validation(format!(
                        "logical operators require boolean operands, got {}",
                        ty.name()
                    )));
                }
            }
            Ok(ExprType::Bool)
        }
        Expr::Compare { op, lhs, rhs } => {
            let lt = check(lhs)?;
            let rt = check(rhs)?;
            let compatible = if op.is_equality() {
                lt == rt
                    || (lt.is_numeric() && rt.is_numeric())
                    || lt == ExprType::Dynamic
                    || rt == ExprType::Dynamic
            } else {
                (lt.is_numeric() && rt.is_numeric())
                    || (lt.is_stringish() && rt.is_stringish())
            };
            if !compatible {
                return Err(AlertError::validation(format!(
                    "operator '{}' cannot compare {} with {}",
                    op,
                    lt.name(),
                    rt.name()
                )));
            }
            Ok(ExprType::Bool)
        }
        Expr::StrPred { pred, lhs, rhs } => {
            for side in [lhs, rhs] {
                let ty = check(side)?;
                if !ty.is_stringish() {
                    return Err(AlertError::validation(format!(
                        "'{}' requires string operands, got {}",
                        pred.name(),
                        ty.name()
                    )));
                }
            }
            Ok(ExprType::Bool)
        }
        Expr::In { needle, .. } => {
            check(needle)?;
            Ok(ExprType::Bool)
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Boolean(_) => "bool",
        Value::Integer(_) => "int",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Null => "null",
    }
}

fn eval_expr(expr: &Expr, entry: &LogEntry) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(name) => Ok(resolve_ident(name, entry)),
        Expr::Index { map, key } => Ok(match map {
            MapName::Fields => entry.field(key).cloned().unwrap_or(Value::Null),
            MapName::Labels => entry
                .label(key)
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null),
        }),
        Expr::Not(inner) => match eval_expr(inner, entry)? {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            other => Err(AlertError::evaluation(format!(
                "operator '!' applied to {}",
                value_type_name(&other)
            ))),
        },
        Expr::And(lhs, rhs) => {
            if !eval_bool(lhs, entry)? {
                return Ok(Value::Boolean(false));
            }
            Ok(Value::Boolean(eval_bool(rhs, entry)?))
        }
        Expr::Or(lhs, rhs) => {
            if eval_bool(lhs, entry)? {
                return Ok(Value::Boolean(true));
            }
            Ok(Value::Boolean(eval_bool(rhs, entry)?))
        }
        Expr::Compare { op, lhs, rhs } => {
            let l = eval_expr(lhs, entry)?;
            let r = eval_expr(rhs, entry)?;
            loose_compare(*op, &l, &r).map(Value::Boolean)
        }
        Expr::StrPred { pred, lhs, rhs } => {
            let l = eval_expr(lhs, entry)?;
            let r = eval_expr(rhs, entry)?;
            let (Some(l), Some(r)) = (l.as_str(), r.as_str()) else {
                return Err(AlertError::evaluation(format!(
                    "'{}' applied to non-string operand",
                    pred.name()
                )));
            };
            Ok(Value::Boolean(match pred {
                StrPred::Contains => l.contains(r),
                StrPred::StartsWith => l.starts_with(r),
                StrPred::EndsWith => l.ends_with(r),
            }))
        }
        Expr::In { needle, haystack } => {
            let needle = eval_expr(needle, entry)?;
            let found = haystack
                .iter()
                .any(|elem| loose_compare(CompareOp::Eq, &needle, elem).unwrap_or(false));
            Ok(Value::Boolean(found))
        }
    }
}

fn eval_bool(expr: &Expr, entry: &LogEntry) -> Result<bool> {
    match eval_expr(expr, entry)? {
        Value::Boolean(b) => Ok(b),
        other => Err(AlertError::evaluation(format!(
            "logical operand is {}, expected bool",
            value_type_name(&other)
        ))),
    }
}

fn resolve_ident(name: &str, entry: &LogEntry) -> Value {
    match name {
        "level" => Value::String(entry.level.to_lowercase()),
        "message" => Value::String(entry.message.clone()),
        "source" => Value::String(entry.source.clone()),
        "type" => Value::String(entry.kind.to_lowercase()),
        "file_path" => Value::String(entry.file_path.clone()),
        "http_status" => Value::Integer(http_status(entry)),
        "http_method" => Value::String(stringified_field(entry, "method")),
        "uri" => Value::String(stringified_field(entry, "uri")),
        // Unknown names are rejected at compile time.
        _ => Value::Null,
    }
}

fn http_status(entry: &LogEntry) -> i64 {
    match entry.field("status") {
        Some(Value::Integer(i)) => *i,
        Some(Value::Number(n)) => *n as i64,
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

fn stringified_field(entry: &LogEntry, name: &str) -> String {
    entry.field(name).map(Value::render).unwrap_or_default()
}

/// Runtime comparison over dynamic values. Equality between mismatched
/// incoercible tags is simply false; ordering them is an error.
fn loose_compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool> {
    match (lhs, rhs) {
        (Value::String(l), Value::String(r)) => Ok(op.compare_str(l, r)),
        (Value::Boolean(l), Value::Boolean(r)) => {
            if op.is_equality() {
                Ok(op.compare_f64(*l as i64 as f64, *r as i64 as f64))
            } else {
                Err(AlertError::evaluation("cannot order boolean values"))
            }
        }
        (Value::Null, Value::Null) => match op {
            CompareOp::Eq => Ok(true),
            CompareOp::Ne => Ok(false),
            _ => Err(AlertError::evaluation("cannot order null value")),
        },
        (Value::Null, _) | (_, Value::Null) => match op {
            CompareOp::Eq => Ok(false),
            CompareOp::Ne => Ok(true),
            _ => Err(AlertError::evaluation("cannot order null value")),
        },
        _ => match (lhs.to_number(), rhs.to_number()) {
            (Some(l), Some(r)) => Ok(op.compare_f64(l, r)),
            _ if op.is_equality() => Ok(matches!(op, CompareOp::Ne)),
            _ => Err(AlertError::evaluation(format!(
                "cannot compare {} with {}",
                value_type_name(lhs),
                value_type_name(rhs)
            ))),
        },
    }
}
