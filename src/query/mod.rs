//! # Query Evaluator
//!
//! Evaluates filter expressions against a JSON context. Mappings, custom
//! up-to-date checks, secret injection paths and metadata values are all
//! expressed in this language.
//!
//! The built-in [`JqEvaluator`] understands a jq subset:
//!
//! - Paths: `.`, `.a.b`, `."quoted key"`, `.["k"]`, `.[0]`, `.[-1]`
//! - Literals: strings (with `\(expr)` interpolation), numbers, `true`, `false`, `null`
//! - Construction: `[a, b]`, `{"k": e, k: e, (e): e, k}`
//! - Operators: `|`, `//`, `and`, `or`, `+ - * / %`, `== != < <= > >=`
//! - Control flow: `if ... then ... elif ... else ... end`
//! - Functions: `not`, `length`, `keys`, `has`, `tostring`, `tonumber`, `tojson`,
//!   `fromjson`, `ascii_downcase`, `ascii_upcase`, `contains`, `startswith`,
//!   `endswith`, `test`, `type`, `select`, `join`, `split`, `map`, `first`, `last`
//!
//! Evaluation is single-valued. Missing fields evaluate to `null`, and so
//! does field or index access on a value that has no fields (`.body.id`
//! on an empty body).

mod eval;
mod parser;

pub use eval::{compare_values, values_equal};

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("failed to parse query '{query}': {message}")]
    Parse { query: String, message: String },
    #[error("failed to evaluate query '{query}': {message}")]
    Eval { query: String, message: String },
    #[error("query '{query}' did not produce a boolean (got {got})")]
    NotBoolean { query: String, got: String },
}

/// Evaluates query expressions against a JSON context
///
/// Implementations must be pure: the same query and context always
/// produce the same result.
pub trait QueryEvaluator: Send + Sync + std::fmt::Debug {
    /// Evaluate `query` against `context`
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the query cannot be parsed or evaluated.
    fn evaluate(&self, query: &str, context: &Value) -> Result<Value, QueryError>;

    /// Evaluate `query` and render the result as text
    ///
    /// Strings are returned verbatim. Every other result, including `null`,
    /// is rendered as compact JSON, so an absent field shows up as `null`.
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors.
    fn evaluate_string(&self, query: &str, context: &Value) -> Result<String, QueryError> {
        Ok(match self.evaluate(query, context)? {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    /// Evaluate `query` as a predicate
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotBoolean`] when the result is not a boolean.
    fn evaluate_bool(&self, query: &str, context: &Value) -> Result<bool, QueryError> {
        match self.evaluate(query, context)? {
            Value::Bool(b) => Ok(b),
            other => Err(QueryError::NotBoolean {
                query: query.to_string(),
                got: other.to_string(),
            }),
        }
    }
}

/// Built-in jq-subset interpreter
#[derive(Debug, Clone, Copy, Default)]
pub struct JqEvaluator;

impl JqEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl QueryEvaluator for JqEvaluator {
    fn evaluate(&self, query: &str, context: &Value) -> Result<Value, QueryError> {
        if query.trim().is_empty() {
            return Err(QueryError::Parse {
                query: query.to_string(),
                message: "empty query".to_string(),
            });
        }
        let expr = parser::parse(query).map_err(|e| QueryError::Parse {
            query: query.to_string(),
            message: e.to_string(),
        })?;
        eval::evaluate(&expr, context).map_err(|message| QueryError::Eval {
            query: query.to_string(),
            message,
        })
    }
}
