//! # Query Parser
//!
//! Parses query expressions into the tree evaluated by [`super::eval`],
//! using the pest grammar in `jq.pest`.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use serde_json::Value;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "query/jq.pest"]
struct QueryParser;

/// Parser error
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Pest(Box<pest::error::Error<Rule>>),

    #[error("invalid number literal: {0}")]
    InvalidNumber(String),

    #[error("invalid string literal: {0}")]
    InvalidString(String),

    #[error("expected {0:?}")]
    Missing(Rule),

    #[error("unexpected rule: {0:?}")]
    UnexpectedRule(Rule),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        ParseError::Pest(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interp {
    Lit(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKey {
    Static(String),
    Template(Vec<Interp>),
    Dynamic(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identity,
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Literal(Value),
    Template(Vec<Interp>),
    Array(Vec<Expr>),
    Object(Vec<(ObjectKey, Expr)>),
    Pipe(Box<Expr>, Box<Expr>),
    Alt(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Call(String, Vec<Expr>),
    If(Vec<(Expr, Expr)>, Option<Box<Expr>>),
}

/// Parse a query expression
pub fn parse(input: &str) -> Result<Expr> {
    let mut pairs = QueryParser::parse(Rule::query, input)?;
    let query = next_pair(&mut pairs, Rule::query)?;
    let pipe = query
        .into_inner()
        .find(|pair| pair.as_rule() == Rule::pipe)
        .ok_or(ParseError::Missing(Rule::pipe))?;
    build_expr(pipe)
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, expected: Rule) -> Result<Pair<'i, Rule>> {
    pairs.next().ok_or(ParseError::Missing(expected))
}

fn build_expr(pair: Pair<'_, Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::pipe => fold(pair.into_inner(), Expr::Pipe),
        // The right operand is itself an `alternative`, so `//` nests to the right
        Rule::alternative => fold(pair.into_inner(), Expr::Alt),
        Rule::or_expr => fold(
            pair.into_inner().filter(|p| p.as_rule() != Rule::kw_or),
            Expr::Or,
        ),
        Rule::and_expr => fold(
            pair.into_inner().filter(|p| p.as_rule() != Rule::kw_and),
            Expr::And,
        ),
        Rule::comparison | Rule::additive | Rule::multiplicative => build_binary(pair),
        Rule::unary => build_unary(pair),
        Rule::postfix => build_postfix(pair),
        Rule::path_field => Ok(field(Expr::Identity, pair.as_str())),
        Rule::root_quoted => {
            let key = static_string(first_inner(pair, Rule::string)?)?;
            Ok(Expr::Field(Box::new(Expr::Identity), key))
        }
        Rule::root_index => {
            let index = build_expr(first_inner(pair, Rule::pipe)?)?;
            Ok(Expr::Index(Box::new(Expr::Identity), Box::new(index)))
        }
        Rule::identity => Ok(Expr::Identity),
        Rule::number => build_number(pair.as_str()),
        Rule::string => {
            let template = build_template(pair)?;
            Ok(match as_literal(&template) {
                Some(text) => Expr::Literal(Value::String(text)),
                None => Expr::Template(template),
            })
        }
        Rule::array => pair
            .into_inner()
            .map(build_expr)
            .collect::<Result<Vec<_>>>()
            .map(Expr::Array),
        Rule::object => pair
            .into_inner()
            .map(build_object_entry)
            .collect::<Result<Vec<_>>>()
            .map(Expr::Object),
        Rule::if_expr => build_if(pair),
        Rule::call => build_call(pair),
        other => Err(ParseError::UnexpectedRule(other)),
    }
}

/// Left-fold operands with `combine`
fn fold<'i>(
    operands: impl Iterator<Item = Pair<'i, Rule>>,
    combine: fn(Box<Expr>, Box<Expr>) -> Expr,
) -> Result<Expr> {
    let mut operands = operands.map(build_expr);
    let mut lhs = operands.next().ok_or(ParseError::Missing(Rule::pipe))??;
    for rhs in operands {
        lhs = combine(Box::new(lhs), Box::new(rhs?));
    }
    Ok(lhs)
}

/// `operand (op operand)*`, left-associative
fn build_binary(pair: Pair<'_, Rule>) -> Result<Expr> {
    let rule = pair.as_rule();
    let mut inner = pair.into_inner();
    let mut lhs = build_expr(next_pair(&mut inner, rule)?)?;
    let rest: Vec<Pair<'_, Rule>> = inner.collect();
    for step in rest.chunks(2) {
        let [op, rhs] = step else {
            return Err(ParseError::Missing(rule));
        };
        lhs = Expr::Binary(
            binary_op(op)?,
            Box::new(lhs),
            Box::new(build_expr(rhs.clone())?),
        );
    }
    Ok(lhs)
}

fn binary_op(op: &Pair<'_, Rule>) -> Result<BinOp> {
    Ok(match op.as_str() {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "%" => BinOp::Rem,
        "==" => BinOp::Eq,
        "!=" => BinOp::Ne,
        "<" => BinOp::Lt,
        "<=" => BinOp::Le,
        ">" => BinOp::Gt,
        ">=" => BinOp::Ge,
        _ => return Err(ParseError::UnexpectedRule(op.as_rule())),
    })
}

fn build_unary(pair: Pair<'_, Rule>) -> Result<Expr> {
    let mut negations = 0;
    let mut operand = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::neg => negations += 1,
            _ => operand = Some(build_expr(inner)?),
        }
    }

    let mut expr = operand.ok_or(ParseError::Missing(Rule::postfix))?;
    for _ in 0..negations {
        expr = Expr::Neg(Box::new(expr));
    }
    Ok(expr)
}

fn build_postfix(pair: Pair<'_, Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let mut expr = build_expr(next_pair(&mut inner, Rule::postfix)?)?;
    for suffix in inner {
        expr = match suffix.as_rule() {
            Rule::field_suffix => field(expr, suffix.as_str()),
            Rule::quoted_suffix => {
                let key = static_string(first_inner(suffix, Rule::string)?)?;
                Expr::Field(Box::new(expr), key)
            }
            Rule::index_suffix => {
                let index = build_expr(first_inner(suffix, Rule::pipe)?)?;
                Expr::Index(Box::new(expr), Box::new(index))
            }
            // Missing fields already evaluate to null
            Rule::optional => expr,
            other => return Err(ParseError::UnexpectedRule(other)),
        };
    }
    Ok(expr)
}

fn first_inner(pair: Pair<'_, Rule>, expected: Rule) -> Result<Pair<'_, Rule>> {
    next_pair(&mut pair.into_inner(), expected)
}

/// `.name` applied to `target`
fn field(target: Expr, text: &str) -> Expr {
    let name = text.strip_prefix('.').unwrap_or(text);
    Expr::Field(Box::new(target), name.to_string())
}

fn build_number(text: &str) -> Result<Expr> {
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(|number| Expr::Literal(super::eval::normalize_number(number)))
        .ok_or_else(|| ParseError::InvalidNumber(text.to_string()))
}

fn build_template(pair: Pair<'_, Rule>) -> Result<Vec<Interp>> {
    let mut parts = Vec::new();
    let mut text = String::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string_text => text.push_str(inner.as_str()),
            Rule::escape => text.push(unescape(inner.as_str())?),
            Rule::interpolation => {
                if !text.is_empty() {
                    parts.push(Interp::Lit(std::mem::take(&mut text)));
                }
                let expr = build_expr(first_inner(inner, Rule::pipe)?)?;
                parts.push(Interp::Expr(expr));
            }
            other => return Err(ParseError::UnexpectedRule(other)),
        }
    }

    if !text.is_empty() || parts.is_empty() {
        parts.push(Interp::Lit(text));
    }
    Ok(parts)
}

fn as_literal(template: &[Interp]) -> Option<String> {
    match template {
        [Interp::Lit(text)] => Some(text.clone()),
        _ => None,
    }
}

fn static_string(pair: Pair<'_, Rule>) -> Result<String> {
    let source = pair.as_str().to_string();
    as_literal(&build_template(pair)?).ok_or(ParseError::InvalidString(source))
}

fn unescape(escape: &str) -> Result<char> {
    let body = escape.strip_prefix('\\').unwrap_or(escape);
    Ok(match body {
        "\"" => '"',
        "\\" => '\\',
        "/" => '/',
        "n" => '\n',
        "t" => '\t',
        "r" => '\r',
        "b" => '\u{8}',
        "f" => '\u{c}',
        _ => body
            .strip_prefix('u')
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32)
            .ok_or_else(|| ParseError::InvalidString(escape.to_string()))?,
    })
}

fn build_object_entry(pair: Pair<'_, Rule>) -> Result<(ObjectKey, Expr)> {
    let mut inner = pair.into_inner();
    let key_pair = next_pair(&mut inner, Rule::object_entry)?;
    let key = match key_pair.as_rule() {
        Rule::ident => ObjectKey::Static(key_pair.as_str().to_string()),
        Rule::string => {
            let template = build_template(key_pair)?;
            match as_literal(&template) {
                Some(text) => ObjectKey::Static(text),
                None => ObjectKey::Template(template),
            }
        }
        _ => ObjectKey::Dynamic(build_expr(key_pair)?),
    };

    let value = match inner.next() {
        Some(value) => build_expr(value)?,
        // `{name}` is shorthand for `{name: .name}`
        None => match &key {
            ObjectKey::Static(name) => Expr::Field(Box::new(Expr::Identity), name.clone()),
            _ => return Err(ParseError::Missing(Rule::object_entry)),
        },
    };
    Ok((key, value))
}

/// Each `pipe` is a condition, a branch body or the `else` body depending on
/// the keyword in front of it
fn build_if(pair: Pair<'_, Rule>) -> Result<Expr> {
    let mut branches = Vec::new();
    let mut otherwise = None;
    let mut condition = None;
    let mut keyword = Rule::kw_if;

    for inner in pair.into_inner() {
        if inner.as_rule() != Rule::pipe {
            keyword = inner.as_rule();
            continue;
        }
        let expr = build_expr(inner)?;
        match keyword {
            Rule::kw_then => {
                let condition = condition.take().ok_or(ParseError::Missing(Rule::kw_if))?;
                branches.push((condition, expr));
            }
            Rule::kw_else => otherwise = Some(Box::new(expr)),
            _ => condition = Some(expr),
        }
    }

    Ok(Expr::If(branches, otherwise))
}

fn build_call(pair: Pair<'_, Rule>) -> Result<Expr> {
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, Rule::ident)?.as_str().to_string();
    let args = inner.map(build_expr).collect::<Result<Vec<_>>>()?;

    if args.is_empty() {
        match name.as_str() {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Literal(Value::Null)),
            _ => {}
        }
    }
    Ok(Expr::Call(name, args))
}
