//! # Query Evaluation
//!
//! Evaluates a parsed expression against a JSON context. Evaluation is
//! single-valued: every expression produces exactly one value.

use super::parser::{BinOp, Expr, Interp, ObjectKey};
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

type EvalResult = Result<Value, String>;

/// Turn integral floats back into integers so `1 + 1` renders as `2`
pub fn normalize_number(number: Number) -> Value {
    if number.is_f64() {
        if let Some(f) = number.as_f64() {
            if f.fract() == 0.0 && f.abs() < 9.0e15 {
                #[allow(clippy::cast_possible_truncation, reason = "range checked above")]
                let integral = f as i64;
                return Value::Number(Number::from(integral));
            }
        }
    }
    Value::Number(number)
}

fn number_value(f: f64) -> EvalResult {
    Number::from_f64(f)
        .map(normalize_number)
        .ok_or_else(|| format!("arithmetic produced a non-finite number ({f})"))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// jq truthiness: only `false` and `null` are false
pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Text form used by `tostring` and string interpolation
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Total ordering of JSON values: null < false < true < numbers < strings < arrays < objects
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = compare_values(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let mut x_keys: Vec<&String> = x.keys().collect();
            let mut y_keys: Vec<&String> = y.keys().collect();
            x_keys.sort();
            y_keys.sort();
            let ord = x_keys.cmp(&y_keys);
            if ord != Ordering::Equal {
                return ord;
            }
            for key in x_keys {
                let ord = compare_values(&x[key], &y[key]);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
        _ => Ordering::Equal,
    }
}

/// Structural equality with numeric normalization (`1 == 1.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

pub fn evaluate(expr: &Expr, input: &Value) -> EvalResult {
    match expr {
        Expr::Identity => Ok(input.clone()),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Field(target, name) => {
            let target = evaluate(target, input)?;
            index_field(&target, name)
        }
        Expr::Index(target, index) => {
            let target = evaluate(target, input)?;
            let index = evaluate(index, input)?;
            match &index {
                Value::String(name) => index_field(&target, name),
                Value::Number(n) => index_array(&target, n),
                Value::Null => Ok(Value::Null),
                other => Err(format!(
                    "cannot index {} with {}",
                    type_name(&target),
                    type_name(other)
                )),
            }
        }
        Expr::Template(parts) => {
            let mut rendered = String::new();
            for part in parts {
                match part {
                    Interp::Lit(text) => rendered.push_str(text),
                    Interp::Expr(inner) => rendered.push_str(&to_text(&evaluate(inner, input)?)),
                }
            }
            Ok(Value::String(rendered))
        }
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, input))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Object(entries) => {
            let mut object = Map::new();
            for (key, value) in entries {
                let key = match key {
                    ObjectKey::Static(name) => name.clone(),
                    ObjectKey::Template(parts) => {
                        to_text(&evaluate(&Expr::Template(parts.clone()), input)?)
                    }
                    ObjectKey::Dynamic(key_expr) => match evaluate(key_expr, input)? {
                        Value::String(name) => name,
                        other => {
                            return Err(format!(
                                "object keys must be strings, got {}",
                                type_name(&other)
                            ))
                        }
                    },
                };
                object.insert(key, evaluate(value, input)?);
            }
            Ok(Value::Object(object))
        }
        Expr::Pipe(lhs, rhs) => {
            let intermediate = evaluate(lhs, input)?;
            evaluate(rhs, &intermediate)
        }
        Expr::Alt(lhs, rhs) => match evaluate(lhs, input) {
            Ok(value) if is_truthy(&value) => Ok(value),
            _ => evaluate(rhs, input),
        },
        Expr::And(lhs, rhs) => {
            if !is_truthy(&evaluate(lhs, input)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(is_truthy(&evaluate(rhs, input)?)))
        }
        Expr::Or(lhs, rhs) => {
            if is_truthy(&evaluate(lhs, input)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(is_truthy(&evaluate(rhs, input)?)))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = evaluate(lhs, input)?;
            let rhs = evaluate(rhs, input)?;
            binary(*op, lhs, rhs)
        }
        Expr::Neg(operand) => match evaluate(operand, input)? {
            Value::Number(n) => number_value(-n.as_f64().unwrap_or(0.0)),
            other => Err(format!("{} cannot be negated", type_name(&other))),
        },
        Expr::If(branches, otherwise) => {
            for (condition, body) in branches {
                if is_truthy(&evaluate(condition, input)?) {
                    return evaluate(body, input);
                }
            }
            match otherwise {
                Some(body) => evaluate(body, input),
                None => Ok(input.clone()),
            }
        }
        Expr::Call(name, args) => call(name, args, input),
    }
}

fn index_field(target: &Value, name: &str) -> EvalResult {
    // Field access is optional everywhere: non-objects have no fields
    match target {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

fn index_array(target: &Value, index: &Number) -> EvalResult {
    match target {
        Value::Array(items) => {
            #[allow(clippy::cast_possible_truncation, reason = "jq truncates fractional indices")]
            let raw = index.as_f64().unwrap_or(0.0).floor() as i64;
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let position = if raw < 0 { len + raw } else { raw };
            if position < 0 {
                return Ok(Value::Null);
            }
            Ok(usize::try_from(position)
                .ok()
                .and_then(|p| items.get(p))
                .cloned()
                .unwrap_or(Value::Null))
        }
        _ => Ok(Value::Null),
    }
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> EvalResult {
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinOp::Lt => Ok(Value::Bool(compare_values(&lhs, &rhs) == Ordering::Less)),
        BinOp::Le => Ok(Value::Bool(compare_values(&lhs, &rhs) != Ordering::Greater)),
        BinOp::Gt => Ok(Value::Bool(compare_values(&lhs, &rhs) == Ordering::Greater)),
        BinOp::Ge => Ok(Value::Bool(compare_values(&lhs, &rhs) != Ordering::Less)),
        BinOp::Add => add(lhs, rhs),
        BinOp::Sub => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => {
                number_value(a.as_f64().unwrap_or(0.0) - b.as_f64().unwrap_or(0.0))
            }
            (Value::Array(a), Value::Array(b)) => Ok(Value::Array(
                a.into_iter()
                    .filter(|item| !b.iter().any(|other| values_equal(item, other)))
                    .collect(),
            )),
            (a, b) => Err(format!(
                "{} and {} cannot be subtracted",
                type_name(&a),
                type_name(&b)
            )),
        },
        BinOp::Mul => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => {
                number_value(a.as_f64().unwrap_or(0.0) * b.as_f64().unwrap_or(0.0))
            }
            (a, b) => Err(format!(
                "{} and {} cannot be multiplied",
                type_name(&a),
                type_name(&b)
            )),
        },
        BinOp::Div => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => {
                let divisor = b.as_f64().unwrap_or(0.0);
                if divisor == 0.0 {
                    return Err("division by zero".to_string());
                }
                number_value(a.as_f64().unwrap_or(0.0) / divisor)
            }
            (Value::String(a), Value::String(b)) => Ok(split_string(&a, &b)),
            (a, b) => Err(format!(
                "{} and {} cannot be divided",
                type_name(&a),
                type_name(&b)
            )),
        },
        BinOp::Rem => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => {
                #[allow(clippy::cast_possible_truncation, reason = "jq truncates modulo operands")]
                let (a, b) = (
                    a.as_f64().unwrap_or(0.0) as i64,
                    b.as_f64().unwrap_or(0.0) as i64,
                );
                if b == 0 {
                    return Err("modulo by zero".to_string());
                }
                a.checked_rem(b)
                    .map(|r| Value::Number(Number::from(r)))
                    .ok_or_else(|| format!("{a} % {b} overflows"))
            }
            (a, b) => Err(format!(
                "{} and {} cannot be divided",
                type_name(&a),
                type_name(&b)
            )),
        },
    }
}

fn add(lhs: Value, rhs: Value) -> EvalResult {
    match (lhs, rhs) {
        (Value::Null, other) | (other, Value::Null) => Ok(other),
        (Value::Number(a), Value::Number(b)) => {
            number_value(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0))
        }
        (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (Value::Object(mut a), Value::Object(b)) => {
            a.extend(b);
            Ok(Value::Object(a))
        }
        (a, b) => Err(format!(
            "{} and {} cannot be added",
            type_name(&a),
            type_name(&b)
        )),
    }
}

fn split_string(text: &str, separator: &str) -> Value {
    if text.is_empty() {
        return Value::Array(Vec::new());
    }
    Value::Array(
        text.split(separator)
            .map(|part| Value::String(part.to_string()))
            .collect(),
    )
}

/// jq `contains`: substring for strings, recursive for arrays and objects
pub fn json_contains(container: &Value, containee: &Value) -> bool {
    match (container, containee) {
        (Value::String(a), Value::String(b)) => a.contains(b.as_str()),
        (Value::Array(a), Value::Array(b)) => b
            .iter()
            .all(|needle| a.iter().any(|item| json_contains(item, needle))),
        (Value::Object(a), Value::Object(b)) => b.iter().all(|(key, needle)| {
            a.get(key)
                .is_some_and(|item| json_contains(item, needle))
        }),
        (a, b) => values_equal(a, b),
    }
}

fn expect_args(name: &str, args: &[Expr], count: usize) -> Result<(), String> {
    if args.len() == count {
        Ok(())
    } else {
        Err(format!(
            "{name}/{} is not defined (expected {count} argument(s))",
            args.len()
        ))
    }
}

fn string_arg(name: &str, args: &[Expr], input: &Value) -> Result<String, String> {
    match evaluate(&args[0], input)? {
        Value::String(s) => Ok(s),
        other => Err(format!(
            "{name} expects a string argument, got {}",
            type_name(&other)
        )),
    }
}

fn expect_string<'a>(name: &str, input: &'a Value) -> Result<&'a str, String> {
    match input {
        Value::String(s) => Ok(s),
        other => Err(format!(
            "{name} cannot be applied to {}",
            type_name(other)
        )),
    }
}

fn call(name: &str, args: &[Expr], input: &Value) -> EvalResult {
    match name {
        "not" => {
            expect_args(name, args, 0)?;
            Ok(Value::Bool(!is_truthy(input)))
        }
        "length" => {
            expect_args(name, args, 0)?;
            match input {
                Value::Null => Ok(Value::Number(0.into())),
                Value::Bool(_) => Err("boolean has no length".to_string()),
                Value::Number(n) => number_value(n.as_f64().unwrap_or(0.0).abs()),
                Value::String(s) => Ok(Value::Number(s.chars().count().into())),
                Value::Array(items) => Ok(Value::Number(items.len().into())),
                Value::Object(map) => Ok(Value::Number(map.len().into())),
            }
        }
        "keys" => {
            expect_args(name, args, 0)?;
            match input {
                Value::Object(map) => {
                    let mut keys: Vec<&String> = map.keys().collect();
                    keys.sort();
                    Ok(Value::Array(
                        keys.into_iter().map(|k| Value::String(k.clone())).collect(),
                    ))
                }
                Value::Array(items) => {
                    Ok(Value::Array((0..items.len()).map(|i| Value::Number(i.into())).collect()))
                }
                other => Err(format!("{} has no keys", type_name(other))),
            }
        }
        "has" => {
            expect_args(name, args, 1)?;
            let key = evaluate(&args[0], input)?;
            match (input, &key) {
                (Value::Object(map), Value::String(k)) => Ok(Value::Bool(map.contains_key(k))),
                (Value::Array(items), Value::Number(n)) => {
                    let index = n.as_f64().unwrap_or(-1.0);
                    #[allow(clippy::cast_precision_loss, reason = "array lengths are small")]
                    let len = items.len() as f64;
                    Ok(Value::Bool(index >= 0.0 && index < len))
                }
                (target, key) => Err(format!(
                    "cannot check whether {} has a {} key",
                    type_name(target),
                    type_name(key)
                )),
            }
        }
        "tostring" => {
            expect_args(name, args, 0)?;
            Ok(Value::String(to_text(input)))
        }
        "tonumber" => {
            expect_args(name, args, 0)?;
            match input {
                Value::Number(_) => Ok(input.clone()),
                Value::String(s) => {
                    let parsed: f64 = s
                        .trim()
                        .parse()
                        .map_err(|e| format!("cannot parse '{s}' as number: {e}"))?;
                    number_value(parsed)
                }
                other => Err(format!("{} cannot be parsed as a number", type_name(other))),
            }
        }
        "tojson" => {
            expect_args(name, args, 0)?;
            Ok(Value::String(input.to_string()))
        }
        "fromjson" => {
            expect_args(name, args, 0)?;
            let text = expect_string(name, input)?;
            serde_json::from_str(text).map_err(|e| format!("{text} cannot be parsed as JSON: {e}"))
        }
        "ascii_downcase" => {
            expect_args(name, args, 0)?;
            Ok(Value::String(expect_string(name, input)?.to_ascii_lowercase()))
        }
        "ascii_upcase" => {
            expect_args(name, args, 0)?;
            Ok(Value::String(expect_string(name, input)?.to_ascii_uppercase()))
        }
        "contains" => {
            expect_args(name, args, 1)?;
            let needle = evaluate(&args[0], input)?;
            if type_rank(input) != type_rank(&needle)
                && !(input.is_boolean() && needle.is_boolean())
            {
                return Err(format!(
                    "{} and {} cannot have their containment checked",
                    type_name(input),
                    type_name(&needle)
                ));
            }
            Ok(Value::Bool(json_contains(input, &needle)))
        }
        "startswith" => {
            expect_args(name, args, 1)?;
            let prefix = string_arg(name, args, input)?;
            Ok(Value::Bool(expect_string(name, input)?.starts_with(&prefix)))
        }
        "endswith" => {
            expect_args(name, args, 1)?;
            let suffix = string_arg(name, args, input)?;
            Ok(Value::Bool(expect_string(name, input)?.ends_with(&suffix)))
        }
        "test" => {
            expect_args(name, args, 1)?;
            let pattern = string_arg(name, args, input)?;
            let regex =
                Regex::new(&pattern).map_err(|e| format!("invalid regex '{pattern}': {e}"))?;
            Ok(Value::Bool(regex.is_match(expect_string(name, input)?)))
        }
        "split" => {
            expect_args(name, args, 1)?;
            let separator = string_arg(name, args, input)?;
            Ok(split_string(expect_string(name, input)?, &separator))
        }
        "join" => {
            expect_args(name, args, 1)?;
            let separator = string_arg(name, args, input)?;
            match input {
                Value::Array(items) => {
                    let parts = items
                        .iter()
                        .map(|item| match item {
                            Value::Null => Ok(String::new()),
                            Value::String(s) => Ok(s.clone()),
                            Value::Number(_) | Value::Bool(_) => Ok(item.to_string()),
                            other => Err(format!("cannot join {}", type_name(other))),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::String(parts.join(&separator)))
                }
                other => Err(format!("cannot join {}", type_name(other))),
            }
        }
        "map" => {
            expect_args(name, args, 1)?;
            match input {
                Value::Array(items) => items
                    .iter()
                    .map(|item| evaluate(&args[0], item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                other => Err(format!("cannot map over {}", type_name(other))),
            }
        }
        "select" => {
            expect_args(name, args, 1)?;
            if is_truthy(&evaluate(&args[0], input)?) {
                Ok(input.clone())
            } else {
                Ok(Value::Null)
            }
        }
        "first" | "last" => {
            expect_args(name, args, 0)?;
            match input {
                Value::Array(items) => {
                    let item = if name == "first" {
                        items.first()
                    } else {
                        items.last()
                    };
                    Ok(item.cloned().unwrap_or(Value::Null))
                }
                Value::Null => Ok(Value::Null),
                other => Err(format!("cannot index {} with number", type_name(other))),
            }
        }
        "type" => {
            expect_args(name, args, 0)?;
            Ok(Value::String(type_name(input).to_string()))
        }
        _ => Err(format!("{name}/{} is not defined", args.len())),
    }
}
