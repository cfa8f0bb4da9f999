//! Expression and Predicate Evaluation
//!
//! Evaluates the aggregation expressions and `$match` predicates produced by the
//! pipeline compiler against a single JSON document.

use crate::pipeline::Document;
use crate::store::error::{StoreError, StoreResult};
use crate::store::value::{
    as_number, compare, date_time, date_value, get_path, is_native, same_bracket, values_equal,
};
use chrono::{Datelike, Timelike};
use regex::RegexBuilder;
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Evaluate an aggregation expression against a document
pub fn evaluate(expr: &Value, doc: &Value) -> StoreResult<Value> {
    match expr {
        Value::String(s) if s == "$$CURRENT" || s == "$$ROOT" => Ok(doc.clone()),
        Value::String(s) if s.starts_with('$') => {
            Ok(get_path(doc, &s[1..]).cloned().unwrap_or(Value::Null))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| evaluate(item, doc))
            .collect::<StoreResult<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) if is_native(expr) => Ok(Value::Object(map.clone())),
        Value::Object(map) => match operator_of(map) {
            Some((op, args)) => evaluate_operator(op, args, doc),
            None => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), evaluate(v, doc)?)))
                .collect::<StoreResult<Document>>()
                .map(Value::Object),
        },
        literal => Ok(literal.clone()),
    }
}

fn operator_of(map: &Document) -> Option<(&str, &Value)> {
    if map.len() != 1 {
        return None;
    }
    map.iter()
        .next()
        .filter(|(k, _)| k.starts_with('$'))
        .map(|(k, v)| (k.as_str(), v))
}

fn evaluate_args(args: &Value, doc: &Value) -> StoreResult<Vec<Value>> {
    match args {
        Value::Array(items) => items.iter().map(|item| evaluate(item, doc)).collect(),
        single => Ok(vec![evaluate(single, doc)?]),
    }
}

fn two_args(op: &str, args: &Value, doc: &Value) -> StoreResult<(Value, Value)> {
    let mut values = evaluate_args(args, doc)?;
    if values.len() != 2 {
        return Err(StoreError::InvalidExpression(format!(
            "{} expects 2 arguments, got {}",
            op,
            values.len()
        )));
    }
    let b = values.pop().unwrap_or(Value::Null);
    let a = values.pop().unwrap_or(Value::Null);
    Ok((a, b))
}

/// Integers stay integers, everything else becomes a double
fn number(int: Option<i64>, float: f64) -> Value {
    match int {
        Some(i) => Value::from(i),
        None => Number::from_f64(float).map(Value::Number).unwrap_or(Value::Null),
    }
}

fn arithmetic(op: &str, a: &Value, b: &Value) -> StoreResult<Value> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }

    let a_date = crate::store::value::date_millis(a);
    let b_date = crate::store::value::date_millis(b);
    match (op, a_date, b_date) {
        ("$subtract", Some(x), Some(y)) => return Ok(Value::from(x - y)),
        ("$subtract", Some(x), None) | ("$add", Some(x), None) => {
            let delta = b.as_f64().ok_or_else(|| type_error(op, b))? as i64;
            let millis = if op == "$add" { x + delta } else { x - delta };
            return Ok(date_value(millis));
        }
        ("$add", None, Some(y)) => {
            let delta = a.as_f64().ok_or_else(|| type_error(op, a))? as i64;
            return Ok(date_value(y + delta));
        }
        _ => {}
    }

    let x = as_number(a).ok_or_else(|| type_error(op, a))?;
    let y = as_number(b).ok_or_else(|| type_error(op, b))?;
    let ints = a.as_i64().zip(b.as_i64());

    Ok(match op {
        "$add" => number(ints.and_then(|(i, j)| i.checked_add(j)), x + y),
        "$subtract" => number(ints.and_then(|(i, j)| i.checked_sub(j)), x - y),
        "$mod" => {
            if y == 0.0 {
                return Err(StoreError::InvalidExpression("$mod by zero".to_string()));
            }
            number(ints.and_then(|(i, j)| i.checked_rem(j)), x % y)
        }
        "$divide" => {
            if y == 0.0 {
                return Err(StoreError::InvalidExpression("$divide by zero".to_string()));
            }
            number(None, x / y)
        }
        other => return Err(StoreError::UnsupportedOperator(other.to_string())),
    })
}

fn type_error(op: &str, value: &Value) -> StoreError {
    StoreError::InvalidExpression(format!("{} cannot take {}", op, value))
}

fn date_part(op: &str, value: &Value) -> StoreResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let dt = date_time(value).ok_or_else(|| type_error(op, value))?;

    let part = match op {
        "$year" => i64::from(dt.year()),
        "$month" => i64::from(dt.month()),
        "$dayOfMonth" => i64::from(dt.day()),
        // Sunday = 1 .. Saturday = 7
        "$dayOfWeek" => i64::from(dt.weekday().num_days_from_sunday()) + 1,
        "$hour" => i64::from(dt.hour()),
        "$minute" => i64::from(dt.minute()),
        "$second" => i64::from(dt.second()),
        other => return Err(StoreError::UnsupportedOperator(other.to_string())),
    };
    Ok(Value::from(part))
}

fn evaluate_operator(op: &str, args: &Value, doc: &Value) -> StoreResult<Value> {
    match op {
        "$literal" => Ok(args.clone()),
        "$add" | "$subtract" | "$mod" | "$divide" => {
            let (a, b) = two_args(op, args, doc)?;
            arithmetic(op, &a, &b)
        }
        "$year" | "$month" | "$dayOfMonth" | "$dayOfWeek" | "$hour" | "$minute" | "$second" => {
            let value = evaluate(args, doc)?;
            date_part(op, &value)
        }
        other => Err(StoreError::UnsupportedOperator(other.to_string())),
    }
}

/// Whether a document satisfies a `$match` predicate
pub fn matches(predicate: &Document, doc: &Value) -> StoreResult<bool> {
    for (key, condition) in predicate {
        let satisfied = match key.as_str() {
            "$and" => all_of(condition, doc)?,
            "$or" => any_of(condition, doc)?,
            "$nor" => !any_of(condition, doc)?,
            op if op.starts_with('$') => {
                return Err(StoreError::UnsupportedOperator(op.to_string()))
            }
            field => field_matches(get_path(doc, field), condition)?,
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_predicates(condition: &Value) -> StoreResult<Vec<&Document>> {
    condition
        .as_array()
        .ok_or_else(|| StoreError::InvalidExpression("logical operator needs an array".into()))?
        .iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| StoreError::InvalidExpression(format!("bad predicate {}", item)))
        })
        .collect()
}

fn all_of(condition: &Value, doc: &Value) -> StoreResult<bool> {
    for predicate in sub_predicates(condition)? {
        if !matches(predicate, doc)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_of(condition: &Value, doc: &Value) -> StoreResult<bool> {
    for predicate in sub_predicates(condition)? {
        if matches(predicate, doc)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_operator_object(condition: &Value) -> bool {
    match condition {
        Value::Object(map) => {
            !map.is_empty() && !is_native(condition) && map.keys().all(|k| k.starts_with('$'))
        }
        _ => false,
    }
}

fn field_matches(actual: Option<&Value>, condition: &Value) -> StoreResult<bool> {
    let null = Value::Null;
    let value = actual.unwrap_or(&null);

    let Some(operators) = condition.as_object().filter(|_| is_operator_object(condition)) else {
        return Ok(values_equal(value, condition));
    };

    for (op, operand) in operators {
        let satisfied = match op.as_str() {
            "$eq" => values_equal(value, operand),
            "$ne" => !values_equal(value, operand),
            "$gt" | "$gte" | "$lt" | "$lte" => {
                actual.is_some() && same_bracket(value, operand) && ordered(op, compare(value, operand))
            }
            "$regex" => {
                let options = operators.get("$options").and_then(Value::as_str).unwrap_or("");
                regex_matches(value, operand, options)?
            }
            "$options" => true,
            other => return Err(StoreError::UnsupportedOperator(other.to_string())),
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn ordered(op: &str, ordering: Ordering) -> bool {
    match op {
        "$gt" => ordering == Ordering::Greater,
        "$gte" => ordering != Ordering::Less,
        "$lt" => ordering == Ordering::Less,
        _ => ordering != Ordering::Greater,
    }
}

const NOT_CONTAINS_PREFIX: &str = "^((?!";
const NOT_CONTAINS_SUFFIX: &str = ").)*$";

fn regex_matches(value: &Value, pattern: &Value, options: &str) -> StoreResult<bool> {
    let Some(text) = value.as_str() else {
        return Ok(false);
    };
    let pattern = pattern
        .as_str()
        .ok_or_else(|| StoreError::InvalidExpression("$regex needs a string".into()))?;
    let case_insensitive = options.contains('i');

    // The regex crate has no lookaround; the "does not contain" shape is
    // evaluated as the negation of its inner pattern.
    if let Some(inner) = pattern
        .strip_prefix(NOT_CONTAINS_PREFIX)
        .and_then(|rest| rest.strip_suffix(NOT_CONTAINS_SUFFIX))
    {
        let re = RegexBuilder::new(inner)
            .case_insensitive(case_insensitive)
            .build()?;
        return Ok(!re.is_match(text));
    }

    let re = RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()?;
    Ok(re.is_match(text))
}
