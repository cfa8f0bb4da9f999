//! Value Helpers
//!
//! Store-native values travel as extended-JSON wrappers: dates as
//! `{"$date": <epoch millis>}` and object ids as `{"$oid": "<hex>"}`.
//! Comparison follows the store's cross-type order.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;

/// Wrap epoch milliseconds as a store date
pub fn date_value(millis: i64) -> Value {
    json!({ "$date": millis })
}

/// Wrap a chrono timestamp as a store date
pub fn date_from(dt: DateTime<Utc>) -> Value {
    date_value(dt.timestamp_millis())
}

fn wrapped<'a>(value: &'a Value, tag: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(tag),
        _ => None,
    }
}

/// Epoch milliseconds of a store date (`{"$date": millis}` or `{"$date": "<rfc3339>"}`)
pub fn date_millis(value: &Value) -> Option<i64> {
    match wrapped(value, "$date")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

/// A store date as a UTC timestamp
pub fn date_time(value: &Value) -> Option<DateTime<Utc>> {
    match Utc.timestamp_millis_opt(date_millis(value)?) {
        chrono::LocalResult::Single(dt) => Some(dt),
        _ => None,
    }
}

/// Hex string of a store object id
pub fn oid_hex(value: &Value) -> Option<&str> {
    wrapped(value, "$oid")?.as_str()
}

/// Whether the value is a wrapped store-native value rather than an operator object
pub fn is_native(value: &Value) -> bool {
    date_millis(value).is_some() || oid_hex(value).is_some()
}

/// Numeric value, `None` for anything else
pub fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Look up a dotted path in a document
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

/// Set a dotted path, creating intermediate objects as needed
pub fn set_path(doc: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Remove a dotted path; missing paths are ignored
pub fn remove_path(doc: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = doc.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

/// Cross-type rank: null < numbers < strings < objects < arrays < ids < booleans < dates
fn type_rank(value: &Value) -> u8 {
    if oid_hex(value).is_some() {
        return 5;
    }
    if date_millis(value).is_some() {
        return 7;
    }
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 6,
    }
}

/// Whether two values are comparable with `$gt`/`$lt` (same type bracket)
pub fn same_bracket(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

/// Total order over values
pub fn compare(a: &Value, b: &Value) -> Ordering {
    let (rank_a, rank_b) = (type_rank(a), type_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }

    match rank_a {
        1 => {
            let (x, y) = (as_number(a).unwrap_or(0.0), as_number(b).unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        2 => a.as_str().cmp(&b.as_str()),
        5 => oid_hex(a).cmp(&oid_hex(b)),
        6 => a.as_bool().cmp(&b.as_bool()),
        7 => date_millis(a).cmp(&date_millis(b)),
        3 => {
            let (Some(x), Some(y)) = (a.as_object(), b.as_object()) else {
                return Ordering::Equal;
            };
            for ((ka, va), (kb, vb)) in x.iter().zip(y.iter()) {
                let ord = ka.cmp(kb).then_with(|| compare(va, vb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        4 => {
            let (Some(x), Some(y)) = (a.as_array(), b.as_array()) else {
                return Ordering::Equal;
            };
            for (va, vb) in x.iter().zip(y.iter()) {
                let ord = compare(va, vb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

/// Equality with numeric coercion (`1 == 1.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare(a, b) == Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dates() {
        let v = date_value(1_500_000_000_000);
        assert_eq!(date_millis(&v), Some(1_500_000_000_000));
        assert!(is_native(&v));

        let iso = json!({"$date": "2017-01-01T00:00:00Z"});
        assert_eq!(date_millis(&iso), Some(1_483_228_800_000));

        assert_eq!(date_millis(&json!({"$date": 1, "x": 2})), None);
    }

    #[test]
    fn test_compare_across_types() {
        assert_eq!(compare(&json!(1), &json!(1.0)), Ordering::Equal);
        assert_eq!(compare(&json!(null), &json!(0)), Ordering::Less);
        assert_eq!(compare(&json!(10), &json!("a")), Ordering::Less);
        assert_eq!(compare(&date_value(5), &date_value(3)), Ordering::Greater);
        assert!(values_equal(&json!({"$oid": "ab"}), &json!({"$oid": "ab"})));
        assert!(!same_bracket(&json!(1), &json!("1")));
    }

    #[test]
    fn test_paths() {
        let mut doc = json!({"a": {"b": 1}}).as_object().cloned().unwrap();
        assert_eq!(get_path(&Value::Object(doc.clone()), "a.b"), Some(&json!(1)));

        set_path(&mut doc, "a.c", json!(2));
        set_path(&mut doc, "x", json!(3));
        remove_path(&mut doc, "a.b");
        assert_eq!(Value::Object(doc), json!({"a": {"c": 2}, "x": 3}));
    }
}
