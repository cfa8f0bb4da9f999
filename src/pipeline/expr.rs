//! Aggregation Expression Helpers
//!
//! Small builders for the expression fragments shared by the nested-field
//! resolver and the group key builder. The store has no integer division, so
//! `floor(a / b)` is spelled with the subtract-mod identity `(a - a mod b) / b`.

use serde_json::{json, Value};

/// Milliseconds per minute, used for timezone correction
const MS_PER_MINUTE: i64 = 60 * 1000;

/// Reference a document field: `"$name"`
pub fn field_ref(name: &str) -> Value {
    Value::String(format!("${}", name))
}

/// `a - (a mod b)`
pub fn subtract_mod(a: Value, b: Value) -> Value {
    json!({ "$subtract": [a.clone(), { "$mod": [a, b] }] })
}

/// `floor(a / b)` for non-negative operands
pub fn divide_int(a: Value, b: Value) -> Value {
    json!({ "$divide": [subtract_mod(a, b.clone()), b] })
}

/// The stored instant shifted into local time.
///
/// `timezone_offset` follows the usual `UTC - local` minutes convention, so a
/// client at UTC+1 sends `-60` and the instant is moved forward one hour.
pub fn timezone_adjusted(field: &str, timezone_offset: i32) -> Value {
    json!({ "$subtract": [field_ref(field), i64::from(timezone_offset) * MS_PER_MINUTE] })
}

/// Calendar units that can be extracted from a stored date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Year,
    Quarter,
    Month,
    Day,
    DayOfWeek,
    Hour,
    Minute,
    Second,
}

impl DateUnit {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "year" => Some(Self::Year),
            "quarter" => Some(Self::Quarter),
            "month" => Some(Self::Month),
            "day" => Some(Self::Day),
            "dayofweek" => Some(Self::DayOfWeek),
            "hour" => Some(Self::Hour),
            "minute" => Some(Self::Minute),
            "second" => Some(Self::Second),
            _ => None,
        }
    }

    /// Whether `field.unit` filter references may use this unit
    pub fn is_nested_field_unit(&self) -> bool {
        matches!(
            self,
            Self::Year | Self::Quarter | Self::Month | Self::Day | Self::DayOfWeek
        )
    }

    /// Extraction expression for every unit except `Quarter`, which needs two stages.
    ///
    /// `dayOfWeek` is shifted from the store's 1-7 (Sunday = 1) to 0-6.
    pub fn extract(&self, adjusted: Value) -> Option<Value> {
        let expr = match self {
            Self::Year => json!({ "$year": adjusted }),
            Self::Month => json!({ "$month": adjusted }),
            Self::Day => json!({ "$dayOfMonth": adjusted }),
            Self::DayOfWeek => json!({ "$subtract": [{ "$dayOfWeek": adjusted }, 1] }),
            Self::Hour => json!({ "$hour": adjusted }),
            Self::Minute => json!({ "$minute": adjusted }),
            Self::Second => json!({ "$second": adjusted }),
            Self::Quarter => return None,
        };
        Some(expr)
    }

    /// First phase of the quarter computation: `month + 2`
    pub fn month_plus_two(adjusted: Value) -> Value {
        json!({ "$add": [{ "$month": adjusted }, 2] })
    }

    /// Second phase of the quarter computation, reading the `month + 2` temp field
    pub fn quarter_from(temp_field: &str) -> Value {
        divide_int(field_ref(temp_field), json!(3))
    }
}

impl std::fmt::Display for DateUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Year => write!(f, "year"),
            Self::Quarter => write!(f, "quarter"),
            Self::Month => write!(f, "month"),
            Self::Day => write!(f, "day"),
            Self::DayOfWeek => write!(f, "dayOfWeek"),
            Self::Hour => write!(f, "hour"),
            Self::Minute => write!(f, "minute"),
            Self::Second => write!(f, "second"),
        }
    }
}
