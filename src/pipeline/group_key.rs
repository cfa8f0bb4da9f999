//! Group Key Builder
//!
//! Every group level gets its key computed into `___group_key_{level}` before the
//! `$group` stage. The key is the raw selector value, a numeric bucket, or a
//! timezone-corrected calendar part of a date.

use crate::pipeline::expr::{divide_int, field_ref, timezone_adjusted, DateUnit};
use crate::pipeline::stage::{Document, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Grouping interval of a level: a bucket width or a calendar unit name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupInterval {
    Width(i64),
    Named(String),
}

/// How a level's key is derived, after interpreting the interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Raw,
    Bucket(i64),
    Unit(DateUnit),
}

impl GroupInterval {
    fn kind(&self) -> KeyKind {
        let width = match self {
            Self::Width(width) => Some(*width),
            Self::Named(name) => name.trim().parse::<i64>().ok(),
        };

        match (width, self) {
            (Some(width), _) if width > 0 => KeyKind::Bucket(width),
            (Some(width), _) => {
                tracing::warn!(width, "Non-positive group interval, grouping by raw value");
                KeyKind::Raw
            }
            (None, Self::Named(name)) => match DateUnit::from_str(name) {
                Some(unit) => KeyKind::Unit(unit),
                None => {
                    tracing::warn!(interval = %name, "Unknown group interval, grouping by raw value");
                    KeyKind::Raw
                }
            },
            (None, Self::Width(_)) => KeyKind::Raw,
        }
    }
}

/// Name of the computed key field for a level
pub fn group_key_field(level: usize) -> String {
    format!("___group_key_{}", level)
}

/// Stages computing one level's key, tagged with the level they belong to
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKeyPipeline {
    pub level: usize,
    pub stages: Vec<Stage>,
    /// Fields introduced by `stages`, the key field included
    pub temp_fields: Vec<String>,
}

impl GroupKeyPipeline {
    /// Name of the field holding this level's key
    pub fn key_field(&self) -> String {
        group_key_field(self.level)
    }

    /// `{"$match": {"___group_key_N": key}}`
    pub fn key_match(&self, key: &Value) -> Stage {
        Stage::Match(Stage::single(self.key_field(), key.clone()))
    }
}

/// Build the key stages for one level
pub fn build_group_key(
    selector: &str,
    interval: Option<&GroupInterval>,
    level: usize,
    timezone_offset: i32,
) -> GroupKeyPipeline {
    let key_field = group_key_field(level);
    let kind = interval.map(GroupInterval::kind).unwrap_or(KeyKind::Raw);
    let single = |expr: Value| vec![Stage::AddFields(Stage::single(key_field.clone(), expr))];

    let (stages, temp_fields) = match kind {
        KeyKind::Raw => (single(field_ref(selector)), vec![key_field.clone()]),
        KeyKind::Bucket(width) => (
            single(divide_int(field_ref(selector), json!(width))),
            vec![key_field.clone()],
        ),
        KeyKind::Unit(unit) => {
            let adjusted = timezone_adjusted(selector, timezone_offset);
            match unit.extract(adjusted.clone()) {
                Some(expr) => (single(expr), vec![key_field.clone()]),
                None => {
                    let temp = format!("{}_mp2", key_field);
                    let stages = vec![
                        Stage::AddFields(Stage::single(
                            temp.clone(),
                            DateUnit::month_plus_two(adjusted),
                        )),
                        Stage::AddFields(Stage::single(
                            key_field.clone(),
                            DateUnit::quarter_from(&temp),
                        )),
                    ];
                    (stages, vec![temp, key_field.clone()])
                }
            }
        }
    };

    GroupKeyPipeline {
        level,
        stages,
        temp_fields,
    }
}

/// The stored-document projection pushed into `items` for a selected field list
pub fn item_projection(select: &[String]) -> Option<Document> {
    if select.is_empty() {
        return None;
    }

    let mut projection = Document::new();
    projection.insert("_id".to_string(), field_ref("_id"));
    for field in select {
        projection.insert(field.clone(), field_ref(field));
    }
    Some(projection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_expr(pipeline: &GroupKeyPipeline) -> Value {
        match pipeline.stages.last() {
            Some(Stage::AddFields(doc)) => doc[&pipeline.key_field()].clone(),
            other => panic!("unexpected stage {:?}", other),
        }
    }

    #[test]
    fn test_raw_key() {
        let pipeline = build_group_key("int1", None, 0, 0);
        assert_eq!(pipeline.level, 0);
        assert_eq!(pipeline.stages.len(), 1);
        assert_eq!(
            pipeline.stages[0].to_value(),
            json!({"$addFields": {"___group_key_0": "$int1"}})
        );
        assert_eq!(pipeline.temp_fields, vec!["___group_key_0"]);
    }

    #[test]
    fn test_numeric_bucket() {
        let pipeline = build_group_key("price", Some(&GroupInterval::Width(10)), 1, 0);
        assert_eq!(
            key_expr(&pipeline),
            json!({"$divide": [{"$subtract": ["$price", {"$mod": ["$price", 10]}]}, 10]})
        );

        let from_string = build_group_key("price", Some(&GroupInterval::Named("10".into())), 1, 0);
        assert_eq!(from_string, pipeline);
    }

    #[test]
    fn test_calendar_units() {
        let month = build_group_key("date", Some(&GroupInterval::Named("month".into())), 0, 60);
        assert_eq!(
            key_expr(&month),
            json!({"$month": {"$subtract": ["$date", 3_600_000]}})
        );

        let dow = build_group_key("date", Some(&GroupInterval::Named("dayOfWeek".into())), 0, 0);
        assert_eq!(
            key_expr(&dow),
            json!({"$subtract": [{"$dayOfWeek": {"$subtract": ["$date", 0]}}, 1]})
        );
    }

    #[test]
    fn test_quarter_two_phase() {
        let pipeline = build_group_key("date", Some(&GroupInterval::Named("quarter".into())), 2, 0);
        assert_eq!(pipeline.stages.len(), 2);
        assert_eq!(
            pipeline.stages[0].to_value(),
            json!({"$addFields": {"___group_key_2_mp2": {"$add": [{"$month": {"$subtract": ["$date", 0]}}, 2]}}})
        );
        assert_eq!(
            key_expr(&pipeline),
            json!({"$divide": [
                {"$subtract": ["$___group_key_2_mp2", {"$mod": ["$___group_key_2_mp2", 3]}]},
                3
            ]})
        );
        assert_eq!(pipeline.temp_fields, vec!["___group_key_2_mp2", "___group_key_2"]);
    }

    #[test]
    fn test_unknown_interval_falls_back_to_raw() {
        let pipeline = build_group_key("date", Some(&GroupInterval::Named("fortnight".into())), 0, 0);
        assert_eq!(key_expr(&pipeline), json!("$date"));

        let zero = build_group_key("n", Some(&GroupInterval::Width(0)), 0, 0);
        assert_eq!(key_expr(&zero), json!("$n"));
    }

    #[test]
    fn test_interval_deserialize() {
        let width: GroupInterval = serde_json::from_value(json!(100)).unwrap();
        assert_eq!(width, GroupInterval::Width(100));
        let named: GroupInterval = serde_json::from_value(json!("year")).unwrap();
        assert_eq!(named, GroupInterval::Named("year".into()));
    }

    #[test]
    fn test_item_projection() {
        assert!(item_projection(&[]).is_none());
        let projection = item_projection(&["int1".to_string()]).unwrap();
        assert_eq!(Value::Object(projection), json!({"_id": "$_id", "int1": "$int1"}));
    }
}
