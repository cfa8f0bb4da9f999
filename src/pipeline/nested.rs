//! Nested Field Resolution
//!
//! A filter may reference a calendar part of a stored date as `field.unit`
//! (`orderDate.month`, `orderDate.dayOfWeek`). The store cannot match on such a
//! path directly, so the part is computed into a temp field `___field_unit`
//! ahead of the `$match`, and excluded again afterwards.

use crate::pipeline::expr::{timezone_adjusted, DateUnit};
use crate::pipeline::stage::{Document, Stage};
use serde_json::json;

/// A `base.unit` reference to a calendar part of a date field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestedField<'a> {
    pub base: &'a str,
    /// Unit as written by the client; part of the computed field name
    pub unit_name: &'a str,
    pub unit: DateUnit,
}

impl<'a> NestedField<'a> {
    /// Recognize `base.unit` with unit one of year/quarter/month/day/dayOfWeek
    pub fn parse(name: &'a str) -> Option<Self> {
        let (base, unit_name) = name.split_once('.')?;
        if base.is_empty() || unit_name.contains('.') {
            return None;
        }

        let unit = DateUnit::from_str(unit_name).filter(DateUnit::is_nested_field_unit)?;
        Some(Self {
            base,
            unit_name,
            unit,
        })
    }

    /// Name of the computed field holding the unit value
    pub fn computed_name(&self) -> String {
        format!("___{}_{}", self.base, self.unit_name)
    }

    /// Name of the `month + 2` temp field used for quarters
    pub fn quarter_temp_name(&self) -> String {
        format!("___{}_mp2", self.base)
    }
}

/// Name to match on for a filter field: the computed name for nested fields,
/// the field itself otherwise
pub fn match_field_name(field: &str) -> String {
    NestedField::parse(field)
        .map(|nf| nf.computed_name())
        .unwrap_or_else(|| field.to_string())
}

/// Stages computing nested fields, plus every field name they introduce
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedFieldPipeline {
    pub stages: Vec<Stage>,
    pub fields: Vec<String>,
}

impl NestedFieldPipeline {
    fn track(&mut self, name: String) {
        if !self.fields.contains(&name) {
            self.fields.push(name);
        }
    }
}

/// Build the `$addFields` stages for every nested reference in `fields`.
///
/// Quarters take two stages: the second reads the temp field written by the
/// first. Empty stages are not emitted.
pub fn resolve_nested_fields(fields: &[String], timezone_offset: i32) -> NestedFieldPipeline {
    let mut result = NestedFieldPipeline::default();
    let mut first = Document::new();
    let mut second = Document::new();

    for name in fields {
        let Some(nested) = NestedField::parse(name) else {
            if name.contains('.') {
                tracing::debug!(field = %name, "Dotted field is not a nested date reference");
            }
            continue;
        };

        let adjusted = timezone_adjusted(nested.base, timezone_offset);
        let computed = nested.computed_name();

        match nested.unit.extract(adjusted.clone()) {
            Some(expr) => {
                first.insert(computed.clone(), expr);
            }
            None => {
                let temp = nested.quarter_temp_name();
                first.insert(temp.clone(), DateUnit::month_plus_two(adjusted));
                second.insert(computed.clone(), DateUnit::quarter_from(&temp));
                result.track(temp);
            }
        }
        result.track(computed);
    }

    for stage in [first, second] {
        if !stage.is_empty() {
            result.stages.push(Stage::AddFields(stage));
        }
    }

    result
}

/// A trailing projection excluding temp fields, empty when nothing is tracked
pub fn removal_stages(fields: &[String]) -> Vec<Stage> {
    if fields.is_empty() {
        return Vec::new();
    }

    let exclusion = fields
        .iter()
        .map(|name| (name.clone(), json!(0)))
        .collect::<Document>();
    vec![Stage::Project(exclusion)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_nested_field() {
        let nf = NestedField::parse("orderDate.Month").unwrap();
        assert_eq!(nf.base, "orderDate");
        assert_eq!(nf.unit, DateUnit::Month);
        assert_eq!(nf.computed_name(), "___orderDate_Month");

        assert!(NestedField::parse("address.city").is_none());
        assert!(NestedField::parse("a.b.year").is_none());
        assert!(NestedField::parse("date.hour").is_none());
        assert!(NestedField::parse("plain").is_none());
    }

    #[test]
    fn test_single_stage_units() {
        let pipeline = resolve_nested_fields(&names(&["d.year", "d.dayOfWeek", "x"]), 0);

        assert_eq!(pipeline.stages.len(), 1);
        assert_eq!(pipeline.fields, names(&["___d_year", "___d_dayOfWeek"]));
        assert_eq!(
            pipeline.stages[0].to_value(),
            serde_json::json!({"$addFields": {
                "___d_year": {"$year": {"$subtract": ["$d", 0]}},
                "___d_dayOfWeek": {"$subtract": [{"$dayOfWeek": {"$subtract": ["$d", 0]}}, 1]}
            }})
        );
    }

    #[test]
    fn test_quarter_needs_two_stages() {
        let pipeline = resolve_nested_fields(&names(&["d.quarter"]), 60);

        assert_eq!(pipeline.stages.len(), 2);
        assert_eq!(pipeline.fields, names(&["___d_mp2", "___d_quarter"]));

        let Stage::AddFields(second) = &pipeline.stages[1] else {
            panic!("expected $addFields");
        };
        let quarter: &Value = &second["___d_quarter"];
        assert_eq!(quarter["$divide"][1], serde_json::json!(3));
    }

    #[test]
    fn test_duplicate_references_tracked_once() {
        let pipeline = resolve_nested_fields(&names(&["d.month", "d.month"]), 0);
        assert_eq!(pipeline.fields, names(&["___d_month"]));
    }

    #[test]
    fn test_removal_only_when_tracked() {
        assert!(removal_stages(&[]).is_empty());
        assert_eq!(
            removal_stages(&names(&["___d_month"]))[0].to_value(),
            serde_json::json!({"$project": {"___d_month": 0}})
        );
    }
}
