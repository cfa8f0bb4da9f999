//! Load Descriptor
//!
//! The typed form of one grid load request, as handed over by the request
//! parsing layer, plus the per-call context options.
//!
//! # Example Descriptor
//!
//! ```text
//! {
//!   "filter": [["int1", ">", 2], "and", ["date.year", "=", 2017]],
//!   "sort": [{"selector": "int2", "desc": true}],
//!   "group": [{"selector": "int1", "isExpanded": false}],
//!   "groupSummary": [{"summaryType": "sum", "selector": "int2"}],
//!   "requireGroupCount": true
//! }
//! ```

use crate::pipeline::{
    GroupInterval, SearchExpr, SearchSpec, SortSpec, Stage, SummarySpec,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One load request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadSpec {
    /// Filter in the array-shaped filter language
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    /// Search as a nested object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSpec>,
    /// Search in the flat `searchExpr`/`searchOperation`/`searchValue` form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_expr: Option<SearchExpr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_value: Option<Value>,
    pub sort: Vec<SortSpec>,
    pub group: Vec<GroupLevelSpec>,
    pub select: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take: Option<u64>,
    pub require_total_count: bool,
    pub require_group_count: bool,
    pub total_summary: Vec<SummarySpec>,
    pub group_summary: Vec<SummarySpec>,
}

impl LoadSpec {
    /// Start building a load request
    pub fn builder() -> LoadSpecBuilder {
        LoadSpecBuilder::default()
    }

    /// The effective search, from either the nested or the flat form
    pub fn effective_search(&self) -> Option<SearchSpec> {
        if let Some(search) = &self.search {
            return Some(search.clone());
        }
        Some(SearchSpec {
            expr: self.search_expr.clone()?,
            operation: self.search_operation.clone()?,
            value: self.search_value.clone().unwrap_or(Value::Null),
        })
    }

    /// Whether the grouped path applies
    pub fn is_grouped(&self) -> bool {
        !self.group.is_empty()
    }

    /// Whether the total count has to be computed
    pub fn needs_total_count(&self) -> bool {
        self.require_total_count || !self.total_summary.is_empty()
    }
}

/// One grouping level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLevelSpec {
    pub selector: String,
    #[serde(default)]
    pub desc: bool,
    /// Return the rows of the deepest level's groups
    #[serde(default)]
    pub is_expanded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_interval: Option<GroupInterval>,
}

impl GroupLevelSpec {
    /// Group by the raw value of a field
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            desc: false,
            is_expanded: false,
            group_interval: None,
        }
    }

    /// Sort groups by key descending
    pub fn descending(mut self) -> Self {
        self.desc = true;
        self
    }

    /// Fetch the rows of each group
    pub fn expanded(mut self) -> Self {
        self.is_expanded = true;
        self
    }

    /// Group into numeric buckets of the given width
    pub fn bucket(mut self, width: i64) -> Self {
        self.group_interval = Some(GroupInterval::Width(width));
        self
    }

    /// Group by a calendar unit (year, quarter, month, day, dayOfWeek, hour, ...)
    pub fn interval(mut self, unit: impl Into<String>) -> Self {
        self.group_interval = Some(GroupInterval::Named(unit.into()));
        self
    }
}

/// Per-call context options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextOptions {
    /// Replace native `_id` values by their hex strings in returned rows
    pub replace_ids: bool,
    /// Maximum number of summary sub-queries per call
    pub summary_query_limit: usize,
    /// Client timezone offset in minutes (`UTC - local`)
    pub timezone_offset: i32,
    /// Match string operators case-insensitively
    pub case_insensitive_regex: bool,
    /// Stages prepended to every pipeline sent to the store
    pub pre_processing_pipeline: Vec<Stage>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            replace_ids: true,
            summary_query_limit: 100,
            timezone_offset: 0,
            case_insensitive_regex: true,
            pre_processing_pipeline: Vec::new(),
        }
    }
}

/// Builder for constructing load requests programmatically
#[derive(Debug, Clone, Default)]
pub struct LoadSpecBuilder {
    spec: LoadSpec,
}

impl LoadSpecBuilder {
    /// Set the filter
    pub fn filter(mut self, filter: Value) -> Self {
        self.spec.filter = Some(filter);
        self
    }

    /// Set the search
    pub fn search(mut self, expr: SearchExpr, operation: impl Into<String>, value: Value) -> Self {
        self.spec.search = Some(SearchSpec {
            expr,
            operation: operation.into(),
            value,
        });
        self
    }

    /// Add an ascending sort key
    pub fn sort_by(mut self, selector: impl Into<String>) -> Self {
        self.spec.sort.push(SortSpec::asc(selector));
        self
    }

    /// Add a descending sort key
    pub fn sort_desc(mut self, selector: impl Into<String>) -> Self {
        self.spec.sort.push(SortSpec::desc(selector));
        self
    }

    /// Add a grouping level
    pub fn group_by(mut self, level: GroupLevelSpec) -> Self {
        self.spec.group.push(level);
        self
    }

    /// Select fields
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.spec.select = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.spec.skip = Some(n);
        self
    }

    pub fn take(mut self, n: u64) -> Self {
        self.spec.take = Some(n);
        self
    }

    pub fn require_total_count(mut self) -> Self {
        self.spec.require_total_count = true;
        self
    }

    pub fn require_group_count(mut self) -> Self {
        self.spec.require_group_count = true;
        self
    }

    /// Add a summary over the whole filtered set
    pub fn total_summary(mut self, summary_type: &str, selector: Option<&str>) -> Self {
        self.spec.total_summary.push(SummarySpec::new(summary_type, selector));
        self
    }

    /// Add a summary computed per group
    pub fn group_summary(mut self, summary_type: &str, selector: Option<&str>) -> Self {
        self.spec.group_summary.push(SummarySpec::new(summary_type, selector));
        self
    }

    /// Build the request
    pub fn build(self) -> LoadSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_load_spec() {
        let spec: LoadSpec = serde_json::from_value(json!({
            "filter": ["int1", "=", 3],
            "sort": [{"selector": "int2", "desc": true}],
            "group": [
                {"selector": "date", "groupInterval": "quarter"},
                {"selector": "int1", "isExpanded": true, "groupInterval": 10}
            ],
            "skip": 10,
            "take": 5,
            "requireTotalCount": true,
            "groupSummary": [{"summaryType": "count"}]
        }))
        .unwrap();

        assert_eq!(spec.filter, Some(json!(["int1", "=", 3])));
        assert!(spec.sort[0].desc);
        assert_eq!(spec.group.len(), 2);
        assert_eq!(
            spec.group[0].group_interval,
            Some(GroupInterval::Named("quarter".into()))
        );
        assert_eq!(spec.group[1].group_interval, Some(GroupInterval::Width(10)));
        assert!(spec.group[1].is_expanded);
        assert!(!spec.group[0].is_expanded);
        assert_eq!(spec.skip, Some(10));
        assert!(spec.require_total_count);
        assert!(!spec.require_group_count);
        assert_eq!(spec.group_summary[0].summary_type, "count");
        assert!(spec.is_grouped());
    }

    #[test]
    fn test_flat_search_form() {
        let spec: LoadSpec = serde_json::from_value(json!({
            "searchExpr": ["a", "b"],
            "searchOperation": "contains",
            "searchValue": "x"
        }))
        .unwrap();

        let search = spec.effective_search().unwrap();
        assert_eq!(search.expr, SearchExpr::Fields(vec!["a".into(), "b".into()]));
        assert_eq!(search.operation, "contains");

        assert!(LoadSpec::default().effective_search().is_none());
    }

    #[test]
    fn test_context_defaults() {
        let options = ContextOptions::default();
        assert!(options.replace_ids);
        assert_eq!(options.summary_query_limit, 100);
        assert_eq!(options.timezone_offset, 0);
        assert!(options.case_insensitive_regex);

        let parsed: ContextOptions =
            serde_json::from_value(json!({"timezoneOffset": -60})).unwrap();
        assert_eq!(parsed.timezone_offset, -60);
        assert_eq!(parsed.summary_query_limit, 100);
    }

    #[test]
    fn test_builder() {
        let spec = LoadSpec::builder()
            .filter(json!(["int1", ">", 1]))
            .sort_by("int1")
            .sort_desc("int2")
            .group_by(GroupLevelSpec::new("int1").expanded())
            .take(20)
            .require_total_count()
            .total_summary("sum", Some("int1"))
            .build();

        assert_eq!(spec.sort, vec![SortSpec::asc("int1"), SortSpec::desc("int2")]);
        assert!(spec.group[0].is_expanded);
        assert_eq!(spec.take, Some(20));
        assert!(spec.needs_total_count());
    }
}
