//! Pipeline Assembly
//!
//! Composes stage lists from the compiled pieces. Ordering rules:
//!
//! - nested field stages come before the `$match` that reads them, and the
//!   temp fields are projected away right after it
//! - `$sort` comes before `$skip`/`$limit` and before any `$group`, so paging
//!   and pushed items follow the requested order
//! - `$skip`/`$limit` are only emitted for positive values

use crate::pipeline::expr::field_ref;
use crate::pipeline::filter::compile_filter;
use crate::pipeline::group_key::GroupKeyPipeline;
use crate::pipeline::nested::{removal_stages, resolve_nested_fields};
use crate::pipeline::stage::{Document, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One sort key: `{selector, desc}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub selector: String,
    #[serde(default)]
    pub desc: bool,
}

impl SortSpec {
    pub fn asc(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            desc: false,
        }
    }

    pub fn desc(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            desc: true,
        }
    }
}

/// Fields a search applies to: one field or several (or-ed together)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchExpr {
    Field(String),
    Fields(Vec<String>),
}

/// A search request: `{expr, operation, value}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpec {
    pub expr: SearchExpr,
    pub operation: String,
    #[serde(default)]
    pub value: Value,
}

impl SearchSpec {
    /// The equivalent filter, `None` when the search is incomplete
    pub fn to_filter(&self) -> Option<Value> {
        if self.operation.is_empty() || self.value.is_null() {
            return None;
        }

        let condition = |field: &str| json!([field, self.operation, self.value]);
        match &self.expr {
            SearchExpr::Field(field) if !field.is_empty() => Some(condition(field)),
            SearchExpr::Fields(fields) if !fields.is_empty() => {
                let mut chain = Vec::with_capacity(fields.len() * 2);
                for field in fields {
                    if !chain.is_empty() {
                        chain.push(json!("or"));
                    }
                    chain.push(condition(field));
                }
                Some(Value::Array(chain))
            }
            _ => None,
        }
    }
}

/// `[filter, "and", search]`, or whichever of the two exists
pub fn combine_filters(filter: Option<&Value>, search: Option<&SearchSpec>) -> Option<Value> {
    let search = search.and_then(SearchSpec::to_filter);
    match (filter.filter(|f| !f.is_null()), search) {
        (Some(filter), Some(search)) => Some(json!([filter, "and", search])),
        (Some(filter), None) => Some(filter.clone()),
        (None, search) => search,
    }
}

/// Filtering stages plus the temp fields they introduced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPipeline {
    pub stages: Vec<Stage>,
    pub nested_fields: Vec<String>,
}

/// Compile a filter into `[nested $addFields.., $match, $project exclusion]`.
///
/// A filter that does not compile yields no stages at all.
pub fn filter_pipeline(
    filter: Option<&Value>,
    timezone_offset: i32,
    case_insensitive: bool,
) -> FilterPipeline {
    let Some(compiled) = filter.and_then(|f| compile_filter(f, case_insensitive)) else {
        return FilterPipeline::default();
    };

    let nested = resolve_nested_fields(&compiled.fields, timezone_offset);
    let mut stages = nested.stages;
    stages.push(compiled.match_stage());
    stages.extend(removal_stages(&nested.fields));

    FilterPipeline {
        stages,
        nested_fields: nested.fields,
    }
}

/// `$sort` over the requested keys, nothing for an empty list
pub fn sort_stages(sort: &[SortSpec]) -> Vec<Stage> {
    if sort.is_empty() {
        return Vec::new();
    }

    let keys = sort
        .iter()
        .map(|s| (s.selector.clone(), json!(if s.desc { -1 } else { 1 })))
        .collect::<Document>();
    vec![Stage::Sort(keys)]
}

/// `$skip` if skip > 0, `$limit` if take > 0
pub fn skip_take_stages(skip: Option<u64>, take: Option<u64>) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(2);
    if let Some(skip) = skip.filter(|n| *n > 0) {
        stages.push(Stage::Skip(skip));
    }
    if let Some(take) = take.filter(|n| *n > 0) {
        stages.push(Stage::Limit(take));
    }
    stages
}

/// Inclusion projection of the selected fields
pub fn select_stages(select: &[String]) -> Vec<Stage> {
    if select.is_empty() {
        return Vec::new();
    }

    let projection = select
        .iter()
        .map(|field| (field.clone(), field_ref(field)))
        .collect::<Document>();
    vec![Stage::Project(projection)]
}

/// Counts the filtered documents into `{count: n}`
pub fn count_stages(filter: &FilterPipeline) -> Vec<Stage> {
    let mut stages = filter.stages.clone();
    stages.push(Stage::Count("count".to_string()));
    stages
}

/// Counts the distinct keys of the first group level into `{groupCount: n}`
pub fn group_count_stages(filter: &FilterPipeline, first_level: &GroupKeyPipeline) -> Vec<Stage> {
    let mut stages = filter.stages.clone();
    stages.extend(first_level.stages.iter().cloned());
    stages.push(Stage::Group(Stage::single(
        "_id",
        field_ref(&first_level.key_field()),
    )));
    stages.push(Stage::Count("groupCount".to_string()));
    stages
}

/// How one level's `$group` stage is shaped
#[derive(Debug, Clone, Copy)]
pub struct GroupShape<'a> {
    pub desc: bool,
    /// Push rows into `items`
    pub include_items: bool,
    /// Count is derived elsewhere; no `count` accumulator
    pub count_separately: bool,
    /// Reshaping applied to pushed rows, the whole row when `None`
    pub item_projection: Option<&'a Document>,
}

/// `$group` by the level key, reshape to `{key, count?, items}`, sort by key.
///
/// `items` is always present: the pushed rows, or `null` when not fetched.
pub fn grouping_stages(key: &GroupKeyPipeline, shape: GroupShape<'_>) -> Vec<Stage> {
    let mut group = Document::new();
    group.insert("_id".to_string(), field_ref(&key.key_field()));

    let mut project = Document::new();
    project.insert("_id".to_string(), json!(0));
    project.insert("key".to_string(), json!("$_id"));

    if !shape.count_separately {
        group.insert("count".to_string(), json!({ "$sum": 1 }));
        project.insert("count".to_string(), json!(1));
    }

    if shape.include_items {
        let pushed = match shape.item_projection {
            Some(projection) => Value::Object(projection.clone()),
            None => json!("$$CURRENT"),
        };
        group.insert("items".to_string(), json!({ "$push": pushed }));
        project.insert("items".to_string(), json!(1));
    } else {
        project.insert("items".to_string(), json!({ "$literal": null }));
    }

    vec![
        Stage::Group(group),
        Stage::Project(project),
        Stage::Sort(Stage::single("key", json!(if shape.desc { -1 } else { 1 }))),
    ]
}
