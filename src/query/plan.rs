//! Query Planning
//!
//! Compiles a [`LoadSpec`] once per call into the reusable pieces every
//! sub-query is cut from, and exposes the pipelines the call sends.
//!
//! # Sub-queries of one call
//!
//! ```text
//! data          pre + filter + sort + skip/take + select
//! level i       pre + filter + sort + constraints + key_i + group_i (+ skip/take at i = 0)
//! total count   pre + filter + $count
//! group count   pre + filter + key_0 + $group + $count
//! summary       pre + filter + constraints + $group{_id: null}
//! ```

use crate::pipeline::{
    build_group_key, combine_filters, count_stages, filter_pipeline, group_count_stages,
    grouping_stages, item_projection, pipeline_to_value, select_stages, skip_take_stages,
    sort_stages, summary_stages, Document, FilterPipeline, GroupKeyPipeline, GroupShape, Stage,
    SummarySpec,
};
use crate::query::ast::{ContextOptions, LoadSpec};
use serde::Serialize;
use serde_json::Value;

/// One compiled group level
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledLevel {
    pub key: GroupKeyPipeline,
    pub desc: bool,
    /// Deepest level of the request
    pub last: bool,
    /// Rows are pushed into the groups of this level
    pub fetch_items: bool,
}

impl CompiledLevel {
    /// Whether `count` is derived from children instead of computed by the store
    pub fn count_separately(&self) -> bool {
        !self.last || self.fetch_items
    }
}

/// The pieces of one load call
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledLoad {
    pub pre: Vec<Stage>,
    pub filter: FilterPipeline,
    pub sort: Vec<Stage>,
    pub paging: Vec<Stage>,
    pub select: Vec<Stage>,
    pub levels: Vec<CompiledLevel>,
    pub item_projection: Option<Document>,
}

impl CompiledLoad {
    pub fn compile(spec: &LoadSpec, options: &ContextOptions) -> Self {
        let tz = options.timezone_offset;
        let search = spec.effective_search();
        let filter = combine_filters(spec.filter.as_ref(), search.as_ref());

        let depth = spec.group.len();
        let levels = spec
            .group
            .iter()
            .enumerate()
            .map(|(i, level)| {
                let last = i + 1 == depth;
                CompiledLevel {
                    key: build_group_key(&level.selector, level.group_interval.as_ref(), i, tz),
                    desc: level.desc,
                    last,
                    fetch_items: last && level.is_expanded,
                }
            })
            .collect();

        Self {
            pre: options.pre_processing_pipeline.clone(),
            filter: filter_pipeline(filter.as_ref(), tz, options.case_insensitive_regex),
            sort: sort_stages(&spec.sort),
            paging: skip_take_stages(spec.skip, spec.take),
            select: select_stages(&spec.select),
            levels,
            item_projection: item_projection(&spec.select),
        }
    }

    fn prefixed(&self, stages: Vec<Stage>) -> Vec<Stage> {
        let mut out = Vec::with_capacity(self.pre.len() + stages.len());
        out.extend(self.pre.iter().cloned());
        out.extend(stages);
        out
    }

    fn filtered(&self) -> Vec<Stage> {
        self.prefixed(self.filter.stages.clone())
    }

    /// Rows of an ungrouped load
    pub fn flat_stages(&self) -> Vec<Stage> {
        let mut stages = self.filtered();
        stages.extend(self.sort.iter().cloned());
        stages.extend(self.paging.iter().cloned());
        stages.extend(self.select.iter().cloned());
        stages
    }

    /// Groups of one level, narrowed to the parent groups by `constraints`
    pub fn level_stages(&self, index: usize, constraints: &[Stage]) -> Vec<Stage> {
        let level = &self.levels[index];

        let mut stages = self.filtered();
        stages.extend(self.sort.iter().cloned());
        stages.extend_from_slice(constraints);
        stages.extend(level.key.stages.iter().cloned());
        stages.extend(grouping_stages(
            &level.key,
            GroupShape {
                desc: level.desc,
                include_items: level.fetch_items,
                count_separately: level.count_separately(),
                item_projection: self.item_projection.as_ref(),
            },
        ));
        if index == 0 {
            stages.extend(self.paging.iter().cloned());
        }
        stages
    }

    /// Constraints selecting the members of one group at `index`
    pub fn key_scope(&self, index: usize, constraints: &[Stage], key: &Value) -> Vec<Stage> {
        let level = &self.levels[index];
        let mut scope = constraints.to_vec();
        scope.extend(level.key.stages.iter().cloned());
        scope.push(level.key.key_match(key));
        scope
    }

    pub fn count_stages(&self) -> Vec<Stage> {
        self.prefixed(count_stages(&self.filter))
    }

    /// Distinct first-level keys, `None` for an ungrouped load
    pub fn group_count_stages(&self) -> Option<Vec<Stage>> {
        let first = self.levels.first()?;
        Some(self.prefixed(group_count_stages(&self.filter, &first.key)))
    }

    /// Summary over the filtered rows narrowed by `constraints`
    pub fn summary_stages(&self, constraints: &[Stage], summaries: &[SummarySpec]) -> Vec<Stage> {
        let mut stages = self.filtered();
        stages.extend_from_slice(constraints);
        stages.extend(summary_stages(summaries));
        stages
    }

    /// Fields computed for grouping, to be removed from returned rows
    pub fn temp_fields(&self) -> Vec<String> {
        self.levels
            .iter()
            .flat_map(|level| level.key.temp_fields.iter().cloned())
            .collect()
    }
}

/// The top-level pipelines a load call sends
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    /// Rows, or the first group level
    pub data: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<Vec<Stage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_count: Option<Vec<Stage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_summary: Option<Vec<Stage>>,
}

impl QueryPlan {
    pub fn build(spec: &LoadSpec, options: &ContextOptions) -> Self {
        let compiled = CompiledLoad::compile(spec, options);

        let data = if compiled.levels.is_empty() {
            compiled.flat_stages()
        } else {
            compiled.level_stages(0, &[])
        };

        Self {
            data,
            total_count: spec.needs_total_count().then(|| compiled.count_stages()),
            group_count: compiled
                .group_count_stages()
                .filter(|_| spec.require_group_count),
            total_summary: (!spec.total_summary.is_empty())
                .then(|| compiled.summary_stages(&[], &spec.total_summary)),
        }
    }

    /// Data pipeline as a JSON array
    pub fn data_value(&self) -> Value {
        pipeline_to_value(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::GroupLevelSpec;
    use serde_json::json;

    #[test]
    fn test_flat_stage_order() {
        let spec = LoadSpec::builder()
            .filter(json!(["date.year", "=", 2017]))
            .sort_by("int1")
            .skip(5)
            .take(10)
            .select(&["int1"])
            .build();
        let options = ContextOptions {
            pre_processing_pipeline: vec![Stage::Match(Stage::single("active", json!(true)))],
            ..ContextOptions::default()
        };

        let plan = QueryPlan::build(&spec, &options);
        let ops: Vec<_> = plan.data.iter().map(Stage::operator).collect();
        assert_eq!(
            ops,
            vec!["$match", "$addFields", "$match", "$project", "$sort", "$skip", "$limit", "$project"]
        );
        assert!(plan.total_count.is_none());
        assert!(plan.group_count.is_none());
    }

    #[test]
    fn test_level_stages() {
        let spec = LoadSpec::builder()
            .group_by(GroupLevelSpec::new("int1").descending())
            .group_by(GroupLevelSpec::new("int2").bucket(10).expanded())
            .take(3)
            .build();
        let compiled = CompiledLoad::compile(&spec, &ContextOptions::default());

        assert!(compiled.levels[0].count_separately());
        assert!(!compiled.levels[0].fetch_items);
        assert!(compiled.levels[1].fetch_items);

        assert_eq!(
            pipeline_to_value(&compiled.level_stages(0, &[])),
            json!([
                {"$addFields": {"___group_key_0": "$int1"}},
                {"$group": {"_id": "$___group_key_0"}},
                {"$project": {"_id": 0, "key": "$_id", "items": {"$literal": null}}},
                {"$sort": {"key": -1}},
                {"$limit": 3}
            ])
        );

        let scope = compiled.key_scope(0, &[], &json!(4));
        let second = compiled.level_stages(1, &scope);
        assert_eq!(
            pipeline_to_value(&second[..2]),
            json!([
                {"$addFields": {"___group_key_0": "$int1"}},
                {"$match": {"___group_key_0": 4}}
            ])
        );
        assert!(!second.contains(&Stage::Limit(3)));
        assert_eq!(compiled.temp_fields(), vec!["___group_key_0", "___group_key_1"]);
    }

    #[test]
    fn test_count_only_last_level() {
        let spec = LoadSpec::builder()
            .group_by(GroupLevelSpec::new("int1"))
            .require_group_count()
            .total_summary("count", None)
            .build();
        let plan = QueryPlan::build(&spec, &ContextOptions::default());

        assert_eq!(
            plan.data_value()[1],
            json!({"$group": {"_id": "$___group_key_0", "count": {"$sum": 1}}})
        );
        assert!(plan.group_count.is_some());
        assert_eq!(
            pipeline_to_value(plan.total_count.as_deref().unwrap()),
            json!([{"$count": "count"}])
        );
        assert_eq!(
            pipeline_to_value(plan.total_summary.as_deref().unwrap()),
            json!([{"$group": {"_id": null, "___count": {"$sum": 1}}}])
        );
    }
}
