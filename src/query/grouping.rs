//! Grouped Loading
//!
//! Each level is one aggregation narrowed to its parent group. Sub-groups of
//! sibling groups are loaded concurrently, and a parent is only assembled once
//! all of its children are complete.

use crate::pipeline::{Document, Stage, SummarySpec};
use crate::query::error::{QueryError, QueryResult};
use crate::query::executor::LoadCall;
use crate::query::result::GroupResult;
use crate::query::rows::RowProcessor;
use futures_util::future::{try_join_all, BoxFuture};
use futures_util::FutureExt;
use serde_json::Value;

/// Loads the group tree of one call
pub(crate) struct GroupLoader<'a> {
    call: &'a LoadCall<'a>,
    summaries: &'a [SummarySpec],
    rows: RowProcessor,
}

impl<'a> GroupLoader<'a> {
    pub fn new(call: &'a LoadCall<'a>, summaries: &'a [SummarySpec], replace_ids: bool) -> Self {
        Self {
            call,
            summaries,
            rows: RowProcessor::new(replace_ids).stripping(call.compiled.temp_fields()),
        }
    }

    /// Load every level, starting from the top
    pub async fn load(&self) -> QueryResult<Vec<GroupResult>> {
        self.level(0, Vec::new()).await
    }

    fn level<'s>(
        &'s self,
        index: usize,
        constraints: Vec<Stage>,
    ) -> BoxFuture<'s, QueryResult<Vec<GroupResult>>> {
        async move {
            let stages = self.call.compiled.level_stages(index, &constraints);
            let entries = self.call.aggregate(stages).await?;
            tracing::debug!(level = index, groups = entries.len(), "Loaded group level");

            try_join_all(
                entries
                    .into_iter()
                    .map(|entry| self.group(index, &constraints, entry)),
            )
            .await
        }
        .boxed()
    }

    async fn group(
        &self,
        index: usize,
        constraints: &[Stage],
        mut entry: Document,
    ) -> QueryResult<GroupResult> {
        let level = &self.call.compiled.levels[index];
        let key = entry.remove("key").unwrap_or(Value::Null);
        let scope = self.call.compiled.key_scope(index, constraints, &key);

        let group = if !level.last {
            let children = self.level(index + 1, scope.clone()).await?;
            GroupResult::with_groups(key, children)
        } else if level.fetch_items {
            let items = entry.remove("items").ok_or_else(|| {
                QueryError::MalformedResult("expanded group without items".to_string())
            })?;
            GroupResult::with_rows(key, self.rows.process_items(items)?)
        } else {
            let count = entry
                .get("count")
                .and_then(Value::as_u64)
                .ok_or_else(|| QueryError::MalformedResult("group without count".to_string()))?;
            GroupResult::counted(key, count)
        };

        let summary = if self.summaries.is_empty() {
            None
        } else {
            self.call.summary(&scope, self.summaries).await?
        };
        Ok(group.with_summary(summary))
    }
}
