//! Query Executor
//!
//! Executes a [`LoadSpec`] against a [`Collection`]:
//! 1. Compile the request once
//! 2. Load rows, or the group tree level by level
//! 3. Count rows and first-level groups when requested
//! 4. Compute the total summary when anything matched
//!
//! # Execution Pipeline
//!
//! ```text
//! LoadSpec → CompiledLoad → data ─┐
//!                         → counts ├→ LoadResult
//!                         → summary┘
//! ```

use crate::pipeline::{read_summary, Document, Stage, SummarySpec};
use crate::query::ast::{ContextOptions, LoadSpec};
use crate::query::error::{QueryError, QueryResult};
use crate::query::grouping::GroupLoader;
use crate::query::limiter::SummaryQueryLimiter;
use crate::query::plan::{CompiledLoad, QueryPlan};
use crate::query::result::{LoadData, LoadResult};
use crate::query::rows::RowProcessor;
use crate::store::Collection;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// State shared by every sub-query of one load call
pub(crate) struct LoadCall<'a> {
    collection: &'a dyn Collection,
    pub compiled: CompiledLoad,
    limiter: SummaryQueryLimiter,
}

impl<'a> LoadCall<'a> {
    fn new(collection: &'a dyn Collection, compiled: CompiledLoad, summary_limit: usize) -> Self {
        Self {
            collection,
            compiled,
            limiter: SummaryQueryLimiter::new(summary_limit),
        }
    }

    pub async fn aggregate(&self, stages: Vec<Stage>) -> QueryResult<Vec<Document>> {
        tracing::trace!(pipeline = %crate::pipeline::pipeline_to_value(&stages), "Running pipeline");
        Ok(self.collection.aggregate(&stages).await?)
    }

    /// Run a `$count` pipeline; no output document means zero
    async fn count(&self, stages: Vec<Stage>, field: &str) -> QueryResult<u64> {
        let docs = self.aggregate(stages).await?;
        match docs.first() {
            None => Ok(0),
            Some(doc) => doc.get(field).and_then(Value::as_u64).ok_or_else(|| {
                QueryError::MalformedResult(format!("count result without {}", field))
            }),
        }
    }

    /// Summary over the filtered rows narrowed by `constraints`.
    ///
    /// `None` when the call ran out of summary queries or nothing matched.
    pub async fn summary(
        &self,
        constraints: &[Stage],
        summaries: &[SummarySpec],
    ) -> QueryResult<Option<Vec<Value>>> {
        let stages = self.compiled.summary_stages(constraints, summaries);
        let outcome = self
            .limiter
            .run(|| async move {
                let docs = self.aggregate(stages).await?;
                Ok::<_, QueryError>(docs.first().map(|doc| read_summary(summaries, doc)))
            })
            .await;
        Ok(outcome.transpose()?.flatten())
    }
}

/// Query executor
pub struct QueryExecutor {
    /// Collection every pipeline runs against
    collection: Arc<dyn Collection>,
    options: ContextOptions,
}

impl QueryExecutor {
    /// Create an executor with default context options
    pub fn new(collection: Arc<dyn Collection>) -> Self {
        Self::with_options(collection, ContextOptions::default())
    }

    pub fn with_options(collection: Arc<dyn Collection>, options: ContextOptions) -> Self {
        Self {
            collection,
            options,
        }
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// The top-level pipelines [`load`](Self::load) would send, without running them
    pub fn plan(&self, spec: &LoadSpec) -> QueryPlan {
        QueryPlan::build(spec, &self.options)
    }

    /// Execute a load request
    pub async fn load(&self, spec: &LoadSpec) -> QueryResult<LoadResult> {
        let call_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "load",
            %call_id,
            collection = self.collection.name(),
            grouped = spec.is_grouped(),
        );
        self.execute(spec).instrument(span).await
    }

    async fn execute(&self, spec: &LoadSpec) -> QueryResult<LoadResult> {
        let start = Instant::now();
        let call = LoadCall::new(
            self.collection.as_ref(),
            CompiledLoad::compile(spec, &self.options),
            self.options.summary_query_limit,
        );

        let data = async {
            let data = if spec.is_grouped() {
                let loader = GroupLoader::new(&call, &spec.group_summary, self.options.replace_ids);
                LoadData::Groups(loader.load().await?)
            } else {
                let rows = call.aggregate(call.compiled.flat_stages()).await?;
                LoadData::Rows(RowProcessor::new(self.options.replace_ids).process_all(rows))
            };
            Ok::<_, QueryError>(data)
        };

        let group_count = async {
            match call.compiled.group_count_stages() {
                Some(stages) if spec.require_group_count => {
                    call.count(stages, "groupCount").await.map(Some)
                }
                _ => Ok(None),
            }
        };

        let total_count = async {
            if spec.needs_total_count() {
                call.count(call.compiled.count_stages(), "count").await.map(Some)
            } else {
                Ok(None)
            }
        };

        let (data, group_count, total_count) =
            futures_util::try_join!(data, group_count, total_count)?;

        let summary = match total_count {
            Some(count) if count > 0 && !spec.total_summary.is_empty() => {
                call.summary(&[], &spec.total_summary).await?
            }
            _ => None,
        };

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            summary_queries = call.limiter.started(),
            "Load complete"
        );

        Ok(LoadResult {
            data,
            group_count,
            total_count,
            summary,
        })
    }
}
