//! Grid Query Layer
//!
//! Runs grid load requests against a document collection:
//!
//! - **AST**: Load request and context option types
//! - **Plan**: Compilation of a request into its sub-query pipelines
//! - **Executor**: Flat and grouped loading, counts and summaries
//! - **Limiter**: Per-call cap on summary sub-queries
//!
//! # Examples
//!
//! ## Flat load
//!
//! ```rust
//! use gridquery::query::{LoadSpec, QueryExecutor};
//! use gridquery::store::MemoryCollection;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rows = (0..10).map(|i| json!({"_id": i, "int1": i % 5})).collect();
//! let executor = QueryExecutor::new(Arc::new(MemoryCollection::from_values(rows)?));
//!
//! let spec = LoadSpec::builder()
//!     .filter(json!(["int1", "=", 2]))
//!     .require_total_count()
//!     .build();
//! let result = executor.load(&spec).await?;
//!
//! assert_eq!(result.total_count, Some(2));
//! # Ok(())
//! # }
//! ```
//!
//! ## Grouped load
//!
//! ```rust,ignore
//! let spec = LoadSpec::builder()
//!     .group_by(GroupLevelSpec::new("date").interval("month"))
//!     .group_by(GroupLevelSpec::new("int1").expanded())
//!     .group_summary("sum", Some("int2"))
//!     .build();
//!
//! let groups = executor.load(&spec).await?;
//! ```

mod ast;
mod error;
mod executor;
mod grouping;
mod limiter;
mod plan;
mod result;
mod rows;

pub use ast::{ContextOptions, GroupLevelSpec, LoadSpec, LoadSpecBuilder};
pub use error::{QueryError, QueryResult};
pub use executor::QueryExecutor;
pub use limiter::{SummaryQueryLimiter, DEFAULT_SUMMARY_QUERY_LIMIT};
pub use plan::{CompiledLevel, CompiledLoad, QueryPlan};
pub use result::{GroupItems, GroupResult, LoadData, LoadResult};
pub use rows::{replace_id, RowProcessor};
