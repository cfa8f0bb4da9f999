//! # gridquery
//!
//! Data-grid query compiler: turns the load requests of a data grid (filter,
//! sort, paging, multi-level grouping, summaries) into document-store
//! aggregation pipelines and runs them.
//!
//! ## Features
//!
//! - **Filter language**: Nested and/or/not filters compiled to `$match`
//! - **Date parts**: `date.month`-style filters and calendar group intervals with
//!   client timezone correction
//! - **Multi-level grouping**: Levels loaded concurrently and assembled bottom-up
//! - **Bounded summaries**: A per-call cap on summary sub-queries
//!
//! ## Modules
//!
//! - [`pipeline`]: Stage types and the pure pipeline compiler
//! - [`store`]: The collection seam and an in-memory collection
//! - [`query`]: Load requests, execution and results
//! - [`config`]: File and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridquery::query::{GroupLevelSpec, LoadSpec, QueryExecutor};
//! use gridquery::store::MemoryCollection;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rows = vec![
//!         json!({"_id": 1, "region": "north", "amount": 10}),
//!         json!({"_id": 2, "region": "south", "amount": 25}),
//!     ];
//!     let executor = QueryExecutor::new(Arc::new(MemoryCollection::from_values(rows)?));
//!
//!     // Groups by region with the amount summed per group
//!     let spec = LoadSpec::builder()
//!         .filter(json!(["amount", ">", 5]))
//!         .group_by(GroupLevelSpec::new("region"))
//!         .group_summary("sum", Some("amount"))
//!         .build();
//!
//!     let result = executor.load(&spec).await?;
//!     println!("{}", serde_json::to_string_pretty(&result)?);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod pipeline;
pub mod query;
pub mod store;

// Re-export top-level types for convenience
pub use pipeline::{Document, Stage};

pub use store::{Collection, MemoryCollection, StoreError, StoreResult};

pub use query::{
    ContextOptions, GroupLevelSpec, GroupResult, LoadResult, LoadSpec, QueryError, QueryExecutor,
    QueryResult,
};

pub use config::{Config, ConfigError, LoggingConfig, QueryConfig};
