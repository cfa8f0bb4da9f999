//! Pipeline Compiler
//!
//! Turns the pieces of a grid load request into aggregation stages:
//!
//! - **stage**: Wire representation of a single stage
//! - **expr**: Expression fragments (field refs, integer division, date units)
//! - **chain**: Repair of and-chains with missing connectives
//! - **filter**: Filter language parser and `$match` compiler
//! - **nested**: `field.unit` resolution into computed date parts
//! - **group_key**: Per-level group key computation
//! - **summary**: Summary accumulators and their reader
//! - **assemble**: Ordered composition of the above
//!
//! # Example
//!
//! ```rust
//! use gridquery::pipeline::{filter_pipeline, pipeline_to_value};
//! use serde_json::json;
//!
//! let filter = json!([["int1", "=", 3], "or", ["int1", "=", 5]]);
//! let pipeline = filter_pipeline(Some(&filter), 0, true);
//!
//! assert_eq!(
//!     pipeline_to_value(&pipeline.stages),
//!     json!([{"$match": {"$or": [{"int1": {"$eq": 3}}, {"int1": {"$eq": 5}}]}}])
//! );
//! ```

pub mod assemble;
pub mod chain;
pub mod expr;
pub mod filter;
pub mod group_key;
pub mod nested;
pub mod stage;
pub mod summary;

pub use assemble::{
    combine_filters, count_stages, filter_pipeline, group_count_stages, grouping_stages,
    select_stages, skip_take_stages, sort_stages, FilterPipeline, GroupShape, SearchExpr,
    SearchSpec, SortSpec,
};
pub use expr::DateUnit;
pub use filter::{compile_filter, object_id, CompiledFilter, ComparisonOp, Connective, FilterExpression};
pub use group_key::{build_group_key, group_key_field, item_projection, GroupInterval, GroupKeyPipeline};
pub use nested::{removal_stages, resolve_nested_fields, NestedField, NestedFieldPipeline};
pub use stage::{pipeline_to_value, Document, Stage};
pub use summary::{read_summary, summary_stages, SummarySpec, SummaryType};
