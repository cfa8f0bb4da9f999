//! Document Store Seam
//!
//! The query layer talks to the document store through the [`Collection`]
//! trait. A production deployment implements it on top of its database
//! driver; [`MemoryCollection`] implements it over in-memory documents.
//!
//! - **error**: Store error types
//! - **value**: Store-native values (dates, object ids) and ordering
//! - **eval**: Expression and `$match` evaluation
//! - **memory**: In-memory collection

mod error;
pub mod eval;
mod memory;
pub mod value;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryCollection;

use crate::pipeline::{Document, Stage};
use async_trait::async_trait;

/// A collection that can run aggregation pipelines
#[async_trait]
pub trait Collection: Send + Sync {
    /// Collection name, used in diagnostics
    fn name(&self) -> &str;

    /// Run a pipeline and collect every resulting document
    async fn aggregate(&self, pipeline: &[Stage]) -> StoreResult<Vec<Document>>;
}
