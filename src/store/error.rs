//! Store Error Types
//!
//! Errors raised by a [`Collection`](crate::store::Collection) while running a
//! pipeline. They reach the caller unchanged; nothing here retries.

use thiserror::Error;

/// Errors that can occur while the store evaluates a pipeline
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store or its transport failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Expression or query operator the store does not understand
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Operator arguments of the wrong shape or type
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
}

impl From<regex::Error> for StoreError {
    fn from(err: regex::Error) -> Self {
        StoreError::InvalidExpression(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
