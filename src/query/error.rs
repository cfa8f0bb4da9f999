//! Query Error Types
//!
//! Defines the error conditions a load call can end with. Malformed filters,
//! unknown summary types and unknown group intervals are not among them: those
//! are skipped with a diagnostic.

use thiserror::Error;

/// Errors that can occur during a load call
#[derive(Error, Debug)]
pub enum QueryError {
    /// The store failed to run a pipeline
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// The store returned a document of an unexpected shape
    #[error("Malformed result: {0}")]
    MalformedResult(String),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_error_display() {
        let err = QueryError::MalformedResult("group entry without count".to_string());
        assert_eq!(err.to_string(), "Malformed result: group entry without count");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: QueryError = StoreError::Backend("timeout".to_string()).into();
        assert!(matches!(err, QueryError::Store(StoreError::Backend(_))));
        assert_eq!(err.to_string(), "Store error: Backend error: timeout");
    }
}
