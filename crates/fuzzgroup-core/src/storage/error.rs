//! Storage error types

use thiserror::Error;

/// Errors that can occur during row-store operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing table has not been created yet
    #[error("table does not exist: {0}")]
    TableMissing(String),

    /// A column referenced by the caller is not part of the table
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A file could not be loaded into the table
    #[error("ingestion failed for file #{file}: {reason}")]
    Ingestion { file: usize, reason: String },

    /// Storage backend error (database, filesystem, etc.)
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A group id was assigned to a row the store does not hold
    #[error("row not found: {0}")]
    RowNotFound(i64),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
