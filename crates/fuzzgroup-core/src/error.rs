//! Error types for grouping runs

use thiserror::Error;

use crate::storage::StoreError;

/// Errors that can end a grouping run
#[derive(Debug, Clone, Error)]
pub enum GroupError {
    /// A requested column is absent, or the table does not exist yet
    #[error("schema error: {0}")]
    Schema(String),

    /// The row store could not execute part of the matching computation
    #[error("computation error: {0}")]
    Computation(String),

    /// The caller went away before write-back started
    #[error("grouping run cancelled")]
    Cancelled,
}

impl From<StoreError> for GroupError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TableMissing(table) => {
                GroupError::Schema(format!("table '{}' does not exist", table))
            }
            StoreError::UnknownColumn(column) => {
                GroupError::Schema(format!("unknown column '{}'", column))
            }
            other => GroupError::Computation(other.to_string()),
        }
    }
}

/// Result type for grouping runs
pub type GroupResult<T> = Result<T, GroupError>;
