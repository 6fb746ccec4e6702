//! Error types for the SQLite row store

use fuzzgroup_core::storage::StoreError;
use thiserror::Error;

/// Result type for SQLite operations
pub type Result<T> = std::result::Result<T, SqliteError>;

/// Errors that can occur inside the SQLite backend
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Database connection or query error
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV reader error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The target table has not been created
    #[error("table {0} does not exist")]
    TableMissing(String),

    /// A file was rejected before or during insertion
    #[error("file #{file}: {reason}")]
    Ingestion { file: usize, reason: String },

    /// IO error (for file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SqliteError {
    /// Attach a file number to any error raised while loading that file.
    pub(crate) fn in_file(self, file: usize) -> Self {
        match self {
            SqliteError::Ingestion { .. } | SqliteError::TableMissing(_) => self,
            other => SqliteError::Ingestion {
                file,
                reason: other.to_string(),
            },
        }
    }
}

/// Convert SqliteError to StoreError for the storage trait
impl From<SqliteError> for StoreError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::TableMissing(table) => StoreError::TableMissing(table),
            SqliteError::Ingestion { file, reason } => StoreError::Ingestion { file, reason },
            SqliteError::Database(e) => StoreError::Backend(format!("SQLite: {}", e)),
            SqliteError::Csv(e) => StoreError::Backend(format!("CSV: {}", e)),
            SqliteError::Io(e) => StoreError::Backend(format!("IO: {}", e)),
        }
    }
}
