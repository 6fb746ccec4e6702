//! HTTP error mapping
//!
//! Store and engine failures all surface as 422 with a fixed body. The
//! underlying cause is logged server-side and never sent to the client.

use fuzzgroup_core::{GroupError, StoreError};
use http::StatusCode;
use thiserror::Error;

/// Errors returned by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown endpoint: {method} {path}")]
    NotFound { method: String, path: String },

    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Malformed request input (query, JSON body, multipart framing)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Group(#[from] GroupError),

    /// A blocking task panicked or was aborted
    #[error("background task failed: {0}")]
    Task(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InvalidRequest(_)
            | ApiError::Store(_)
            | ApiError::Group(_)
            | ApiError::Task(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Client-visible detail string; the canonical reason phrase only.
    pub fn detail(&self) -> &'static str {
        self.status().canonical_reason().unwrap_or("Error")
    }
}

impl From<multer::Error> for ApiError {
    fn from(err: multer::Error) -> Self {
        ApiError::InvalidRequest(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Task(err.to_string())
    }
}
