//! fuzzgroup HTTP service
//!
//! Exposes CSV ingestion and fuzzy duplicate grouping over HTTP:
//! - `POST /generate` loads uploaded CSV files into the row store
//! - `GET /headers` lists the ingested columns
//! - `GET /groups` runs grouping on the chosen columns and returns a page
//!   of rows joined with their group representative
//!
//! All routes are mounted under the configured root path.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod service;
pub mod shutdown;

pub use config::{ConfigError, CorsPolicy, Database, Settings};
pub use error::ApiError;
pub use handlers::HandlerContext;
pub use service::FuzzService;
