//! SQLite row store for fuzzgroup
//!
//! This crate loads CSV uploads into a single SQLite table and implements the
//! `RowStore` trait from fuzzgroup-core on top of it, so the grouping engine
//! can scan the table and write `group_id` back.
//!
//! # Features
//!
//! - Delimiter sniffing and per-column type inference for CSV uploads
//! - One transaction per file; later files append to the first
//! - Quoted identifiers throughout, so any header text is a valid column
//! - Supports in-memory databases for testing
//!
//! # Example
//!
//! ```rust,no_run
//! use fuzzgroup_core::{CancelFlag, GroupingEngine, GroupingRequest};
//! use fuzzgroup_sqlite::SqliteRowStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = SqliteRowStore::in_memory("fuzzy")?;
//! store.ingest(&["name\nIvan Petrov\nivanpetrov\nMaria Ivanova\n"])?;
//!
//! let outcome = GroupingEngine::new().run(
//!     &mut store,
//!     &GroupingRequest::new(["name"]),
//!     &CancelFlag::new(),
//! )?;
//! assert_eq!(outcome.groups().len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ingest;
pub mod schema;
pub mod store;

// Re-export main types
pub use error::{Result, SqliteError};
pub use ingest::{sniff_delimiter, LoadMode};
pub use store::SqliteRowStore;
