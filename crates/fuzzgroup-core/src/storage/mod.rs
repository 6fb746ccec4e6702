//! Storage abstraction for ingested rows
//!
//! The engine only talks to a [`RowStore`]. Implementations exist for:
//!
//! - **Memory**: in-memory table for tests (`MemoryStore`)
//! - **SQLite**: native SQLite via rusqlite (separate crate)
//!
//! # Example
//!
//! ```rust
//! use fuzzgroup_core::row::{ColumnInfo, ColumnType, Value};
//! use fuzzgroup_core::storage::{MemoryStore, RowStore};
//!
//! let mut store = MemoryStore::new(vec![ColumnInfo::new("name", ColumnType::Text)]);
//! store.push_row(vec![Value::from("Ivan Petrov")]);
//!
//! assert_eq!(store.row_count().unwrap(), 1);
//! ```

mod error;
mod memory;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::RowStore;
