//! Grouping engine
//!
//! Turns a column selection into connected groups of rows:
//!
//! 1. Validate the selection against the store schema
//! 2. Scan rows and derive normalized keys (and name tokens)
//! 3. Generate candidate edges (parallel on large tables)
//! 4. Merge edges with union-find
//! 5. Number groups 1..=N, pick representatives, write group ids back
//!
//! # Example
//!
//! ```rust
//! use fuzzgroup_core::grouping::{GroupingEngine, GroupingRequest};
//! use fuzzgroup_core::row::{ColumnInfo, ColumnType, Value};
//! use fuzzgroup_core::storage::MemoryStore;
//! use fuzzgroup_core::CancelFlag;
//!
//! let mut store = MemoryStore::new(vec![ColumnInfo::new("name", ColumnType::Text)]);
//! store.push_row(vec![Value::from("Ivan Petrov")]);
//! store.push_row(vec![Value::from("ivanpetrov")]);
//!
//! let engine = GroupingEngine::new();
//! let outcome = engine
//!     .run(&mut store, &GroupingRequest::new(["name"]), &CancelFlag::new())
//!     .unwrap();
//! assert_eq!(outcome.groups().len(), 1);
//! ```

mod candidates;
mod engine;
mod outcome;

pub use candidates::Edge;
pub use engine::{EngineConfig, GroupingEngine, GroupingRequest};
pub use outcome::{
    Group, GroupedPage, GroupedRow, GroupingOutcome, RunStats, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
