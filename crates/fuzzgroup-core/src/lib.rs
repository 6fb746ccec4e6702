//! Fuzzy grouping engine
//!
//! Finds rows that likely describe the same real-world entity despite
//! spelling variants, whitespace differences or transliteration noise, and
//! assigns each row a group id.
//!
//! # Features
//!
//! - `native` - Enable all native optimizations (SIMD, parallel)
//! - `simd` - SIMD-accelerated substring search via memchr
//! - `parallel` - Parallel candidate generation via rayon for large tables
//!
//! # Modules
//!
//! - [`normalize`]: canonical comparison keys
//! - [`matcher`]: the pairwise predicate
//! - [`cluster`]: union-find
//! - [`grouping`]: the engine, its outcome and the paginated read-back
//! - [`storage`]: the row-store trait and an in-memory backend

pub mod cancel;
pub mod cluster;
pub mod error;
pub mod grouping;
pub mod matcher;
pub mod normalize;
pub mod row;
pub mod storage;

// Re-export main types at crate root
pub use cancel::{CancelFlag, CancelOnDrop};
pub use error::{GroupError, GroupResult};
pub use grouping::{
    EngineConfig, GroupedPage, GroupedRow, GroupingEngine, GroupingOutcome, GroupingRequest,
};
pub use matcher::{MatchConfig, MatchReason};
pub use normalize::normalize;
pub use row::{ClientId, ColumnInfo, ColumnSet, ColumnType, GroupId, Row, StoredRow, Value};
pub use storage::{MemoryStore, RowStore, StoreError, StoreResult};
