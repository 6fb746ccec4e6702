//! In-memory storage backend
//!
//! A BTreeMap-based table for testing and development.
//! Not suitable for production use due to lack of persistence.

use std::cell::Cell;
use std::collections::BTreeMap;

use crate::row::{ClientId, ColumnInfo, ColumnSet, GroupId, Row, StoredRow, Value};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::traits::RowStore;

const TABLE_NAME: &str = "memory";

#[derive(Debug, Clone)]
struct MemoryRow {
    group_id: Option<GroupId>,
    values: Vec<Value>,
}

/// In-memory row store.
///
/// Rows are kept ordered by `client_id`, which is also the natural scan order.
/// Useful for:
/// - Unit testing the engine without SQLite
/// - Counting scans and index hints
/// - Injecting write-back failures
#[derive(Debug, Default)]
pub struct MemoryStore {
    columns: Option<Vec<ColumnInfo>>,
    rows: BTreeMap<ClientId, MemoryRow>,
    scans: Cell<usize>,
    index_hints: usize,
    fail_updates: bool,
}

impl MemoryStore {
    /// Create an empty table with the given data columns.
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self {
            columns: Some(columns),
            ..Default::default()
        }
    }

    /// Create a store with no table, as before the first ingestion.
    pub fn without_table() -> Self {
        Self::default()
    }

    /// Append a row with the next free `client_id`.
    pub fn push_row(&mut self, values: Vec<Value>) -> ClientId {
        let client_id = self.rows.keys().next_back().map_or(1, |last| last + 1);
        self.insert_row(client_id, values);
        client_id
    }

    /// Insert a row with an explicit `client_id`, replacing any existing one.
    pub fn insert_row(&mut self, client_id: ClientId, values: Vec<Value>) {
        self.rows.insert(
            client_id,
            MemoryRow {
                group_id: None,
                values,
            },
        );
    }

    /// Current group id of a row (for testing).
    pub fn group_id(&self, client_id: ClientId) -> Option<GroupId> {
        self.rows.get(&client_id).and_then(|r| r.group_id)
    }

    /// Number of scans started so far.
    pub fn scan_count(&self) -> usize {
        self.scans.get()
    }

    /// Number of `create_index` hints received.
    pub fn index_hints(&self) -> usize {
        self.index_hints
    }

    /// Make every following `bulk_update_group_ids` call fail.
    pub fn fail_updates(&mut self, fail: bool) {
        self.fail_updates = fail;
    }

    fn columns(&self) -> StoreResult<&[ColumnInfo]> {
        self.columns
            .as_deref()
            .ok_or_else(|| StoreError::TableMissing(TABLE_NAME.to_string()))
    }

    fn positions(&self, columns: &ColumnSet) -> StoreResult<Vec<usize>> {
        let known = self.columns()?;
        columns
            .names()
            .iter()
            .map(|name| {
                known
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| StoreError::UnknownColumn(name.clone()))
            })
            .collect()
    }
}

impl RowStore for MemoryStore {
    fn list_columns(&self) -> StoreResult<Vec<ColumnInfo>> {
        Ok(self.columns()?.to_vec())
    }

    fn scan(
        &self,
        columns: &ColumnSet,
        visit: &mut dyn FnMut(Row) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let positions = self.positions(columns)?;
        self.scans.set(self.scans.get() + 1);

        for (client_id, row) in &self.rows {
            let values = positions
                .iter()
                .map(|&p| row.values.get(p).cloned().unwrap_or(Value::Null))
                .collect();
            visit(Row::new(*client_id, values))?;
        }
        Ok(())
    }

    fn bulk_update_group_ids(&mut self, assignments: &[(ClientId, GroupId)]) -> StoreResult<()> {
        self.columns()?;
        if self.fail_updates {
            return Err(StoreError::Backend("update rejected".to_string()));
        }

        // Validate first so a bad id leaves every row untouched
        if let Some((missing, _)) = assignments
            .iter()
            .find(|(client_id, _)| !self.rows.contains_key(client_id))
        {
            return Err(StoreError::RowNotFound(*missing));
        }

        for (client_id, group_id) in assignments {
            if let Some(row) = self.rows.get_mut(client_id) {
                row.group_id = Some(*group_id);
            }
        }
        Ok(())
    }

    fn create_index(&mut self, columns: &ColumnSet) -> StoreResult<()> {
        self.positions(columns)?;
        self.index_hints += 1;
        Ok(())
    }

    fn row_count(&self) -> StoreResult<usize> {
        self.columns()?;
        Ok(self.rows.len())
    }

    fn read_page(&self, offset: usize, limit: usize) -> StoreResult<Vec<StoredRow>> {
        let columns = self.columns()?;
        Ok(self
            .rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(client_id, row)| StoredRow {
                client_id: *client_id,
                group_id: row.group_id,
                values: columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (c.name.clone(), row.values.get(i).cloned().unwrap_or(Value::Null)))
                    .collect(),
            })
            .collect())
    }
}
