//! SQLite-backed row store implementing the RowStore trait

use std::path::Path;
use std::time::Duration;

use fuzzgroup_core::{
    row::{quote_ident, ClientId, ColumnInfo, ColumnSet, GroupId, Row, StoredRow, Value},
    storage::{RowStore, StoreError, StoreResult},
};
use rusqlite::{types::ValueRef, Connection};
use tracing::{debug, info};

use crate::error::SqliteError;
use crate::ingest::{self, LoadMode};
use crate::schema;

fn backend(err: rusqlite::Error) -> StoreError {
    SqliteError::from(err).into()
}

/// Read column `idx` as a core value. Blobs are decoded lossily as text.
fn value_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
    })
}

/// SQLite-backed store holding one table of ingested rows
pub struct SqliteRowStore {
    conn: Connection,
    table: String,
}

impl SqliteRowStore {
    /// Wrap an existing connection. The table does not need to exist yet.
    pub fn new(conn: Connection, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
        }
    }

    /// Create a new in-memory store (for testing)
    pub fn in_memory(table: impl Into<String>) -> crate::error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::new(conn, table))
    }

    /// Open a file-backed store, creating the database file if needed
    pub fn open(path: impl AsRef<Path>, table: impl Into<String>) -> crate::error::Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self::new(conn, table))
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Name of the table this store reads and writes
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Load CSV files into the table.
    ///
    /// The first file replaces the table and the rest append to it, each in
    /// its own transaction. On failure, files before the failing one remain
    /// committed. Returns the total number of inserted rows.
    pub fn ingest<B: AsRef<[u8]>>(&mut self, files: &[B]) -> StoreResult<usize> {
        if files.is_empty() {
            return Err(StoreError::Ingestion {
                file: 0,
                reason: "no files supplied".into(),
            });
        }

        let mut total = 0;
        for (i, bytes) in files.iter().enumerate() {
            let mode = if i == 0 {
                LoadMode::Replace
            } else {
                LoadMode::Append
            };
            total += ingest::load_file(&mut self.conn, &self.table, i + 1, bytes.as_ref(), mode)?;
        }

        info!(table = %self.table, files = files.len(), rows = total, "ingestion complete");
        Ok(total)
    }

    fn require_table(&self) -> StoreResult<()> {
        if schema::table_exists(&self.conn, &self.table)? {
            Ok(())
        } else {
            Err(StoreError::TableMissing(self.table.clone()))
        }
    }
}

impl RowStore for SqliteRowStore {
    fn list_columns(&self) -> StoreResult<Vec<ColumnInfo>> {
        Ok(schema::data_columns(&self.conn, &self.table)?)
    }

    fn scan(
        &self,
        columns: &ColumnSet,
        visit: &mut dyn FnMut(Row) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let available = schema::data_columns(&self.conn, &self.table)?;
        if let Some(missing) = columns
            .names()
            .iter()
            .find(|name| !available.iter().any(|c| &c.name == *name))
        {
            return Err(StoreError::UnknownColumn(missing.clone()));
        }

        let selected: Vec<String> = columns.names().iter().map(|n| quote_ident(n)).collect();
        let sql = format!(
            "SELECT client_id, {} FROM {} ORDER BY client_id",
            selected.join(", "),
            quote_ident(&self.table)
        );

        let mut stmt = self.conn.prepare(&sql).map_err(backend)?;
        let mut rows = stmt.query([]).map_err(backend)?;
        while let Some(row) = rows.next().map_err(backend)? {
            let client_id: ClientId = row.get(0).map_err(backend)?;
            let values = (1..=columns.len())
                .map(|idx| value_at(row, idx))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(backend)?;
            visit(Row::new(client_id, values))?;
        }
        Ok(())
    }

    fn bulk_update_group_ids(&mut self, assignments: &[(ClientId, GroupId)]) -> StoreResult<()> {
        self.require_table()?;

        let tx = self.conn.transaction().map_err(backend)?;
        schema::ensure_group_column(&tx, &self.table)?;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "UPDATE {} SET group_id = ?1 WHERE client_id = ?2",
                    quote_ident(&self.table)
                ))
                .map_err(backend)?;
            for &(client_id, group_id) in assignments {
                let changed = stmt
                    .execute(rusqlite::params![group_id, client_id])
                    .map_err(backend)?;
                if changed == 0 {
                    // Dropping the transaction rolls back earlier updates
                    return Err(StoreError::RowNotFound(client_id));
                }
            }
        }
        tx.commit().map_err(backend)?;

        debug!(table = %self.table, rows = assignments.len(), "group ids written");
        Ok(())
    }

    fn create_index(&mut self, columns: &ColumnSet) -> StoreResult<()> {
        for column in columns.names() {
            self.conn
                .execute(
                    &format!(
                        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                        quote_ident(&schema::index_name(&self.table, column)),
                        quote_ident(&self.table),
                        quote_ident(column)
                    ),
                    [],
                )
                .map_err(backend)?;
        }
        Ok(())
    }

    fn row_count(&self) -> StoreResult<usize> {
        self.require_table()?;
        let count: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table)),
                [],
                |row| row.get(0),
            )
            .map_err(backend)?;
        Ok(count as usize)
    }

    fn read_page(&self, offset: usize, limit: usize) -> StoreResult<Vec<StoredRow>> {
        // No table can hold more than i64::MAX rows
        let Ok(offset) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let all = schema::all_columns(&self.conn, &self.table)?;
        let has_group = all.iter().any(|c| c.name == fuzzgroup_core::row::GROUP_ID_COLUMN);
        let data: Vec<ColumnInfo> = schema::data_columns(&self.conn, &self.table)?;

        let mut selected = vec![
            "client_id".to_string(),
            if has_group { "group_id" } else { "NULL" }.to_string(),
        ];
        selected.extend(data.iter().map(|c| quote_ident(&c.name)));

        let sql = format!(
            "SELECT {} FROM {} ORDER BY client_id LIMIT ?1 OFFSET ?2",
            selected.join(", "),
            quote_ident(&self.table)
        );

        let mut stmt = self.conn.prepare(&sql).map_err(backend)?;
        let rows = stmt
            .query_map(rusqlite::params![limit, offset], |row| {
                let mut values = Vec::with_capacity(data.len());
                for (i, column) in data.iter().enumerate() {
                    values.push((column.name.clone(), value_at(row, i + 2)?));
                }
                Ok(StoredRow {
                    client_id: row.get(0)?,
                    group_id: row.get(1)?,
                    values,
                })
            })
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(backend)?;

        Ok(rows)
    }
}
