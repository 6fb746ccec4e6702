//! Table introspection and DDL for the ingested table
//!
//! The table always carries `client_id INTEGER PRIMARY KEY` followed by the
//! CSV columns and a trailing `group_id INTEGER`. Identifiers are quoted
//! before they reach SQL text.

use fuzzgroup_core::row::{
    is_system_column, quote_ident, ColumnInfo, ColumnType, CLIENT_ID_COLUMN, GROUP_ID_COLUMN,
};
use rusqlite::Connection;

use crate::error::{Result, SqliteError};

/// Check whether a table exists
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")?
        .exists([table])?;
    Ok(exists)
}

/// Every column of the table in declaration order, system columns included.
///
/// Returns `SqliteError::TableMissing` if the table does not exist.
pub fn all_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let declared: String = row.get(2)?;
            Ok(ColumnInfo::new(name, ColumnType::from_declared(&declared)))
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    if columns.is_empty() {
        return Err(SqliteError::TableMissing(table.to_string()));
    }
    Ok(columns)
}

/// Data columns only (without `client_id` and `group_id`).
pub fn data_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    Ok(all_columns(conn, table)?
        .into_iter()
        .filter(|c| !is_system_column(&c.name))
        .collect())
}

/// Drop and recreate the table for a fresh ingestion.
pub fn recreate_table(conn: &Connection, table: &str, columns: &[ColumnInfo]) -> Result<()> {
    let mut definitions = vec![format!("{} INTEGER PRIMARY KEY", quote_ident(CLIENT_ID_COLUMN))];
    definitions.extend(
        columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.as_sql())),
    );
    definitions.push(format!("{} INTEGER", quote_ident(GROUP_ID_COLUMN)));

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} ({columns});",
        table = quote_ident(table),
        columns = definitions.join(", ")
    ))?;
    Ok(())
}

/// Add the `group_id` column to a table created elsewhere, if it is missing.
pub fn ensure_group_column(conn: &Connection, table: &str) -> Result<()> {
    let has_group = all_columns(conn, table)?
        .iter()
        .any(|c| c.name.eq_ignore_ascii_case(GROUP_ID_COLUMN));
    if !has_group {
        conn.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN {} INTEGER",
                quote_ident(table),
                quote_ident(GROUP_ID_COLUMN)
            ),
            [],
        )?;
    }
    Ok(())
}

/// Index name for a column, unique per table.
pub fn index_name(table: &str, column: &str) -> String {
    format!("idx_{}_{}", table, column)
}
