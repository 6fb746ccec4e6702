//! CSV ingestion into the row table
//!
//! Each uploaded file is parsed with the `csv` crate and loaded in its own
//! transaction. The first file of a call replaces the table, later files
//! append to it. A failing file aborts the call, but files before it stay
//! committed.

use fuzzgroup_core::row::{
    quote_ident, ColumnInfo, ColumnType, Value, CLIENT_ID_COLUMN, GROUP_ID_COLUMN,
};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, SqliteError};
use crate::schema;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// How a file is applied to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Drop the table and recreate it from this file's header
    Replace,
    /// Insert into the existing table; headers must match its columns
    Append,
}

/// A parsed CSV file: header plus raw cells, empty cells as `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<Option<String>>>,
}

/// Parse CSV bytes, sniffing the delimiter from the first lines.
pub fn parse_csv(bytes: &[u8]) -> Result<CsvTable> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let delimiter = sniff_delimiter(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
    }

    Ok(CsvTable { headers, records })
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (comma, semicolon, tab, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins; comma on ties.
pub fn sniff_delimiter(content: &[u8]) -> u8 {
    let candidates: &[u8] = &[b',', b';', b'\t', b'|'];
    let sample_lines: Vec<&[u8]> = content
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .take(10)
        .collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(*line)
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        let target = counts.first().copied().unwrap_or(0);
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Infer a storage type per column: integer if every non-empty cell parses
/// as one, real if every cell parses as a float, text otherwise.
pub fn infer_types(table: &CsvTable) -> Vec<ColumnType> {
    (0..table.headers.len())
        .map(|column| {
            let mut cells = table
                .records
                .iter()
                .filter_map(|r| r.get(column).and_then(|c| c.as_deref()))
                .map(str::trim)
                .peekable();

            if cells.peek().is_none() {
                return ColumnType::Text;
            }

            let mut column_type = ColumnType::Integer;
            for cell in cells {
                if column_type == ColumnType::Integer && cell.parse::<i64>().is_err() {
                    column_type = ColumnType::Real;
                }
                if column_type == ColumnType::Real && cell.parse::<f64>().is_err() {
                    return ColumnType::Text;
                }
            }
            column_type
        })
        .collect()
}

/// Convert a raw cell to a value of the column's type. Cells that do not
/// parse are kept as text, as SQLite's column affinity would.
pub fn parse_cell(raw: Option<&str>, column_type: ColumnType) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    match column_type {
        ColumnType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        ColumnType::Real => raw
            .trim()
            .parse::<f64>()
            .map(Value::Real)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        ColumnType::Text => Value::Text(raw.to_string()),
    }
}

fn to_sql(value: Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(i) => rusqlite::types::Value::Integer(i),
        Value::Real(f) => rusqlite::types::Value::Real(f),
        Value::Text(s) => rusqlite::types::Value::Text(s),
    }
}

fn reject(file: usize, reason: impl Into<String>) -> SqliteError {
    SqliteError::Ingestion {
        file,
        reason: reason.into(),
    }
}

/// Check header names and locate the optional `client_id` column.
fn validate_headers(file: usize, headers: &[String]) -> Result<Option<usize>> {
    if headers.is_empty() {
        return Err(reject(file, "file has no header row"));
    }

    let mut client_id = None;
    for (i, header) in headers.iter().enumerate() {
        if header.trim().is_empty() {
            return Err(reject(file, format!("column {} has an empty name", i + 1)));
        }
        if headers[..i].contains(header) {
            return Err(reject(file, format!("duplicate column '{}'", header)));
        }
        if header.eq_ignore_ascii_case(GROUP_ID_COLUMN) {
            return Err(reject(file, format!("'{}' is a reserved column", GROUP_ID_COLUMN)));
        }
        if header.eq_ignore_ascii_case(CLIENT_ID_COLUMN) {
            client_id = Some(i);
        }
    }
    Ok(client_id)
}

/// Load one file into the table inside a single transaction.
///
/// Returns the number of inserted rows. `file` is the 1-based position of
/// the file in the upload, used in error messages.
pub fn load_file(
    conn: &mut Connection,
    table: &str,
    file: usize,
    bytes: &[u8],
    mode: LoadMode,
) -> Result<usize> {
    let parsed = parse_csv(bytes).map_err(|e| e.in_file(file))?;
    let client_id_at = validate_headers(file, &parsed.headers)?;

    // Position in the file and storage type of every data column
    let data: Vec<(usize, ColumnInfo)> = match mode {
        LoadMode::Replace => {
            let types = infer_types(&parsed);
            parsed
                .headers
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != client_id_at)
                .map(|(i, name)| (i, ColumnInfo::new(name.clone(), types[i])))
                .collect()
        }
        LoadMode::Append => {
            let existing = schema::data_columns(conn, table).map_err(|e| e.in_file(file))?;
            let data_headers = parsed.headers.len() - usize::from(client_id_at.is_some());
            if data_headers != existing.len() {
                return Err(reject(
                    file,
                    format!(
                        "expected {} columns to append, found {}",
                        existing.len(),
                        data_headers
                    ),
                ));
            }
            existing
                .into_iter()
                .map(|column| {
                    parsed
                        .headers
                        .iter()
                        .position(|h| *h == column.name)
                        .map(|i| (i, column.clone()))
                        .ok_or_else(|| {
                            reject(file, format!("column '{}' missing from file", column.name))
                        })
                })
                .collect::<Result<_>>()?
        }
    };

    let tx = conn.transaction().map_err(|e| SqliteError::from(e).in_file(file))?;

    if mode == LoadMode::Replace {
        let columns: Vec<ColumnInfo> = data.iter().map(|(_, c)| c.clone()).collect();
        schema::recreate_table(&tx, table, &columns).map_err(|e| e.in_file(file))?;
        debug!(table, columns = columns.len(), "table recreated");
    }

    let mut names: Vec<String> = Vec::with_capacity(data.len() + 1);
    if client_id_at.is_some() {
        names.push(quote_ident(CLIENT_ID_COLUMN));
    }
    names.extend(data.iter().map(|(_, c)| quote_ident(&c.name)));
    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names.join(", "),
        placeholders
    );

    let inserted = {
        let mut stmt = tx.prepare(&sql).map_err(|e| SqliteError::from(e).in_file(file))?;
        for (line, record) in parsed.records.iter().enumerate() {
            let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(names.len());

            if let Some(at) = client_id_at {
                let id = match record.get(at).and_then(|c| c.as_deref()) {
                    None => Value::Null,
                    Some(raw) => raw.trim().parse::<i64>().map(Value::Integer).map_err(|_| {
                        reject(
                            file,
                            format!("row {}: client_id '{}' is not an integer", line + 1, raw),
                        )
                    })?,
                };
                params.push(to_sql(id));
            }

            for (position, column) in &data {
                let raw = record.get(*position).and_then(|c| c.as_deref());
                params.push(to_sql(parse_cell(raw, column.column_type)));
            }

            stmt.execute(rusqlite::params_from_iter(params))
                .map_err(|e| SqliteError::from(e).in_file(file))?;
        }
        parsed.records.len()
    };

    tx.commit().map_err(|e| SqliteError::from(e).in_file(file))?;

    info!(table, file, rows = inserted, mode = ?mode, "file ingested");
    Ok(inserted)
}
