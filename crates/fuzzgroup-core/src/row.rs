//! Row model shared by the engine and the row-store backends

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::error::GroupError;

/// Stable row identifier assigned by the row store.
pub type ClientId = i64;

/// Group identifier assigned by a grouping run (1..=N).
pub type GroupId = i64;

/// Name of the identity column every row store exposes.
pub const CLIENT_ID_COLUMN: &str = "client_id";

/// Name of the column the engine writes group ids into.
pub const GROUP_ID_COLUMN: &str = "group_id";

/// Returns true for columns managed by the row store itself.
pub fn is_system_column(name: &str) -> bool {
    name.eq_ignore_ascii_case(CLIENT_ID_COLUMN) || name.eq_ignore_ascii_case(GROUP_ID_COLUMN)
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Text form used as the input to normalization. Null becomes "".
    pub fn key_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Integer(i) => Cow::Owned(i.to_string()),
            Value::Real(f) => Cow::Owned(f.to_string()),
            Value::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(i),
            // Non-finite reals have no JSON form
            Value::Real(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s),
        }
    }
}

/// Declared storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    /// SQL type keyword for this column type.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Map a declared SQL type to a column type using SQLite affinity rules.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            ColumnType::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnType::Real
        } else {
            ColumnType::Text
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A data column as reported by the row store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Reference columns for one grouping run, validated against the store schema.
///
/// The only way to build one is [`ColumnSet::validate`], so every name it
/// carries is known to exist in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    names: Vec<String>,
}

impl ColumnSet {
    /// Validate caller-supplied column names against the store's columns.
    ///
    /// Duplicates are dropped keeping first occurrence. Empty selections,
    /// system columns, and unknown names are schema errors.
    pub fn validate<S: AsRef<str>>(
        requested: &[S],
        available: &[ColumnInfo],
    ) -> Result<Self, GroupError> {
        if requested.is_empty() {
            return Err(GroupError::Schema("no reference columns requested".into()));
        }

        let mut names: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            let name = name.as_ref();
            let known = available.iter().find(|c| c.name == name);
            match known {
                Some(column) if !is_system_column(&column.name) => {
                    if !names.iter().any(|n| n == name) {
                        names.push(column.name.clone());
                    }
                }
                _ => return Err(GroupError::Schema(format!("unknown column '{}'", name))),
            }
        }

        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a column within the set.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// A row as produced by a scan: identity plus values for the scanned columns,
/// in [`ColumnSet`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub client_id: ClientId,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(client_id: ClientId, values: Vec<Value>) -> Self {
        Self { client_id, values }
    }
}

/// A full row as read back from the store after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub client_id: ClientId,
    pub group_id: Option<GroupId>,
    /// All data columns in table order.
    pub values: Vec<(String, Value)>,
}

/// Quote an identifier for SQL, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
