use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Values that can be bound to a statement or read back from a row
///
/// This enum provides a unified representation of database values so the
/// action layer stays independent of any particular driver's type system.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<&i64> {
        if let SqlValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<&bool> {
        if let SqlValue::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let SqlValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Try "YYYY-MM-DD HH:MM:SS.SSS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S.%3f") {
                return Some(dt);
            }
        }
        None
    }

    pub fn as_float(&self) -> Option<f64> {
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        if let SqlValue::Json(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

/// A single row of a query result
///
/// Column names are shared across all rows of a result set.
#[derive(Debug, Clone)]
pub struct DbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<SqlValue>,
    // Cache of column name to index to avoid repeated string comparisons
    #[doc(hidden)]
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl DbRow {
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        let cache = Arc::new(
            column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<HashMap<_, _>>(),
        );
        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    /// Get the index of a column by name, or None if not found
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }
}

/// Materialized result of a non-streaming query
///
/// For callable statements, registered output parameter values are returned
/// in `out_params` alongside any row data.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    /// Column names, shared with every row in `rows`
    pub column_names: Arc<Vec<String>>,
    /// The rows returned by the query
    pub rows: Vec<DbRow>,
    /// Output parameter values for callable statements (empty otherwise)
    pub out_params: Vec<SqlValue>,
}

impl RowSet {
    /// Create a result set with a known row capacity
    pub fn with_capacity(capacity: usize) -> RowSet {
        RowSet {
            column_names: Arc::new(Vec::new()),
            rows: Vec::with_capacity(capacity),
            out_params: Vec::new(),
        }
    }

    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_names = column_names;
    }

    pub fn add_row(&mut self, row: DbRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
