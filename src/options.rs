//! Per-connection / per-statement tuning options.
//!
//! An [`SqlOptions`] value is an immutable snapshot: the facade replaces it
//! wholesale on `set_options`, and every action captures the current snapshot
//! at construction time. Zero, negative, or absent values mean "keep the
//! driver default" and are never pushed down.

use serde::{Deserialize, Serialize};

/// Fetch direction hint for a driver statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchDirection {
    Forward,
    Reverse,
    Unknown,
}

impl FetchDirection {
    /// Raw driver constant for this direction.
    pub fn raw(self) -> i32 {
        match self {
            FetchDirection::Forward => 1000,
            FetchDirection::Reverse => 1001,
            FetchDirection::Unknown => 1002,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1000 => Some(FetchDirection::Forward),
            1001 => Some(FetchDirection::Reverse),
            1002 => Some(FetchDirection::Unknown),
            _ => None,
        }
    }
}

/// Transaction isolation levels understood by the bridge.
///
/// A raw driver value outside this set is a hard failure at the action layer,
/// never silently coerced to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionIsolation {
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl TransactionIsolation {
    /// Raw driver constant for this level.
    pub fn raw(self) -> i32 {
        match self {
            TransactionIsolation::None => 0,
            TransactionIsolation::ReadUncommitted => 1,
            TransactionIsolation::ReadCommitted => 2,
            TransactionIsolation::RepeatableRead => 4,
            TransactionIsolation::Serializable => 8,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(TransactionIsolation::None),
            1 => Some(TransactionIsolation::ReadUncommitted),
            2 => Some(TransactionIsolation::ReadCommitted),
            4 => Some(TransactionIsolation::RepeatableRead),
            8 => Some(TransactionIsolation::Serializable),
            _ => None,
        }
    }
}

/// Snapshot of connection- and statement-level settings.
///
/// Deserializes from configuration with every field optional, so a config
/// file only names the settings it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlOptions {
    read_only: bool,
    catalog: Option<String>,
    schema: Option<String>,
    query_timeout_secs: u32,
    fetch_size: i32,
    fetch_direction: Option<FetchDirection>,
}

impl SqlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Query timeout in seconds; 0 keeps the driver default.
    pub fn query_timeout_secs(mut self, secs: u32) -> Self {
        self.query_timeout_secs = secs;
        self
    }

    /// Rows fetched per driver round trip; values <= 0 keep the driver default.
    pub fn fetch_size(mut self, rows: i32) -> Self {
        self.fetch_size = rows;
        self
    }

    pub fn fetch_direction(mut self, direction: FetchDirection) -> Self {
        self.fetch_direction = Some(direction);
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn get_catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn get_schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn get_query_timeout_secs(&self) -> u32 {
        self.query_timeout_secs
    }

    pub fn get_fetch_size(&self) -> i32 {
        self.fetch_size
    }

    pub fn get_fetch_direction(&self) -> Option<FetchDirection> {
        self.fetch_direction
    }
}
