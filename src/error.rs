use thiserror::Error;

use crate::driver::{BatchFailure, DriverError};

#[derive(Debug, Error)]
pub enum SqlBridgeError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Batch failed after {} completed statement(s): {source}", partial.len())]
    Batch {
        /// Update counts the driver reported before the failing entry
        partial: Vec<i64>,
        source: DriverError,
    },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Row stream is closed")]
    StreamClosed,

    #[error("Unknown isolation level: {0}")]
    UnknownIsolationLevel(i32),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl From<BatchFailure> for SqlBridgeError {
    fn from(failure: BatchFailure) -> Self {
        SqlBridgeError::Batch {
            partial: failure.partial_counts,
            source: failure.error,
        }
    }
}

impl SqlBridgeError {
    /// Native driver error code, when this failure originated in the driver.
    pub fn driver_code(&self) -> Option<i32> {
        match self {
            SqlBridgeError::Driver(err) => err.code,
            SqlBridgeError::Batch { source, .. } => source.code,
            _ => None,
        }
    }

    /// SQLSTATE of the underlying driver error, when available.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            SqlBridgeError::Driver(err) => err.sqlstate.as_deref(),
            SqlBridgeError::Batch { source, .. } => source.sqlstate.as_deref(),
            _ => None,
        }
    }
}
