//! Blocking driver contract consumed by the action layer.
//!
//! These traits mirror the synchronous, single-threaded-per-connection driver
//! the bridge wraps. Implementations are supplied by an external connection
//! provider; the bridge never authenticates, pools, or reconnects. All calls
//! are made from jobs running on the connection's serial execution queue, so
//! an implementation never sees two concurrent calls for one connection.

use thiserror::Error;

use crate::options::FetchDirection;
use crate::values::SqlValue;

/// Failure raised by the underlying driver, preserving the native error code
/// and SQLSTATE when the driver supplies them.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
    /// Vendor-specific error code, when available
    pub code: Option<i32>,
    /// Five-character SQLSTATE, when available
    pub sqlstate: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            sqlstate: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Batch execution failure carrying whatever per-statement update counts the
/// driver produced before the failing entry.
#[derive(Debug, Error)]
#[error("batch aborted after {} completed statement(s): {error}", partial_counts.len())]
pub struct BatchFailure {
    /// Update counts for the statements that completed before the failure
    pub partial_counts: Vec<i64>,
    #[source]
    pub error: DriverError,
}

/// One live, already-authenticated driver connection.
///
/// Exclusively owned by its [`SqlConnection`](crate::SqlConnection) facade and
/// only touched from serial-queue jobs.
pub trait DriverConnection: Send {
    /// Prepare a parameterized statement.
    fn prepare(&mut self, sql: &str) -> DriverResult<Box<dyn DriverStatement>>;

    /// Prepare a stored-procedure call statement.
    fn prepare_call(&mut self, sql: &str) -> DriverResult<Box<dyn DriverStatement>>;

    /// Create an unparameterized statement, used for plain SQL batches.
    fn create_statement(&mut self) -> DriverResult<Box<dyn DriverStatement>>;

    fn set_read_only(&mut self, read_only: bool) -> DriverResult<()>;

    fn set_catalog(&mut self, catalog: &str) -> DriverResult<()>;

    fn set_schema(&mut self, schema: &str) -> DriverResult<()>;

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()>;

    fn commit(&mut self) -> DriverResult<()>;

    fn rollback(&mut self) -> DriverResult<()>;

    /// Raw isolation level as reported by the driver.
    fn transaction_isolation(&mut self) -> DriverResult<i32>;

    fn set_transaction_isolation(&mut self, raw: i32) -> DriverResult<()>;

    fn close(&mut self) -> DriverResult<()>;
}

/// A prepared (or plain) driver statement.
///
/// Parameter coercion happens behind [`DriverStatement::bind`]; the bridge
/// hands over [`SqlValue`]s and does not define coercion rules.
pub trait DriverStatement: Send {
    fn set_query_timeout(&mut self, secs: u32) -> DriverResult<()>;

    fn set_fetch_size(&mut self, rows: i32) -> DriverResult<()>;

    fn set_fetch_direction(&mut self, direction: FetchDirection) -> DriverResult<()>;

    /// Bind positional parameters.
    fn bind(&mut self, params: &[SqlValue]) -> DriverResult<()>;

    /// Register an output parameter position (callable statements only).
    fn register_out(&mut self, position: usize) -> DriverResult<()>;

    /// Execute; returns a cursor when the statement produced a result set.
    fn execute(&mut self) -> DriverResult<Option<Box<dyn DriverRows>>>;

    /// Execute a DML/DDL statement and return the affected row count.
    fn execute_update(&mut self) -> DriverResult<u64>;

    /// Queue a plain SQL string for batch execution.
    fn add_batch_sql(&mut self, sql: &str) -> DriverResult<()>;

    /// Queue one set of bound parameters for batch execution.
    fn add_batch(&mut self, params: &[SqlValue]) -> DriverResult<()>;

    /// Run the queued batch, returning per-entry update counts.
    fn execute_batch(&mut self) -> Result<Vec<i64>, BatchFailure>;

    /// Collect registered output parameter values after execution.
    fn take_out_params(&mut self) -> DriverResult<Vec<SqlValue>>;

    fn close(&mut self) -> DriverResult<()>;
}

/// Open cursor over a statement's result set.
pub trait DriverRows: Send {
    fn column_names(&self) -> Vec<String>;

    /// Pull the next row, or None when the result set is exhausted.
    fn next_row(&mut self) -> DriverResult<Option<Vec<SqlValue>>>;

    fn close(&mut self) -> DriverResult<()>;
}
