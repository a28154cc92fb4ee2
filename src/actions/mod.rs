//! Action framework: every SQL operation is one [`Action`] executed once on
//! the connection's serial queue.
//!
//! The dispatch layer (in `connection`) applies connection-level options
//! before the variant body runs; the helpers here apply statement-level
//! options to freshly prepared statements and keep resource release off the
//! error-masking path.

mod batch;
mod callable;
mod query;
mod stream_query;
mod tx;
mod update;

pub(crate) use batch::{Batch, BatchKind};
pub(crate) use callable::Callable;
pub(crate) use query::Query;
pub(crate) use stream_query::StreamQuery;
pub(crate) use tx::{
    Commit, GetTransactionIsolation, Rollback, SetAutoCommit, SetTransactionIsolation,
};
pub(crate) use update::{Execute, Update};

use std::sync::Arc;

use crate::driver::{DriverConnection, DriverRows, DriverStatement};
use crate::error::SqlBridgeError;
use crate::options::SqlOptions;
use crate::values::{DbRow, RowSet};

/// One discrete SQL operation plus its option snapshot, executed once on a
/// worker thread with exclusive access to the driver connection.
pub(crate) trait Action: Send + 'static {
    type Output: Send + 'static;

    /// Label used for the tracing span and diagnostics.
    fn name(&self) -> &'static str;

    fn run(&mut self, conn: &mut dyn DriverConnection) -> Result<Self::Output, SqlBridgeError>;
}

/// Apply connection-level options, only where explicitly set. Mutates
/// connection-wide driver state; racing callers are serialized by the queue,
/// not by this function.
pub(crate) fn apply_connection_options(
    conn: &mut dyn DriverConnection,
    options: &SqlOptions,
) -> Result<(), SqlBridgeError> {
    if options.is_read_only() {
        conn.set_read_only(true)?;
    }
    if let Some(catalog) = options.get_catalog() {
        conn.set_catalog(catalog)?;
    }
    if let Some(schema) = options.get_schema() {
        conn.set_schema(schema)?;
    }
    Ok(())
}

/// Apply statement-level options to a newly prepared statement, only where
/// explicitly set.
pub(crate) fn apply_statement_options(
    stmt: &mut dyn DriverStatement,
    options: &SqlOptions,
) -> Result<(), SqlBridgeError> {
    if options.get_query_timeout_secs() > 0 {
        stmt.set_query_timeout(options.get_query_timeout_secs())?;
    }
    if let Some(direction) = options.get_fetch_direction() {
        stmt.set_fetch_direction(direction)?;
    }
    if options.get_fetch_size() > 0 {
        stmt.set_fetch_size(options.get_fetch_size())?;
    }
    Ok(())
}

/// Close a statement after its logical result is already decided. A release
/// failure here must not mask that result, so it is only logged.
pub(crate) fn close_statement_quietly(stmt: &mut dyn DriverStatement) {
    if let Err(err) = stmt.close() {
        tracing::warn!(error = %err, "failed to close statement");
    }
}

pub(crate) fn close_rows_quietly(rows: &mut dyn DriverRows) {
    if let Err(err) = rows.close() {
        tracing::warn!(error = %err, "failed to close result set");
    }
}

/// Materialize an open cursor into a [`RowSet`].
pub(crate) fn build_row_set(rows: &mut dyn DriverRows) -> Result<RowSet, SqlBridgeError> {
    let column_names = Arc::new(rows.column_names());
    let mut row_set = RowSet::with_capacity(10);
    row_set.set_column_names(Arc::clone(&column_names));
    while let Some(values) = rows.next_row()? {
        row_set.add_row(DbRow::new(Arc::clone(&column_names), values));
    }
    Ok(row_set)
}

/// Prepare, configure, bind, and execute a statement, materializing any rows.
/// Shared body of the query-shaped actions.
pub(crate) fn run_materialized_query(
    stmt: &mut dyn DriverStatement,
    params: &[crate::values::SqlValue],
    options: &SqlOptions,
) -> Result<RowSet, SqlBridgeError> {
    apply_statement_options(stmt, options)?;
    stmt.bind(params)?;
    match stmt.execute()? {
        Some(mut rows) => {
            let result = build_row_set(rows.as_mut());
            close_rows_quietly(rows.as_mut());
            result
        }
        None => Ok(RowSet::default()),
    }
}
