//! Async action bridge over strictly synchronous SQL drivers.
//!
//! A [`SqlConnection`] wraps one blocking driver connection and lets async
//! callers issue queries, updates, batches, stored-procedure calls,
//! transaction control, and streaming cursors without blocking the runtime.
//! Each connection owns a [`TaskQueue`] that keeps its blocking operations
//! strictly serialized and in submission order, while the runtime's blocking
//! pool provides parallelism across connections.

mod actions;
mod connection;
mod driver;
mod error;
mod hooks;
mod options;
mod queue;
mod stream;
mod values;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use connection::{SqlConnection, SqlExecutor};
pub use driver::{
    BatchFailure, DriverConnection, DriverError, DriverResult, DriverRows, DriverStatement,
};
pub use error::SqlBridgeError;
pub use hooks::{NoopTracer, PoolMetrics, SpanOutcome, SpanToken, Tracer};
pub use options::{FetchDirection, SqlOptions, TransactionIsolation};
pub use queue::{Submitted, TaskQueue};
pub use stream::RowStream;
pub use values::{DbRow, RowSet, SqlValue};
