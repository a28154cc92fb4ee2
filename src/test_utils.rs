//! Instrumented stub driver for exercising the bridge without a real
//! database.
//!
//! The stub records the order in which statement bodies begin executing,
//! flags any re-entrant use of a connection, and counts resource releases, so
//! integration tests can assert the queue and streaming contracts directly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::driver::{
    BatchFailure, DriverConnection, DriverError, DriverResult, DriverRows, DriverStatement,
};
use crate::error::SqlBridgeError;
use crate::hooks::{PoolMetrics, SpanOutcome, SpanToken, Tracer};
use crate::options::FetchDirection;
use crate::values::SqlValue;

/// Shared observation point for everything the stub driver does.
#[derive(Default)]
pub struct StubProbe {
    entries: Mutex<Vec<String>>,
    applied: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    statements_closed: AtomicUsize,
    rows_closed: AtomicUsize,
    connections_closed: AtomicUsize,
    last_fetch_size: Mutex<Option<i32>>,
}

impl StubProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Labels of driver operations in the order their bodies began.
    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    /// Option values pushed down to the driver, in application order.
    pub fn applied(&self) -> Vec<String> {
        lock(&self.applied).clone()
    }

    /// Highest number of operations ever inside the driver at once. Anything
    /// above 1 means the serialization contract was broken.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn statements_closed(&self) -> usize {
        self.statements_closed.load(Ordering::SeqCst)
    }

    pub fn rows_closed(&self) -> usize {
        self.rows_closed.load(Ordering::SeqCst)
    }

    pub fn connections_closed(&self) -> usize {
        self.connections_closed.load(Ordering::SeqCst)
    }

    /// The fetch size most recently pushed down via `set_fetch_size`.
    pub fn last_fetch_size(&self) -> Option<i32> {
        *lock(&self.last_fetch_size)
    }

    fn enter(&self, label: String) -> EnterGuard<'_> {
        lock(&self.entries).push(label);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        EnterGuard { probe: self }
    }

    fn record_applied(&self, label: String) {
        lock(&self.applied).push(label);
    }
}

struct EnterGuard<'a> {
    probe: &'a StubProbe,
}

impl Drop for EnterGuard<'_> {
    fn drop(&mut self) {
        self.probe.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected_error() -> DriverError {
    DriverError::new("injected failure").with_code(1644).with_sqlstate("42000")
}

struct StubShared {
    probe: Arc<StubProbe>,
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    out_values: Vec<SqlValue>,
    delay: Option<Duration>,
    fail_on: Option<String>,
    fail_row_at: Option<usize>,
    update_count: u64,
}

impl StubShared {
    fn sleep_if_configured(&self) {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
    }

    fn should_fail(&self, sql: &str) -> bool {
        self.fail_on
            .as_deref()
            .is_some_and(|needle| sql.contains(needle))
    }
}

/// Stub connection implementing the full blocking driver contract.
pub struct StubConnection {
    shared: Arc<StubShared>,
    raw_isolation: i32,
    auto_commit: bool,
    fail_on_close: bool,
    closed: bool,
}

impl StubConnection {
    pub fn new(probe: Arc<StubProbe>) -> Self {
        Self {
            shared: Arc::new(StubShared {
                probe,
                columns: Vec::new(),
                rows: Vec::new(),
                out_values: Vec::new(),
                delay: None,
                fail_on: None,
                fail_row_at: None,
                update_count: 1,
            }),
            raw_isolation: 2,
            auto_commit: true,
            fail_on_close: false,
            closed: false,
        }
    }

    fn shared_mut(&mut self) -> &mut StubShared {
        // Config setters run before the connection is handed to the facade,
        // while this Arc is still unique.
        Arc::get_mut(&mut self.shared).expect("configure the stub before sharing it")
    }

    /// Rows every result-producing statement will yield.
    pub fn with_rows(mut self, columns: Vec<&str>, rows: Vec<Vec<SqlValue>>) -> Self {
        let shared = self.shared_mut();
        shared.columns = columns.into_iter().map(str::to_owned).collect();
        shared.rows = rows;
        self
    }

    /// Output parameter values reported for callable statements.
    pub fn with_out_values(mut self, values: Vec<SqlValue>) -> Self {
        self.shared_mut().out_values = values;
        self
    }

    /// Artificial latency inside every statement body.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.shared_mut().delay = Some(delay);
        self
    }

    /// Any SQL containing `needle` fails with an injected driver error.
    pub fn fail_on(mut self, needle: &str) -> Self {
        self.shared_mut().fail_on = Some(needle.to_owned());
        self
    }

    /// The cursor errors when asked for the row at `index`.
    pub fn fail_row_at(mut self, index: usize) -> Self {
        self.shared_mut().fail_row_at = Some(index);
        self
    }

    /// Raw isolation value the driver reports; defaults to READ_COMMITTED.
    pub fn with_raw_isolation(mut self, raw: i32) -> Self {
        self.raw_isolation = raw;
        self
    }

    pub fn with_update_count(mut self, count: u64) -> Self {
        self.shared_mut().update_count = count;
        self
    }

    /// Driver-level close reports a failure (the facade must still surface it
    /// and notify pool metrics exactly once).
    pub fn fail_on_close(mut self) -> Self {
        self.fail_on_close = true;
        self
    }

    fn statement(&self, sql: String, callable: bool) -> Box<dyn DriverStatement> {
        Box::new(StubStatement {
            shared: Arc::clone(&self.shared),
            sql,
            callable,
            out_positions: Vec::new(),
            batch_sql: Vec::new(),
            batch_rows: Vec::new(),
            closed: false,
        })
    }
}

impl DriverConnection for StubConnection {
    fn prepare(&mut self, sql: &str) -> DriverResult<Box<dyn DriverStatement>> {
        if self.shared.should_fail(sql) {
            return Err(injected_error());
        }
        Ok(self.statement(sql.to_owned(), false))
    }

    fn prepare_call(&mut self, sql: &str) -> DriverResult<Box<dyn DriverStatement>> {
        self.shared.probe.record_applied(format!("prepare_call:{sql}"));
        if self.shared.should_fail(sql) {
            return Err(injected_error());
        }
        Ok(self.statement(sql.to_owned(), true))
    }

    fn create_statement(&mut self) -> DriverResult<Box<dyn DriverStatement>> {
        Ok(self.statement(String::new(), false))
    }

    fn set_read_only(&mut self, read_only: bool) -> DriverResult<()> {
        self.shared.probe.record_applied(format!("read_only:{read_only}"));
        Ok(())
    }

    fn set_catalog(&mut self, catalog: &str) -> DriverResult<()> {
        self.shared.probe.record_applied(format!("catalog:{catalog}"));
        Ok(())
    }

    fn set_schema(&mut self, schema: &str) -> DriverResult<()> {
        self.shared.probe.record_applied(format!("schema:{schema}"));
        Ok(())
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()> {
        let _guard = self.shared.probe.enter(format!("autocommit:{auto_commit}"));
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        let _guard = self.shared.probe.enter("commit".to_owned());
        self.shared.sleep_if_configured();
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        let _guard = self.shared.probe.enter("rollback".to_owned());
        self.shared.sleep_if_configured();
        Ok(())
    }

    fn transaction_isolation(&mut self) -> DriverResult<i32> {
        let _guard = self.shared.probe.enter("isolation:get".to_owned());
        Ok(self.raw_isolation)
    }

    fn set_transaction_isolation(&mut self, raw: i32) -> DriverResult<()> {
        let _guard = self.shared.probe.enter(format!("isolation:set:{raw}"));
        self.raw_isolation = raw;
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        let _guard = self.shared.probe.enter("close".to_owned());
        if self.closed {
            return Err(DriverError::new("connection already closed"));
        }
        self.closed = true;
        self.shared
            .probe
            .connections_closed
            .fetch_add(1, Ordering::SeqCst);
        if self.fail_on_close {
            return Err(DriverError::new("close failed").with_code(8003));
        }
        Ok(())
    }
}

struct StubStatement {
    shared: Arc<StubShared>,
    sql: String,
    callable: bool,
    out_positions: Vec<usize>,
    batch_sql: Vec<String>,
    batch_rows: Vec<Vec<SqlValue>>,
    closed: bool,
}

impl StubStatement {
    fn produces_rows(&self) -> bool {
        self.callable || self.sql.trim_start().to_ascii_lowercase().starts_with("select")
    }
}

impl DriverStatement for StubStatement {
    fn set_query_timeout(&mut self, secs: u32) -> DriverResult<()> {
        self.shared.probe.record_applied(format!("timeout:{secs}"));
        Ok(())
    }

    fn set_fetch_size(&mut self, rows: i32) -> DriverResult<()> {
        *lock(&self.shared.probe.last_fetch_size) = Some(rows);
        Ok(())
    }

    fn set_fetch_direction(&mut self, direction: FetchDirection) -> DriverResult<()> {
        self.shared
            .probe
            .record_applied(format!("direction:{}", direction.raw()));
        Ok(())
    }

    fn bind(&mut self, params: &[SqlValue]) -> DriverResult<()> {
        if params
            .iter()
            .filter_map(SqlValue::as_text)
            .any(|text| self.shared.fail_on.as_deref().is_some_and(|n| text.contains(n)))
        {
            return Err(injected_error());
        }
        Ok(())
    }

    fn register_out(&mut self, position: usize) -> DriverResult<()> {
        if !self.callable {
            return Err(DriverError::new(
                "output parameters require a callable statement",
            ));
        }
        self.out_positions.push(position);
        Ok(())
    }

    fn execute(&mut self) -> DriverResult<Option<Box<dyn DriverRows>>> {
        let _guard = self.shared.probe.enter(format!("execute:{}", self.sql));
        if self.closed {
            return Err(DriverError::new("statement already closed"));
        }
        self.shared.sleep_if_configured();
        if self.shared.should_fail(&self.sql) {
            return Err(injected_error());
        }
        if !self.produces_rows() {
            return Ok(None);
        }
        Ok(Some(Box::new(StubRows {
            shared: Arc::clone(&self.shared),
            next: 0,
            closed: false,
        })))
    }

    fn execute_update(&mut self) -> DriverResult<u64> {
        let _guard = self.shared.probe.enter(format!("update:{}", self.sql));
        if self.closed {
            return Err(DriverError::new("statement already closed"));
        }
        self.shared.sleep_if_configured();
        if self.shared.should_fail(&self.sql) {
            return Err(injected_error());
        }
        Ok(self.shared.update_count)
    }

    fn add_batch_sql(&mut self, sql: &str) -> DriverResult<()> {
        self.batch_sql.push(sql.to_owned());
        Ok(())
    }

    fn add_batch(&mut self, params: &[SqlValue]) -> DriverResult<()> {
        self.batch_rows.push(params.to_vec());
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<i64>, BatchFailure> {
        let _guard = self.shared.probe.enter("batch".to_owned());
        self.shared.sleep_if_configured();
        let mut counts = Vec::new();
        for sql in &self.batch_sql {
            if self.shared.should_fail(sql) {
                return Err(BatchFailure {
                    partial_counts: counts,
                    error: injected_error(),
                });
            }
            counts.push(self.shared.update_count as i64);
        }
        for row in &self.batch_rows {
            let poisoned = row.iter().filter_map(SqlValue::as_text).any(|text| {
                self.shared
                    .fail_on
                    .as_deref()
                    .is_some_and(|n| text.contains(n))
            });
            if poisoned {
                return Err(BatchFailure {
                    partial_counts: counts,
                    error: injected_error(),
                });
            }
            counts.push(self.shared.update_count as i64);
        }
        Ok(counts)
    }

    fn take_out_params(&mut self) -> DriverResult<Vec<SqlValue>> {
        if self.shared.out_values.is_empty() {
            // Default: echo the registered positions.
            return Ok(self
                .out_positions
                .iter()
                .map(|&p| SqlValue::Int(p as i64))
                .collect());
        }
        Ok(self.shared.out_values.clone())
    }

    fn close(&mut self) -> DriverResult<()> {
        if !self.closed {
            self.closed = true;
            self.shared
                .probe
                .statements_closed
                .fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct StubRows {
    shared: Arc<StubShared>,
    next: usize,
    closed: bool,
}

impl DriverRows for StubRows {
    fn column_names(&self) -> Vec<String> {
        self.shared.columns.clone()
    }

    fn next_row(&mut self) -> DriverResult<Option<Vec<SqlValue>>> {
        if self.closed {
            return Err(DriverError::new("result set already closed"));
        }
        if self.shared.fail_row_at == Some(self.next) {
            return Err(DriverError::new("cursor failure").with_code(9901));
        }
        let row = self.shared.rows.get(self.next).cloned();
        if row.is_some() {
            self.next += 1;
        }
        Ok(row)
    }

    fn close(&mut self) -> DriverResult<()> {
        if !self.closed {
            self.closed = true;
            self.shared.probe.rows_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Pool-metrics hook that counts close notifications.
#[derive(Default)]
pub struct CountingMetrics {
    closed: AtomicUsize,
}

impl CountingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl PoolMetrics for CountingMetrics {
    fn connection_closed(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Tracer that records span begin/end pairs with their outcome.
#[derive(Default)]
pub struct RecordingTracer {
    spans: Mutex<Vec<String>>,
}

impl RecordingTracer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spans(&self) -> Vec<String> {
        lock(&self.spans).clone()
    }
}

impl Tracer for RecordingTracer {
    fn begin(&self, action: &'static str) -> SpanToken {
        lock(&self.spans).push(format!("begin:{action}"));
        Box::new(action)
    }

    fn end(&self, token: SpanToken, outcome: SpanOutcome<'_>) {
        let action = token
            .downcast::<&'static str>()
            .map_or("unknown", |name| *name);
        let status = match outcome {
            SpanOutcome::Success => "ok",
            SpanOutcome::Failure(_) => "err",
        };
        lock(&self.spans).push(format!("end:{action}:{status}"));
    }
}

/// Convenience: rows `0..n` with `id` and `name` columns.
pub fn numbered_rows(n: usize) -> Vec<Vec<SqlValue>> {
    (0..n)
        .map(|i| {
            vec![
                SqlValue::Int(i as i64),
                SqlValue::Text(format!("row-{i}")),
            ]
        })
        .collect()
}

/// The `SqlBridgeError` variants tests match on most often.
pub fn is_stream_closed(err: &SqlBridgeError) -> bool {
    matches!(err, SqlBridgeError::StreamClosed)
}
