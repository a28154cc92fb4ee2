//! Connection facade: the object callers interact with.
//!
//! Stateless beyond the live driver connection, the current options snapshot,
//! and the serial execution queue. Every operation allocates an action,
//! submits it through the queue, and suspends the caller until the result is
//! marshalled back.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::actions::{
    self, Action, Batch, Callable, Commit, Execute, GetTransactionIsolation, Query, Rollback,
    SetAutoCommit, SetTransactionIsolation, StreamQuery, Update,
};
use crate::driver::DriverConnection;
use crate::error::SqlBridgeError;
use crate::hooks::{NoopTracer, PoolMetrics, SpanOutcome, Tracer};
use crate::options::{SqlOptions, TransactionIsolation};
use crate::queue::TaskQueue;
use crate::stream::RowStream;
use crate::values::{RowSet, SqlValue};

struct ConnState {
    conn: Box<dyn DriverConnection>,
    closed: bool,
}

/// Async facade over one blocking driver connection.
///
/// All operations on one `SqlConnection` execute in strict submission order
/// with no overlap; operations on different connections run in parallel up to
/// the blocking pool's size.
pub struct SqlConnection {
    state: Arc<Mutex<ConnState>>,
    queue: TaskQueue,
    options: Mutex<Arc<SqlOptions>>,
    tracer: Arc<dyn Tracer>,
    metrics: Option<Arc<dyn PoolMetrics>>,
}

impl SqlConnection {
    /// Wrap a live, already-authenticated driver connection supplied by a
    /// connection provider.
    pub fn new(conn: Box<dyn DriverConnection>) -> Self {
        Self::with_hooks(conn, Arc::new(NoopTracer), None)
    }

    pub fn with_hooks(
        conn: Box<dyn DriverConnection>,
        tracer: Arc<dyn Tracer>,
        metrics: Option<Arc<dyn PoolMetrics>>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnState {
                conn,
                closed: false,
            })),
            queue: TaskQueue::new(),
            options: Mutex::new(Arc::new(SqlOptions::default())),
            tracer,
            metrics,
        }
    }

    /// Replace the options snapshot for actions submitted after this call.
    /// In-flight actions keep the snapshot they captured at construction.
    pub fn set_options(&self, options: SqlOptions) {
        let mut guard = self
            .options
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(options);
    }

    fn current_options(&self) -> Arc<SqlOptions> {
        Arc::clone(
            &self
                .options
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Run a raw job on the serial queue, wrapped in a tracing span that
    /// opens and closes in the caller's context.
    async fn run_raw<T, F>(&self, name: &'static str, job: F) -> Result<T, SqlBridgeError>
    where
        F: FnOnce(&mut ConnState) -> Result<T, SqlBridgeError> + Send + 'static,
        T: Send + 'static,
    {
        let token = self.tracer.begin(name);
        let state = Arc::clone(&self.state);
        let result = self
            .queue
            .submit(move || {
                let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                job(&mut guard)
            })
            .await;
        let outcome = match &result {
            Ok(_) => SpanOutcome::Success,
            Err(err) => SpanOutcome::Failure(err),
        };
        self.tracer.end(token, outcome);
        result
    }

    /// `options` must be the same snapshot the action captured, so that the
    /// connection-level and statement-level applications agree.
    async fn run_action<A: Action>(
        &self,
        mut action: A,
        options: Arc<SqlOptions>,
    ) -> Result<A::Output, SqlBridgeError> {
        let name = action.name();
        self.run_raw(name, move |state| {
            if state.closed {
                return Err(SqlBridgeError::ConnectionError(
                    "connection is closed".into(),
                ));
            }
            actions::apply_connection_options(state.conn.as_mut(), &options)?;
            action.run(state.conn.as_mut())
        })
        .await
    }

    /// Execute a statement for its side effect (DDL, no result).
    ///
    /// # Errors
    /// Any driver or option-application failure.
    pub async fn execute(&self, sql: &str) -> Result<(), SqlBridgeError> {
        let options = self.current_options();
        self.run_action(
            Execute::new(sql.to_owned(), Arc::clone(&options)),
            options,
        )
        .await
    }

    /// Run a query and materialize the full result set.
    ///
    /// # Errors
    /// Any driver or option-application failure.
    pub async fn query(&self, sql: &str) -> Result<RowSet, SqlBridgeError> {
        self.query_with_params(sql, Vec::new()).await
    }

    pub async fn query_with_params(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<RowSet, SqlBridgeError> {
        let options = self.current_options();
        self.run_action(
            Query::new(sql.to_owned(), params, Arc::clone(&options)),
            options,
        )
        .await
    }

    /// Open a streaming cursor instead of materializing the result set.
    ///
    /// # Errors
    /// Any driver or option-application failure while opening the cursor.
    pub async fn query_stream(&self, sql: &str) -> Result<RowStream, SqlBridgeError> {
        self.query_stream_with_params(sql, Vec::new()).await
    }

    pub async fn query_stream_with_params(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<RowStream, SqlBridgeError> {
        let options = self.current_options();
        self.run_action(
            StreamQuery::new(
                sql.to_owned(),
                params,
                Arc::clone(&options),
                self.queue.clone(),
            ),
            options,
        )
        .await
    }

    /// Run a DML statement and return the affected row count.
    ///
    /// # Errors
    /// Any driver or option-application failure.
    pub async fn update(&self, sql: &str) -> Result<u64, SqlBridgeError> {
        self.update_with_params(sql, Vec::new()).await
    }

    pub async fn update_with_params(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<u64, SqlBridgeError> {
        let options = self.current_options();
        self.run_action(
            Update::new(sql.to_owned(), params, Arc::clone(&options)),
            options,
        )
        .await
    }

    /// Call a stored procedure without parameters.
    ///
    /// # Errors
    /// Any driver or option-application failure.
    pub async fn call(&self, sql: &str) -> Result<RowSet, SqlBridgeError> {
        self.call_with_params(sql, Vec::new(), Vec::new()).await
    }

    /// Call a stored procedure with input parameters and output parameter
    /// positions; output values are returned on the result's `out_params`.
    ///
    /// # Errors
    /// Any driver or option-application failure.
    pub async fn call_with_params(
        &self,
        sql: &str,
        params: Vec<SqlValue>,
        out_positions: Vec<usize>,
    ) -> Result<RowSet, SqlBridgeError> {
        let options = self.current_options();
        self.run_action(
            Callable::new(sql.to_owned(), params, out_positions, Arc::clone(&options)),
            options,
        )
        .await
    }

    /// Run independent SQL statements as one driver batch.
    ///
    /// # Errors
    /// On failure, [`SqlBridgeError::Batch`] carries whatever partial update
    /// counts the driver supplied.
    pub async fn batch(&self, statements: Vec<String>) -> Result<Vec<i64>, SqlBridgeError> {
        let options = self.current_options();
        self.run_action(
            Batch::new(actions::BatchKind::Sql(statements), Arc::clone(&options)),
            options,
        )
        .await
    }

    /// Run one parameterized statement once per parameter row.
    ///
    /// # Errors
    /// See [`SqlConnection::batch`].
    pub async fn batch_with_params(
        &self,
        sql: &str,
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<Vec<i64>, SqlBridgeError> {
        let options = self.current_options();
        self.run_action(
            Batch::new(
                actions::BatchKind::Params {
                    sql: sql.to_owned(),
                    rows,
                },
                Arc::clone(&options),
            ),
            options,
        )
        .await
    }

    /// Run one callable statement once per parameter row, registering the
    /// matching output positions for each row.
    ///
    /// # Errors
    /// See [`SqlConnection::batch`].
    pub async fn batch_callable_with_params(
        &self,
        sql: &str,
        rows: Vec<Vec<SqlValue>>,
        out_positions: Vec<Vec<usize>>,
    ) -> Result<Vec<i64>, SqlBridgeError> {
        let options = self.current_options();
        self.run_action(
            Batch::new(
                actions::BatchKind::Callable {
                    sql: sql.to_owned(),
                    rows,
                    out_positions,
                },
                Arc::clone(&options),
            ),
            options,
        )
        .await
    }

    /// # Errors
    /// Any driver failure.
    pub async fn commit(&self) -> Result<(), SqlBridgeError> {
        self.run_action(Commit, self.current_options()).await
    }

    /// # Errors
    /// Any driver failure.
    pub async fn rollback(&self) -> Result<(), SqlBridgeError> {
        self.run_action(Rollback, self.current_options()).await
    }

    /// # Errors
    /// Any driver failure.
    pub async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), SqlBridgeError> {
        self.run_action(SetAutoCommit::new(auto_commit), self.current_options())
            .await
    }

    /// # Errors
    /// [`SqlBridgeError::UnknownIsolationLevel`] when the driver reports a raw
    /// value outside the known levels; any driver failure.
    pub async fn get_transaction_isolation(
        &self,
    ) -> Result<TransactionIsolation, SqlBridgeError> {
        self.run_action(GetTransactionIsolation, self.current_options())
            .await
    }

    /// # Errors
    /// Any driver failure.
    pub async fn set_transaction_isolation(
        &self,
        isolation: TransactionIsolation,
    ) -> Result<(), SqlBridgeError> {
        self.run_action(SetTransactionIsolation::new(isolation), self.current_options())
            .await
    }

    /// Close the connection. Idempotent: a second close is an empty success.
    /// The pool-metrics hook is notified exactly once per connection, whether
    /// or not the driver-level close succeeded; the driver failure itself is
    /// still surfaced.
    ///
    /// # Errors
    /// The driver's close failure.
    pub async fn close(&self) -> Result<(), SqlBridgeError> {
        let metrics = self.metrics.clone();
        self.run_raw("close", move |state| {
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            let result = state.conn.close();
            if let Some(metrics) = metrics {
                metrics.connection_closed();
            }
            Ok(result?)
        })
        .await
    }

    /// Fire-and-forget close: a failure is logged instead of returned.
    pub async fn close_quietly(&self) {
        if let Err(err) = self.close().await {
            tracing::error!(error = %err, "failure in closing connection");
        }
    }

    /// The connection's serial queue, for code that needs to order custom
    /// work relative to this connection's statements.
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }
}

impl std::fmt::Debug for SqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlConnection")
            .field("pending", &self.queue.pending())
            .finish()
    }
}

/// Facade-shaped contract for generic code that runs against any bridge
/// connection.
#[async_trait]
pub trait SqlExecutor {
    /// Executes a statement for its side effect only.
    async fn execute(&self, sql: &str) -> Result<(), SqlBridgeError>;

    /// Executes a query and materializes the result set.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet, SqlBridgeError>;

    /// Executes a DML statement and returns the affected row count.
    async fn update(&self, sql: &str, params: &[SqlValue]) -> Result<u64, SqlBridgeError>;
}

#[async_trait]
impl SqlExecutor for SqlConnection {
    async fn execute(&self, sql: &str) -> Result<(), SqlBridgeError> {
        SqlConnection::execute(self, sql).await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet, SqlBridgeError> {
        self.query_with_params(sql, params.to_vec()).await
    }

    async fn update(&self, sql: &str, params: &[SqlValue]) -> Result<u64, SqlBridgeError> {
        self.update_with_params(sql, params.to_vec()).await
    }
}
