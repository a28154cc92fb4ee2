//! Live, incrementally-fetched cursor over a statement's result set.
//!
//! Every fetch and close re-enters the owning connection's serial queue, so a
//! cursor operation can never interleave with another statement on the same
//! connection — a commit submitted after the stream was opened waits behind
//! any pending fetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::driver::{DriverRows, DriverStatement};
use crate::error::SqlBridgeError;
use crate::queue::TaskQueue;
use crate::values::DbRow;

/// Batch size used when the options carry no explicit fetch size.
pub(crate) const DEFAULT_STREAM_FETCH_SIZE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamStatus {
    Open,
    /// Driver reported no more rows; resources already released. A further
    /// fetch reports exhaustion (an empty batch), and close is a no-op.
    Exhausted,
    /// A fetch failed; resources already released.
    Failed,
    /// Explicitly closed.
    Closed,
}

struct StreamState {
    stmt: Option<Box<dyn DriverStatement>>,
    rows: Option<Box<dyn DriverRows>>,
    column_names: Arc<Vec<String>>,
    status: StreamStatus,
}

impl StreamState {
    /// Release rows then statement, exactly once. Release failures cannot
    /// mask the logical outcome, so they are only logged.
    fn release(&mut self) {
        if let Some(mut rows) = self.rows.take()
            && let Err(err) = rows.close()
        {
            tracing::warn!(error = %err, "failed to close streamed result set");
        }
        if let Some(mut stmt) = self.stmt.take()
            && let Err(err) = stmt.close()
        {
            tracing::warn!(error = %err, "failed to close streamed statement");
        }
    }
}

/// Controllable row-producing handle returned by a streaming query.
pub struct RowStream {
    state: Arc<Mutex<StreamState>>,
    queue: TaskQueue,
    fetch_size: usize,
    paused: AtomicBool,
}

impl RowStream {
    pub(crate) fn new(
        stmt: Box<dyn DriverStatement>,
        rows: Option<Box<dyn DriverRows>>,
        fetch_size: usize,
        queue: TaskQueue,
    ) -> Self {
        let column_names = Arc::new(rows.as_ref().map(|r| r.column_names()).unwrap_or_default());
        Self {
            state: Arc::new(Mutex::new(StreamState {
                stmt: Some(stmt),
                rows,
                column_names,
                status: StreamStatus::Open,
            })),
            queue,
            fetch_size,
            paused: AtomicBool::new(false),
        }
    }

    /// Column names of the underlying result set; empty when the statement
    /// produced no result set.
    pub fn column_names(&self) -> Arc<Vec<String>> {
        Arc::clone(&lock(&self.state).column_names)
    }

    /// Effective batch size: the options' fetch size, or the stream default.
    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    /// Pull up to `n` rows (the effective fetch size when `None`).
    ///
    /// An empty batch signals exhaustion; the statement and result set are
    /// released automatically at that point.
    ///
    /// # Errors
    /// [`SqlBridgeError::StreamClosed`] after an explicit close or a previous
    /// fetch failure; any driver error raised mid-fetch, after which the
    /// stream is closed and no further rows are delivered.
    pub async fn fetch(&self, n: Option<usize>) -> Result<Vec<DbRow>, SqlBridgeError> {
        let limit = n.unwrap_or(self.fetch_size).max(1);
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || {
                let mut guard = lock(&state);
                match guard.status {
                    StreamStatus::Open => {}
                    StreamStatus::Exhausted => return Ok(Vec::new()),
                    StreamStatus::Failed | StreamStatus::Closed => {
                        return Err(SqlBridgeError::StreamClosed);
                    }
                }

                let mut batch = Vec::with_capacity(limit.min(DEFAULT_STREAM_FETCH_SIZE));
                while batch.len() < limit {
                    let next = match guard.rows.as_mut() {
                        Some(rows) => rows.next_row(),
                        None => Ok(None),
                    };
                    match next {
                        Ok(Some(values)) => {
                            batch.push(DbRow::new(Arc::clone(&guard.column_names), values));
                        }
                        Ok(None) => {
                            guard.status = StreamStatus::Exhausted;
                            guard.release();
                            break;
                        }
                        Err(err) => {
                            guard.status = StreamStatus::Failed;
                            guard.release();
                            return Err(err.into());
                        }
                    }
                }
                Ok(batch)
            })
            .await
    }

    /// Stop the push-mode pump. Purely a consumer-side flag; an explicit
    /// `fetch` is still honored while paused.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Push mode: fetch batches and hand each row to `sink` until the stream
    /// is exhausted, fails, or is paused. Returns `true` when the stream ran
    /// to exhaustion, `false` when it stopped because of a pause.
    ///
    /// # Errors
    /// Propagates the first fetch error; the stream is closed at that point.
    pub async fn pipe<F>(&self, mut sink: F) -> Result<bool, SqlBridgeError>
    where
        F: FnMut(DbRow),
    {
        loop {
            if self.is_paused() {
                return Ok(false);
            }
            let batch = self.fetch(None).await?;
            if batch.is_empty() {
                return Ok(true);
            }
            for row in batch {
                sink(row);
            }
        }
    }

    /// Close the stream. Idempotent: safe after natural exhaustion or a prior
    /// close; resources are released at most once.
    ///
    /// # Errors
    /// [`SqlBridgeError::ConnectionError`] only if the queue is torn down
    /// before the close job runs.
    pub async fn close(&self) -> Result<(), SqlBridgeError> {
        let state = Arc::clone(&self.state);
        self.queue
            .submit(move || {
                let mut guard = lock(&state);
                if guard.status == StreamStatus::Open {
                    guard.release();
                }
                guard.status = StreamStatus::Closed;
                Ok(())
            })
            .await
    }

    /// True once the stream reached any terminal state.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).status != StreamStatus::Open
    }
}

fn lock(state: &Mutex<StreamState>) -> MutexGuard<'_, StreamState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
