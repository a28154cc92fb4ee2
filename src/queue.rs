//! Per-connection serial execution queue.
//!
//! A [`TaskQueue`] is bound 1:1 to a connection and guarantees that blocking
//! jobs submitted for that connection run one at a time, in submission order,
//! while the actual execution happens on the runtime's shared bounded blocking
//! pool. Parallelism across connections comes from the pool; the queue removes
//! it within one connection.
//!
//! A failing job never blocks the jobs behind it: the drainer advances as soon
//! as the current job returns, success or failure.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::SqlBridgeError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// FIFO ordering discipline for one connection's blocking jobs.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Mutex<QueueState>>,
}

struct QueueState {
    jobs: VecDeque<Job>,
    // True while some blocking-pool thread is pulling from this queue. Only
    // one drainer exists at a time; that is the whole serialization argument.
    draining: bool,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueState {
                jobs: VecDeque::new(),
                draining: false,
            })),
        }
    }

    /// Submit a blocking job and get a future for its result.
    ///
    /// The job is enqueued synchronously, so the FIFO position is fixed the
    /// moment `submit` returns, regardless of when (or from which task) the
    /// returned future is polled.
    ///
    /// # Errors
    /// The future resolves to [`SqlBridgeError::ConnectionError`] if the queue
    /// is torn down before the job completes (e.g. runtime shutdown).
    pub fn submit<T, F>(&self, job: F) -> Submitted<T>
    where
        F: FnOnce() -> Result<T, SqlBridgeError> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let wrapped: Job = Box::new(move || {
            // Receiver may have been dropped; the job still ran, which is all
            // the ordering contract promises.
            let _ = tx.send(job());
        });
        self.enqueue(wrapped);
        Submitted { rx }
    }

    /// Number of jobs waiting or running.
    pub fn pending(&self) -> usize {
        let state = lock(&self.inner);
        state.jobs.len() + usize::from(state.draining)
    }

    fn enqueue(&self, job: Job) {
        let needs_drainer = {
            let mut state = lock(&self.inner);
            state.jobs.push_back(job);
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };
        if needs_drainer {
            let inner = Arc::clone(&self.inner);
            tokio::task::spawn_blocking(move || drain(&inner));
        }
    }
}

fn drain(inner: &Mutex<QueueState>) {
    loop {
        let job = {
            let mut state = lock(inner);
            match state.jobs.pop_front() {
                Some(job) => job,
                None => {
                    state.draining = false;
                    return;
                }
            }
        };
        job();
    }
}

fn lock(inner: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    // Jobs never run while the lock is held, so poisoning can only come from
    // a panic in the queue bookkeeping itself; recover rather than wedge the
    // connection.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Future for a submitted job's result.
pub struct Submitted<T> {
    rx: oneshot::Receiver<Result<T, SqlBridgeError>>,
}

impl<T> Future for Submitted<T> {
    type Output = Result<T, SqlBridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SqlBridgeError::ConnectionError(
                "execution queue dropped the job before completion".into(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn jobs_run_in_submission_order() {
        let queue = TaskQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let futures: Vec<_> = (0..16)
            .map(|i| {
                let order = Arc::clone(&order);
                queue.submit(move || {
                    // Uneven durations must not reorder execution.
                    std::thread::sleep(Duration::from_millis(if i % 2 == 0 { 10 } else { 1 }));
                    order.lock().unwrap().push(i);
                    Ok(i)
                })
            })
            .collect();

        for (i, fut) in futures.into_iter().enumerate() {
            assert_eq!(fut.await.unwrap(), i);
        }
        assert_eq!(*order.lock().unwrap(), (0..16).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failing_job_does_not_block_the_next() {
        let queue = TaskQueue::new();
        let failed = queue.submit(|| -> Result<(), SqlBridgeError> {
            Err(SqlBridgeError::ExecutionError("boom".into()))
        });
        let ok = queue.submit(|| Ok(42));
        assert!(failed.await.is_err());
        assert_eq!(ok.await.unwrap(), 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn at_most_one_job_in_flight() {
        let queue = TaskQueue::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let futures: Vec<_> = (0..8)
            .map(|_| {
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                queue.submit(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        for fut in futures {
            fut.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
