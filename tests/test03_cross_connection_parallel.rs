use std::time::{Duration, Instant};

use sql_bridge::SqlConnection;
use sql_bridge::test_utils::{StubConnection, StubProbe};

/// Different connections share the blocking pool, so two delayed actions on
/// two connections take roughly one delay, not two.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn connections_execute_in_parallel() {
    let delay = Duration::from_millis(300);
    let conn_a = SqlConnection::new(Box::new(
        StubConnection::new(StubProbe::new()).with_delay(delay),
    ));
    let conn_b = SqlConnection::new(Box::new(
        StubConnection::new(StubProbe::new()).with_delay(delay),
    ));

    let started = Instant::now();
    let (a, b) = tokio::join!(
        conn_a.update("UPDATE a SET v = 1"),
        conn_b.update("UPDATE b SET v = 1"),
    );
    a.unwrap();
    b.unwrap();

    let elapsed = started.elapsed();
    assert!(
        elapsed < delay * 2 - Duration::from_millis(50),
        "expected parallel execution, took {elapsed:?}"
    );
}
