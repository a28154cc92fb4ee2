use std::sync::Arc;
use std::time::Duration;

use sql_bridge::SqlConnection;
use sql_bridge::test_utils::{StubConnection, StubProbe};

/// Two tasks hammering the same connection never produce overlapping
/// execution windows inside the driver.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_are_serialized_per_connection() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe.clone()).with_delay(Duration::from_millis(4));
    let conn = Arc::new(SqlConnection::new(Box::new(stub)));

    let mut handles = Vec::new();
    for task in 0..4 {
        let conn = Arc::clone(&conn);
        handles.push(tokio::spawn(async move {
            for i in 0..5 {
                conn.update(&format!("UPDATE t SET v = {task}{i}"))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(probe.max_active(), 1, "driver was re-entered concurrently");
    assert_eq!(
        probe
            .entries()
            .iter()
            .filter(|e| e.starts_with("update:"))
            .count(),
        20
    );
}
