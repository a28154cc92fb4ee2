use sql_bridge::test_utils::{StubConnection, StubProbe, is_stream_closed, numbered_rows};
use sql_bridge::{SqlConnection, SqlOptions, SqlValue};

fn streaming_conn(probe: &std::sync::Arc<StubProbe>, total_rows: usize) -> SqlConnection {
    let stub =
        StubConnection::new(probe.clone()).with_rows(vec!["id", "name"], numbered_rows(total_rows));
    let conn = SqlConnection::new(Box::new(stub));
    conn.set_options(SqlOptions::new().fetch_size(100));
    conn
}

/// 300 rows at fetch size 100: three full batches, then exhaustion with zero
/// rows, with the statement and result set released exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exhaustion_after_three_batches() {
    let probe = StubProbe::new();
    let conn = streaming_conn(&probe, 300);

    let stream = conn.query_stream("SELECT id, name FROM big").await.unwrap();
    for batch_no in 0..3 {
        let batch = stream.fetch(None).await.unwrap();
        assert_eq!(batch.len(), 100, "batch {batch_no}");
    }
    let empty = stream.fetch(None).await.unwrap();
    assert!(empty.is_empty());
    assert!(stream.is_closed());
    assert_eq!(probe.statements_closed(), 1);
    assert_eq!(probe.rows_closed(), 1);

    // Close after natural exhaustion is a no-op, twice over.
    stream.close().await.unwrap();
    stream.close().await.unwrap();
    assert_eq!(probe.statements_closed(), 1);

    // But an explicitly closed stream refuses further fetches.
    let err = stream.fetch(None).await.unwrap_err();
    assert!(is_stream_closed(&err));
}

/// Rows come back in result-set order with usable column lookups.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rows_preserve_order_and_columns() {
    let probe = StubProbe::new();
    let conn = streaming_conn(&probe, 5);

    let stream = conn.query_stream("SELECT id, name FROM small").await.unwrap();
    let batch = stream.fetch(Some(3)).await.unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[2].get("id"), Some(&SqlValue::Int(2)));
    assert_eq!(batch[2].get("name").and_then(SqlValue::as_text), Some("row-2"));

    let rest = stream.fetch(Some(10)).await.unwrap();
    assert_eq!(rest.len(), 2);
    assert!(stream.is_closed());
}

/// A cursor error closes the stream, releases resources once, and surfaces
/// the driver failure; later fetches report the closed state.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_error_closes_the_stream() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe.clone())
        .with_rows(vec!["id", "name"], numbered_rows(50))
        .fail_row_at(7);
    let conn = SqlConnection::new(Box::new(stub));

    let stream = conn.query_stream("SELECT id, name FROM flaky").await.unwrap();
    let err = stream.fetch(Some(20)).await.unwrap_err();
    assert_eq!(err.driver_code(), Some(9901));
    assert!(stream.is_closed());
    assert_eq!(probe.statements_closed(), 1);
    assert_eq!(probe.rows_closed(), 1);

    let err = stream.fetch(None).await.unwrap_err();
    assert!(is_stream_closed(&err));
}

/// A statement with no result set yields a stream that starts exhausted.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn update_statement_streams_nothing() {
    let probe = StubProbe::new();
    let conn = streaming_conn(&probe, 10);

    let stream = conn.query_stream("UPDATE t SET v = 1").await.unwrap();
    assert!(stream.column_names().is_empty());
    let batch = stream.fetch(None).await.unwrap();
    assert!(batch.is_empty());
    assert!(stream.is_closed());
    stream.close().await.unwrap();
}

/// Push mode drains everything unless paused; an explicit fetch still works
/// while paused.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pipe_honors_pause_and_resume() {
    let probe = StubProbe::new();
    let conn = streaming_conn(&probe, 250);

    let stream = conn.query_stream("SELECT id, name FROM big").await.unwrap();

    stream.pause();
    assert!(stream.is_paused());
    let done = stream.pipe(|_| {}).await.unwrap();
    assert!(!done, "paused pipe must stop before fetching");

    // Explicit fetch is honored while paused.
    let batch = stream.fetch(Some(10)).await.unwrap();
    assert_eq!(batch.len(), 10);

    stream.resume();
    let mut seen = 0usize;
    let done = stream.pipe(|_| seen += 1).await.unwrap();
    assert!(done);
    assert_eq!(seen, 240);
    assert!(stream.is_closed());
}

/// Stored-procedure syntax routes through prepare_call, including the
/// output-marker form.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn call_syntax_uses_callable_statement() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe.clone()).with_rows(vec!["id", "name"], numbered_rows(2));
    let conn = SqlConnection::new(Box::new(stub));

    let stream = conn.query_stream("{ call list_users() }").await.unwrap();
    stream.close().await.unwrap();
    assert!(
        probe
            .applied()
            .contains(&"prepare_call:{ call list_users() }".to_string())
    );
}
