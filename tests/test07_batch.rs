use sql_bridge::test_utils::{StubConnection, StubProbe};
use sql_bridge::{SqlBridgeError, SqlConnection, SqlValue};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sql_batch_returns_per_statement_counts() {
    let probe = StubProbe::new();
    let conn = SqlConnection::new(Box::new(StubConnection::new(probe)));

    let counts = conn
        .batch(vec![
            "INSERT INTO t VALUES (1)".into(),
            "INSERT INTO t VALUES (2)".into(),
            "INSERT INTO t VALUES (3)".into(),
        ])
        .await
        .unwrap();
    assert_eq!(counts, vec![1, 1, 1]);
}

/// When the 3rd of 5 statements fails, the failure carries the update counts
/// for statements 1 and 2.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_counts_travel_with_the_failure() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe).fail_on("boom");
    let conn = SqlConnection::new(Box::new(stub));

    let err = conn
        .batch(vec![
            "INSERT INTO t VALUES (1)".into(),
            "INSERT INTO t VALUES (2)".into(),
            "INSERT INTO t VALUES ('boom')".into(),
            "INSERT INTO t VALUES (4)".into(),
            "INSERT INTO t VALUES (5)".into(),
        ])
        .await
        .unwrap_err();

    match err {
        SqlBridgeError::Batch { partial, source } => {
            assert_eq!(partial, vec![1, 1]);
            assert_eq!(source.code, Some(1644));
        }
        other => panic!("expected Batch error, got {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parameterized_batch_runs_once_per_row() {
    let probe = StubProbe::new();
    let conn = SqlConnection::new(Box::new(StubConnection::new(probe)));

    let rows = vec![
        vec![SqlValue::Int(1), SqlValue::Text("a".into())],
        vec![SqlValue::Int(2), SqlValue::Text("b".into())],
        vec![SqlValue::Int(3), SqlValue::Text("c".into())],
    ];
    let counts = conn
        .batch_with_params("INSERT INTO t VALUES (?, ?)", rows)
        .await
        .unwrap();
    assert_eq!(counts, vec![1, 1, 1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parameterized_batch_partial_failure() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe).fail_on("boom");
    let conn = SqlConnection::new(Box::new(stub));

    let rows = vec![
        vec![SqlValue::Text("a".into())],
        vec![SqlValue::Text("b".into())],
        vec![SqlValue::Text("boom".into())],
        vec![SqlValue::Text("d".into())],
    ];
    let err = conn
        .batch_with_params("INSERT INTO t VALUES (?)", rows)
        .await
        .unwrap_err();
    match err {
        SqlBridgeError::Batch { partial, .. } => assert_eq!(partial, vec![1, 1]),
        other => panic!("expected Batch error, got {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn callable_batch_registers_outputs_per_row() {
    let probe = StubProbe::new();
    let conn = SqlConnection::new(Box::new(StubConnection::new(probe.clone())));

    let rows = vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]];
    let outs = vec![vec![2], vec![2]];
    let counts = conn
        .batch_callable_with_params("{ call sync_user(?, ?) }", rows, outs)
        .await
        .unwrap();
    assert_eq!(counts, vec![1, 1]);
    assert!(
        probe
            .applied()
            .contains(&"prepare_call:{ call sync_user(?, ?) }".to_string())
    );
}
