use sql_bridge::test_utils::{StubConnection, StubProbe, numbered_rows};
use sql_bridge::{FetchDirection, SqlConnection, SqlOptions};

/// Options set before a streaming query reach the driver statement; the
/// stream's effective fetch size follows the options.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn explicit_fetch_size_reaches_the_driver() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe.clone()).with_rows(vec!["id", "name"], numbered_rows(10));
    let conn = SqlConnection::new(Box::new(stub));

    conn.set_options(
        SqlOptions::new()
            .read_only(true)
            .catalog("main")
            .schema("public")
            .query_timeout_secs(30)
            .fetch_direction(FetchDirection::Forward)
            .fetch_size(50),
    );

    let stream = conn.query_stream("SELECT id, name FROM users").await.unwrap();
    assert_eq!(stream.fetch_size(), 50);
    assert_eq!(probe.last_fetch_size(), Some(50));

    let applied = probe.applied();
    assert!(applied.contains(&"read_only:true".to_string()));
    assert!(applied.contains(&"catalog:main".to_string()));
    assert!(applied.contains(&"schema:public".to_string()));
    assert!(applied.contains(&"timeout:30".to_string()));
    assert!(applied.contains(&format!("direction:{}", FetchDirection::Forward.raw())));

    stream.close().await.unwrap();
}

/// Without an explicit fetch size the stream uses the 128-row default.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn default_fetch_size_is_128() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe.clone()).with_rows(vec!["id", "name"], numbered_rows(10));
    let conn = SqlConnection::new(Box::new(stub));

    let stream = conn.query_stream("SELECT id, name FROM users").await.unwrap();
    assert_eq!(stream.fetch_size(), 128);
    assert_eq!(probe.last_fetch_size(), Some(128));
    stream.close().await.unwrap();
}

/// Default options push nothing down: no timeouts, directions, or catalog
/// mutations for a plain query.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn absent_options_are_not_applied() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe.clone()).with_rows(vec!["id", "name"], numbered_rows(3));
    let conn = SqlConnection::new(Box::new(stub));

    let rows = conn.query("SELECT id, name FROM users").await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(probe.applied().is_empty());
    assert_eq!(probe.last_fetch_size(), None);
}

/// Each action keeps the snapshot current at submission; a later set_options
/// only affects later actions.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn options_snapshot_per_action() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe.clone()).with_rows(vec!["id", "name"], numbered_rows(1));
    let conn = SqlConnection::new(Box::new(stub));

    conn.set_options(SqlOptions::new().catalog("first"));
    conn.query("SELECT id, name FROM t").await.unwrap();
    conn.set_options(SqlOptions::new().catalog("second"));
    conn.query("SELECT id, name FROM t").await.unwrap();

    let catalogs: Vec<String> = probe
        .applied()
        .into_iter()
        .filter(|a| a.starts_with("catalog:"))
        .collect();
    assert_eq!(catalogs, vec!["catalog:first", "catalog:second"]);
}
