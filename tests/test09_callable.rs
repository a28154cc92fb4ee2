use sql_bridge::test_utils::{StubConnection, StubProbe, numbered_rows};
use sql_bridge::{SqlConnection, SqlValue};

/// A stored procedure with registered output positions returns the driver's
/// output values on the result set.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn out_params_are_collected() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe.clone())
        .with_out_values(vec![SqlValue::Int(99), SqlValue::Text("done".into())]);
    let conn = SqlConnection::new(Box::new(stub));

    let result = conn
        .call_with_params(
            "{ call tally(?, ?, ?) }",
            vec![SqlValue::Int(7)],
            vec![2, 3],
        )
        .await
        .unwrap();

    assert_eq!(
        result.out_params,
        vec![SqlValue::Int(99), SqlValue::Text("done".into())]
    );
    assert!(
        probe
            .applied()
            .contains(&"prepare_call:{ call tally(?, ?, ?) }".to_string())
    );
}

/// A procedure can return rows and output parameters from the same call.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rows_and_out_params_together() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe)
        .with_rows(vec!["id", "name"], numbered_rows(3))
        .with_out_values(vec![SqlValue::Int(3)]);
    let conn = SqlConnection::new(Box::new(stub));

    let result = conn
        .call_with_params("{ ? = call list_and_count() }", Vec::new(), vec![1])
        .await
        .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.rows[0].get("name").and_then(SqlValue::as_text), Some("row-0"));
    assert_eq!(result.out_params, vec![SqlValue::Int(3)]);
}

/// Without registered outputs, `out_params` stays empty.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plain_call_has_no_out_params() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe.clone()).with_rows(vec!["id", "name"], numbered_rows(2));
    let conn = SqlConnection::new(Box::new(stub));

    let result = conn.call("{ call list_users() }").await.unwrap();
    assert_eq!(result.len(), 2);
    assert!(result.out_params.is_empty());
    assert_eq!(probe.statements_closed(), 1);
    assert_eq!(probe.rows_closed(), 1);
}

/// A failing procedure surfaces the driver error and still releases the
/// statement.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_call_releases_the_statement() {
    let probe = StubProbe::new();
    let stub = StubConnection::new(probe.clone())
        .with_rows(vec!["id", "name"], numbered_rows(2))
        .fail_on("boom");
    let conn = SqlConnection::new(Box::new(stub));

    let err = conn.call("{ call boom() }").await.unwrap_err();
    assert_eq!(err.driver_code(), Some(1644));
    assert_eq!(err.sqlstate(), Some("42000"));
}
