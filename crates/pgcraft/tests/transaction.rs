//! Transactions and batches over a recording client.

mod common;

use common::RecordingClient;
use pgcraft::{
    BuildErrorKind, DriverError, ExecutionErrorKind, PgResult, QueryBuildError, QueryBuilder,
    QueryOptions, QueryRequest,
};
use serde_json::json;
use std::time::Duration;

fn builder(client: &RecordingClient) -> QueryBuilder<'_, RecordingClient> {
    QueryBuilder::new(client, QueryOptions::default()).table("accounts")
}

#[tokio::test]
async fn transaction_commits_on_ok() {
    let client = RecordingClient::new();
    let value = builder(&client)
        .transaction(async |q| -> PgResult<i32> {
            q.update(QueryRequest::update(json!({ "balance": 90 })).filter("id = 1"))?
                .none()
                .await?;
            q.update(QueryRequest::update(json!({ "balance": 110 })).filter("id = 2"))?
                .none()
                .await?;
            Ok(7)
        })
        .await
        .unwrap();

    assert_eq!(value, 7);
    assert_eq!(client.reservations(), 1);
    assert_eq!(
        client.statements(),
        vec![
            "BEGIN",
            r#"UPDATE "accounts" SET "balance" = 90 WHERE id = 1"#,
            r#"UPDATE "accounts" SET "balance" = 110 WHERE id = 2"#,
            "COMMIT",
        ]
    );
    assert_eq!(client.discards(), 0);
}

#[tokio::test]
async fn transaction_rolls_back_on_err() {
    let client = RecordingClient::new()
        .fails_on(
            r#"UPDATE "accounts" SET "balance" = 110 WHERE id = 2"#,
            DriverError::with_code("23505", "duplicate key"),
        );

    let err = builder(&client)
        .transaction(async |q| -> PgResult<()> {
            q.update(QueryRequest::update(json!({ "balance": 90 })).filter("id = 1"))?
                .none()
                .await?;
            q.update(QueryRequest::update(json!({ "balance": 110 })).filter("id = 2"))?
                .none()
                .await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert_eq!(err.execution_kind(), Some(ExecutionErrorKind::UniqueConstraintViolation));
    assert_eq!(client.statements().first().map(String::as_str), Some("BEGIN"));
    assert_eq!(client.statements().last().map(String::as_str), Some("ROLLBACK"));
    assert!(!client.statements().iter().any(|s| s == "COMMIT"));
    assert_eq!(client.discards(), 0);
}

#[tokio::test]
async fn build_error_inside_transaction_rolls_back() {
    let client = RecordingClient::new();
    let err = QueryBuilder::new(&client, QueryOptions::default())
        .transaction(async |q| -> PgResult<()> {
            q.add(QueryRequest::insert(json!({ "a": 1 })))?.none().await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert_eq!(err.build_kind(), Some(BuildErrorKind::TableNameMissing));
    assert_eq!(client.statements(), vec!["BEGIN", "ROLLBACK"]);
}

#[tokio::test]
async fn callback_error_is_returned_even_if_rollback_fails() {
    let client = RecordingClient::new().fails_on("ROLLBACK", DriverError::new("connection lost"));
    let err = builder(&client)
        .transaction(async |_q| -> PgResult<()> {
            Err(QueryBuildError::new(BuildErrorKind::InvalidParameter, "nope").into())
        })
        .await
        .unwrap_err();
    assert_eq!(err.build_kind(), Some(BuildErrorKind::InvalidParameter));
    assert_eq!(client.discards(), 1);
}

#[tokio::test]
async fn failed_commit_is_reported() {
    let client = RecordingClient::new().fails_on("COMMIT", DriverError::with_code("40001", "serialization failure"));
    let err = builder(&client)
        .transaction(async |_q| -> PgResult<()> { Ok(()) })
        .await
        .unwrap_err();
    assert_eq!(err.execution_kind(), Some(ExecutionErrorKind::ExecutionError));
    assert_eq!(err.query(), Some("COMMIT"));
    assert_eq!(client.discards(), 1);
}

#[tokio::test]
async fn cancelled_transaction_discards_connection() {
    let client = RecordingClient::new();
    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        builder(&client).transaction(async |q| -> PgResult<()> {
            q.run(QueryRequest::run("UPDATE accounts SET balance = 0"))?
                .none()
                .await?;
            std::future::pending::<()>().await;
            Ok(())
        }),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(client.statements(), vec!["BEGIN", "UPDATE accounts SET balance = 0"]);
    assert_eq!(client.reservations(), 1);
    assert_eq!(client.discards(), 1);
}

#[tokio::test]
async fn panicking_callback_discards_connection() {
    let client = RecordingClient::new();
    let task_client = client.clone();
    let local = tokio::task::LocalSet::new();
    let joined = local
        .run_until(local.spawn_local(async move {
            builder(&task_client)
                .transaction(async |q| -> PgResult<()> {
                    q.run(QueryRequest::run("UPDATE accounts SET balance = 0"))?
                        .none()
                        .await?;
                    panic!("callback blew up");
                })
                .await
        }))
        .await;

    assert!(joined.unwrap_err().is_panic());
    assert!(!client.statements().iter().any(|s| s == "COMMIT" || s == "ROLLBACK"));
    assert_eq!(client.discards(), 1);
}

#[tokio::test]
async fn reserve_failure_is_an_execution_error() {
    let client = RecordingClient::new().reserve_fails(DriverError::with_code("ETIMEDOUT", "pool timed out"));
    let err = builder(&client)
        .transaction(async |_q| -> PgResult<()> { Ok(()) })
        .await
        .unwrap_err();
    assert!(err.execution_kind().is_some());
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn batch_shares_connection_without_transaction() {
    let client = RecordingClient::new().returns(json!([{ "n": 1 }]));
    let n = builder(&client)
        .batch(async |q| -> PgResult<i64> {
            let row: serde_json::Value = q.run(QueryRequest::run("SELECT 1 AS n"))?.one().await?;
            q.run(QueryRequest::run("SELECT 2"))?.none().await?;
            Ok(row["n"].as_i64().unwrap_or_default())
        })
        .await
        .unwrap();

    assert_eq!(n, 1);
    assert_eq!(client.reservations(), 1);
    assert_eq!(client.statements(), vec!["SELECT 1 AS n", "SELECT 2"]);
}

#[tokio::test]
async fn batch_keeps_earlier_statements_on_error() {
    let client = RecordingClient::new().fails_on("SELECT 2", DriverError::new("boom"));
    let err = builder(&client)
        .batch(async |q| -> PgResult<()> {
            q.run(QueryRequest::run("SELECT 1"))?.none().await?;
            q.run(QueryRequest::run("SELECT 2"))?.none().await?;
            q.run(QueryRequest::run("SELECT 3"))?.none().await?;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(err.execution_kind().is_some());
    assert_eq!(client.statements(), vec!["SELECT 1", "SELECT 2"]);
}
