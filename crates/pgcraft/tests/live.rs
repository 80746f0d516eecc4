//! Round trip against a real database.
//!
//! Skipped unless `DATABASE_URL` is set (a `.env` file is honoured).

use pgcraft::{
    ConnectionStatus, Database, DatabaseOptions, ExecutionErrorKind, FilterOperator, FilterSet,
    FilterSpec, PgResult, QueryRequest,
};
use serde::Deserialize;
use serde_json::json;

fn database() -> Option<Database> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(Database::from_url(&url, DatabaseOptions::default()).expect("invalid DATABASE_URL"))
}

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: i32,
    name: String,
    qty: i32,
}

#[tokio::test]
async fn live_round_trip() -> PgResult<()> {
    let Some(db) = database() else {
        eprintln!("DATABASE_URL not set, skipping");
        return Ok(());
    };
    assert_eq!(db.connect().await?, ConnectionStatus::Connected);

    let table = format!("pgcraft_live_{}", std::process::id());
    db.query()
        .run(QueryRequest::run(format!(
            "CREATE TABLE {table} (id serial PRIMARY KEY, name text NOT NULL UNIQUE, qty int NOT NULL DEFAULT 0)"
        )))?
        .none()
        .await?;

    let result = exercise(&db, &table).await;

    db.query()
        .run(QueryRequest::run(format!("DROP TABLE IF EXISTS {table}")))?
        .none()
        .await?;
    result
}

async fn exercise(db: &Database, table: &str) -> PgResult<()> {
    let q = db.table(table);

    let inserted: Vec<Item> = q
        .add(
            QueryRequest::insert(json!([{ "name": "bolt", "qty": 4 }, { "name": "nut" }]))
                .columns(["name", "qty?"])
                .returning("*"),
        )?
        .many()
        .await?;
    assert_eq!(inserted.len(), 2);
    assert_eq!(inserted[1].qty, 0);

    let filters = FilterSet::new([("name", FilterSpec::from(FilterOperator::Equal))]);
    let bolt: Item = q
        .find(QueryRequest::select().filter(filters.filter(json!({ "name": "bolt" }))))?
        .one()
        .await?;
    assert_eq!(bolt.qty, 4);

    let err = q
        .add(QueryRequest::insert(json!({ "name": "bolt" })))?
        .none()
        .await
        .unwrap_err();
    assert_eq!(err.execution_kind(), Some(ExecutionErrorKind::UniqueConstraintViolation));

    let err = q
        .add(QueryRequest::insert(json!({ "name": null })))?
        .none()
        .await
        .unwrap_err();
    assert_eq!(err.execution_kind(), Some(ExecutionErrorKind::NotNullViolation));
    let pgcraft::QueryError::Execution(exec) = &err else {
        unreachable!()
    };
    assert_eq!(exec.column.as_deref(), Some("name"));

    let rolled_back = db
        .table(table)
        .transaction(async |tx| -> PgResult<()> {
            tx.update(QueryRequest::update(json!({ "qty": 100 })).filter("name = 'bolt'"))?
                .none()
                .await?;
            tx.run(QueryRequest::run("SELECT 1/0"))?.none().await?;
            Ok(())
        })
        .await;
    assert!(rolled_back.is_err());

    let bolt: Item = q
        .find(QueryRequest::select().filter("name = 'bolt'"))?
        .one()
        .await?;
    assert_eq!(bolt.qty, 4);
    Ok(())
}
