//! Batches and transactions.
//!
//! Both reserve one connection from a [`ConnectionSource`] and hand the
//! callback a [`QueryBuilder`] bound to it, so every statement inside runs on
//! the same session, in order.
//!
//! ```ignore
//! let order: Order = db
//!     .transaction(async |q| {
//!         let order: Order = q.add(QueryRequest::insert(data).table("orders").returning("*"))?
//!             .one()
//!             .await?;
//!         q.update(QueryRequest::update(json!({ "stock": 4 })).table("items").filter("id = 7"))?
//!             .none()
//!             .await?;
//!         Ok(order)
//!     })
//!     .await?;
//! ```

use crate::builder::QueryBuilder;
use crate::client::{ConnectionSource, GenericClient};
use crate::error::{DriverError, PgResult, QueryError, QueryExecutionError};
use crate::request::Command;

impl<C: ConnectionSource> QueryBuilder<'_, C> {
    /// Run `f` inside `BEGIN` / `COMMIT`.
    ///
    /// An `Err` from `f` rolls the transaction back and is returned as is. A
    /// failed rollback is logged, not returned.
    ///
    /// If the returned future is dropped before the transaction settles (a
    /// timeout, a lost `select!` branch, a panic in `f`), the reserved
    /// connection is handed to [`ConnectionSource::discard`] instead of being
    /// released with the transaction still open.
    pub async fn transaction<T, F>(&self, f: F) -> PgResult<T>
    where
        F: AsyncFnOnce(QueryBuilder<'_, C::Reserved>) -> PgResult<T>,
    {
        let mut open = OpenTransaction::<C>::new();
        let conn = &*open.conn.insert(self.reserve("BEGIN").await?);
        self.control(conn, "BEGIN").await?;

        match f(QueryBuilder::from_parts(conn, self.statements().clone())).await {
            Ok(value) => {
                self.control(conn, "COMMIT").await?;
                open.settle();
                Ok(value)
            }
            Err(err) => {
                let rolled_back = self.control(conn, "ROLLBACK").await;
                match rolled_back {
                    Ok(()) => open.settle(),
                    Err(rollback) => tracing::error!(
                        error = %rollback,
                        cause = %err,
                        "transaction rollback failed"
                    ),
                }
                Err(err)
            }
        }
    }

    /// Run `f` on one reserved connection, without a transaction.
    ///
    /// Statements that succeeded before an error stay applied.
    pub async fn batch<T, F>(&self, f: F) -> PgResult<T>
    where
        F: AsyncFnOnce(QueryBuilder<'_, C::Reserved>) -> PgResult<T>,
    {
        let conn = self.reserve("").await?;
        f(QueryBuilder::from_parts(&conn, self.statements().clone())).await
    }

    async fn reserve(&self, sql: &str) -> PgResult<C::Reserved> {
        self.client()
            .reserve()
            .await
            .map_err(|cause| self.control_error(cause, sql))
    }

    async fn control(&self, conn: &C::Reserved, sql: &str) -> PgResult<()> {
        let statements = self.statements();
        statements
            .options()
            .log
            .log_statement(Command::Run, statements.bound_table(), sql);
        conn.batch_execute(sql)
            .await
            .map_err(|cause| self.control_error(cause, sql))
    }

    fn control_error(&self, cause: DriverError, sql: &str) -> QueryError {
        let statements = self.statements();
        let err = QueryError::from(QueryExecutionError::classify(
            cause,
            None,
            statements.bound_table(),
            sql,
        ));
        statements.options().log.log_failure(&err, sql);
        err
    }
}

/// A reserved connection with a transaction that has not reached COMMIT or
/// ROLLBACK yet.
struct OpenTransaction<C: ConnectionSource> {
    conn: Option<C::Reserved>,
}

impl<C: ConnectionSource> OpenTransaction<C> {
    fn new() -> Self {
        Self { conn: None }
    }

    /// The transaction ended cleanly; the connection can be reused.
    fn settle(mut self) {
        self.conn.take();
    }
}

impl<C: ConnectionSource> Drop for OpenTransaction<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("transaction dropped before COMMIT or ROLLBACK, discarding its connection");
            C::discard(conn);
        }
    }
}
