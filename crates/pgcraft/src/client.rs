//! Driver boundary.
//!
//! Statements reach the database fully formatted, so the boundary is a single
//! "all rows" primitive taking finished SQL text. Everything that can run SQL
//! (a plain client, a transaction, a pooled client, the pool itself) implements
//! [`GenericClient`]; things that can hand out a dedicated connection implement
//! [`ConnectionSource`].

use crate::error::DriverError;
use crate::row::{Record, record_from_row};
use std::future::Future;

/// A trait that unifies database clients, transactions and pools.
pub trait GenericClient: Send + Sync {
    /// Execute a statement and return all rows as records.
    fn query(&self, sql: &str) -> impl Future<Output = Result<Vec<Record>, DriverError>> + Send;

    /// Execute one or more statements, discarding any rows.
    ///
    /// Used for `BEGIN` / `COMMIT` / `ROLLBACK`. The default implementation
    /// goes through [`GenericClient::query`].
    fn batch_execute(&self, sql: &str) -> impl Future<Output = Result<(), DriverError>> + Send {
        async move {
            self.query(sql).await?;
            Ok(())
        }
    }
}

/// A source of dedicated connections.
///
/// Transactions and batches need every statement to run on the same session;
/// `reserve` hands out such a session for as long as the returned value lives.
pub trait ConnectionSource: GenericClient {
    type Reserved: GenericClient;

    fn reserve(&self) -> impl Future<Output = Result<Self::Reserved, DriverError>> + Send;

    /// Give up a reserved connection whose session state is unknown, such as
    /// one left inside an unfinished transaction.
    ///
    /// The default simply drops it.
    fn discard(conn: Self::Reserved) {
        drop(conn);
    }
}

fn decode_rows(rows: Vec<tokio_postgres::Row>) -> Result<Vec<Record>, DriverError> {
    rows.iter().map(record_from_row).collect()
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str) -> Result<Vec<Record>, DriverError> {
        let rows = tokio_postgres::Client::query(self, sql, &[]).await?;
        decode_rows(rows)
    }

    async fn batch_execute(&self, sql: &str) -> Result<(), DriverError> {
        tokio_postgres::Client::batch_execute(self, sql).await?;
        Ok(())
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str) -> Result<Vec<Record>, DriverError> {
        let rows = tokio_postgres::Transaction::query(self, sql, &[]).await?;
        decode_rows(rows)
    }

    async fn batch_execute(&self, sql: &str) -> Result<(), DriverError> {
        tokio_postgres::Transaction::batch_execute(self, sql).await?;
        Ok(())
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::ClientWrapper {
    async fn query(&self, sql: &str) -> Result<Vec<Record>, DriverError> {
        GenericClient::query(&**self, sql).await
    }

    async fn batch_execute(&self, sql: &str) -> Result<(), DriverError> {
        GenericClient::batch_execute(&**self, sql).await
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str) -> Result<Vec<Record>, DriverError> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        GenericClient::query(&**self, sql).await
    }

    async fn batch_execute(&self, sql: &str) -> Result<(), DriverError> {
        GenericClient::batch_execute(&**self, sql).await
    }
}

/// Each statement checks a connection out of the pool and returns it afterwards.
#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Pool {
    async fn query(&self, sql: &str) -> Result<Vec<Record>, DriverError> {
        let client = self.get().await?;
        GenericClient::query(&client, sql).await
    }

    async fn batch_execute(&self, sql: &str) -> Result<(), DriverError> {
        let client = self.get().await?;
        GenericClient::batch_execute(&client, sql).await
    }
}

#[cfg(feature = "pool")]
impl ConnectionSource for deadpool_postgres::Pool {
    type Reserved = deadpool_postgres::Client;

    async fn reserve(&self) -> Result<Self::Reserved, DriverError> {
        Ok(self.get().await?)
    }

    /// Detach the connection from the pool and close it. The server aborts
    /// whatever transaction it had open, and the pool opens a fresh one later.
    fn discard(conn: Self::Reserved) {
        drop(deadpool_postgres::Client::take(conn));
    }
}

// ===== Reference implementations =====

impl<C: GenericClient> GenericClient for &C {
    fn query(&self, sql: &str) -> impl Future<Output = Result<Vec<Record>, DriverError>> + Send {
        (*self).query(sql)
    }

    fn batch_execute(&self, sql: &str) -> impl Future<Output = Result<(), DriverError>> + Send {
        (*self).batch_execute(sql)
    }
}

impl<C: ConnectionSource> ConnectionSource for &C {
    type Reserved = C::Reserved;

    fn reserve(&self) -> impl Future<Output = Result<Self::Reserved, DriverError>> + Send {
        (*self).reserve()
    }

    fn discard(conn: Self::Reserved) {
        C::discard(conn);
    }
}
