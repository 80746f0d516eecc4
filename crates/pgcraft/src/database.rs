//! Pool-owning entry point.

use crate::builder::QueryBuilder;
use crate::client::GenericClient;
use crate::config::{ConnectionParams, DatabaseOptions};
use crate::error::{ConnectionError, PgResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use std::sync::atomic::{AtomicU8, Ordering};
use tokio_postgres::NoTls;

/// Outcome of the last [`Database::connect`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// `connect` has not run yet.
    Init,
    Connected,
    Failed,
}

impl ConnectionStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connected,
            2 => Self::Failed,
            _ => Self::Init,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Connected => 1,
            Self::Failed => 2,
        }
    }
}

/// A connection pool plus the options every query is built with.
///
/// Creating a `Database` opens no connection; the pool connects lazily.
/// Call [`Database::connect`] to verify the parameters up front.
pub struct Database {
    pool: Pool,
    params: ConnectionParams,
    options: DatabaseOptions,
    status: AtomicU8,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("params", &self.params)
            .field("options", &self.options)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Database {
    pub fn new(params: ConnectionParams, options: DatabaseOptions) -> Result<Self, ConnectionError> {
        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = Manager::from_config(params.to_pg_config(), NoTls, manager_config);
        let pool = Pool::builder(manager)
            .max_size(params.max_connections)
            .build()
            .map_err(|e| ConnectionError::invalid_config(format!("Pool could not be built: {e}")))?;

        Ok(Self {
            pool,
            params,
            options,
            status: AtomicU8::new(ConnectionStatus::Init.as_u8()),
        })
    }

    pub fn from_url(url: &str, options: DatabaseOptions) -> Result<Self, ConnectionError> {
        Self::new(ConnectionParams::from_url(url)?, options)
    }

    /// Parameters from the `DB_*` environment variables.
    pub fn from_env(options: DatabaseOptions) -> Result<Self, ConnectionError> {
        Self::new(ConnectionParams::from_env()?, options)
    }

    /// Check out a connection and run `SELECT 1`.
    ///
    /// The `on_connected` / `on_connect_failed` hooks run after logging.
    pub async fn connect(&self) -> Result<ConnectionStatus, ConnectionError> {
        let connect = &self.options.connect;
        let log = connect.log_connect;
        let params = &self.params;

        match GenericClient::query(&self.pool, "SELECT 1").await {
            Ok(_) => {
                if log {
                    tracing::info!(
                        host = %params.host,
                        port = params.port,
                        database = %params.database,
                        user = %params.user,
                        "connected to database"
                    );
                }
                self.set_status(ConnectionStatus::Connected);
                if let Some(hook) = &connect.on_connected {
                    hook(&params.redacted());
                }
                Ok(ConnectionStatus::Connected)
            }
            Err(cause) => {
                let err = ConnectionError::classify(cause, params);
                if log {
                    tracing::error!(
                        kind = %err.kind,
                        code = err.code.as_deref().unwrap_or("-"),
                        host = %params.host,
                        port = params.port,
                        database = %params.database,
                        "{}",
                        err.message
                    );
                }
                self.set_status(ConnectionStatus::Failed);
                if let Some(hook) = &connect.on_failed {
                    hook(&err);
                }
                Err(err)
            }
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Connection parameters, without the password.
    pub fn params(&self) -> ConnectionParams {
        self.params.redacted()
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// A builder over the pool, with no table bound.
    pub fn query(&self) -> QueryBuilder<'_, Pool> {
        QueryBuilder::new(&self.pool, self.options.query.clone())
    }

    /// A builder over the pool, bound to `table`.
    pub fn table(&self, table: impl Into<String>) -> QueryBuilder<'_, Pool> {
        self.query().table(table)
    }

    /// See [`QueryBuilder::transaction`].
    pub async fn transaction<T, F>(&self, f: F) -> PgResult<T>
    where
        F: AsyncFnOnce(QueryBuilder<'_, deadpool_postgres::Client>) -> PgResult<T>,
    {
        self.query().transaction(f).await
    }

    /// See [`QueryBuilder::batch`].
    pub async fn batch<T, F>(&self, f: F) -> PgResult<T>
    where
        F: AsyncFnOnce(QueryBuilder<'_, deadpool_postgres::Client>) -> PgResult<T>,
    {
        self.query().batch(f).await
    }
}
