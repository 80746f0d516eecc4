//! # pgcraft
//!
//! Declarative query building and execution for PostgreSQL.
//!
//! ## Features
//!
//! - **Requests, not strings**: describe a SELECT / INSERT / UPDATE as a [`QueryRequest`]
//! - **Allow-lists**: [`FilterSet`] and [`ColumnSet`] decide which keys reach the SQL
//! - **Build errors before I/O**: a missing table or empty data never reaches the driver
//! - **Cardinality**: `one` / `one_or_none` / `many` / `none` on every [`PreparedQuery`]
//! - **Structured errors**: SQLSTATE codes are mapped to a closed [`QueryError`] taxonomy
//! - **Transactions and batches** over one reserved connection
//!
//! ## Example
//!
//! ```ignore
//! use pgcraft::{
//!     Database, DatabaseOptions, FilterOperator, FilterRule, FilterSet, FilterSpec, Pagination,
//!     QueryRequest,
//! };
//! use serde_json::json;
//!
//! let db = Database::from_url("postgres://app@localhost/shop", DatabaseOptions::default())?;
//! db.connect().await?;
//!
//! let filters = FilterSet::new([
//!     ("status", FilterSpec::from(FilterOperator::Equal)),
//!     ("search", FilterRule::new("name", FilterOperator::Like).into()),
//! ]);
//!
//! let users: Vec<User> = db
//!     .table("users")
//!     .find(
//!         QueryRequest::select()
//!             .filter(filters.filter(json!({ "status": "active" })))
//!             .pagination(Pagination::new(2).page_size(10)),
//!     )?
//!     .many()
//!     .await?;
//!
//! db.table("users")
//!     .add(QueryRequest::insert(json!({ "name": "Ann" })).columns(["name", "nickname?"]))?
//!     .none()
//!     .await?;
//! ```

pub mod builder;
pub mod clause;
pub mod client;
pub mod column;
pub mod config;
pub mod error;
pub mod execution;
pub mod filter;
pub mod format;
pub mod ident;
pub mod monitor;
pub mod pagination;
pub mod request;
pub mod row;
pub mod sql_file;
pub mod transaction;

#[cfg(feature = "pool")]
pub mod database;

pub use builder::{BuiltQuery, QueryBuilder, StatementBuilder};
pub use clause::{Clause, ClauseKind, Statement};
pub use client::{ConnectionSource, GenericClient};
pub use column::{Column, ColumnSet};
pub use config::{ConnectOptions, ConnectionParams, DatabaseOptions, QueryOptions};
pub use error::{
    BuildErrorKind, ConnectionError, ConnectionErrorKind, DriverError, ErrorClass,
    ExecutionErrorKind, PgResult, QueryBuildError, QueryError, QueryExecutionError,
    QueryResultError, ResultErrorKind,
};
pub use execution::PreparedQuery;
pub use filter::{Filter, FilterOperator, FilterRule, FilterSet, FilterSpec};
pub use format::{Formatter, PgFormatter};
pub use monitor::SqlLogConfig;
pub use pagination::{DEFAULT_PAGE_SIZE, Pagination};
pub use request::{Command, QueryRequest};
pub use row::Record;
pub use sql_file::{QueryInput, SqlFile};

#[cfg(feature = "pool")]
pub use database::{ConnectionStatus, Database};

// Re-export the driver crates for callers that build their own clients.
#[cfg(feature = "pool")]
pub use deadpool_postgres;
pub use tokio_postgres;
