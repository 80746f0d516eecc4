//! Query requests.
//!
//! A [`QueryRequest`] describes one statement declaratively. It is plain data:
//! building it does no validation, the builder reports what is missing.

use crate::column::ColumnSet;
use crate::error::QueryBuildError;
use crate::filter::Filter;
use crate::pagination::Pagination;
use crate::sql_file::QueryInput;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Statement kind of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    Select,
    Insert,
    Update,
    /// Raw SQL, executed as given.
    Run,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Run => "RUN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative description of a statement.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub command: Command,
    /// Target table; defaults to the table bound to the builder.
    pub table: Option<String>,
    /// Base query for SELECT and RUN.
    pub query: Option<QueryInput>,
    /// Row object or array of row objects for INSERT and UPDATE.
    pub data: Option<Value>,
    pub columns: Option<ColumnSet>,
    pub filter: Option<Filter>,
    pub pagination: Option<Pagination>,
    pub order: Option<String>,
    pub returning: Option<String>,
    pub conflict: Option<String>,
    /// Template parameters for caller-written SQL.
    pub params: Option<Value>,
    /// Join key of a multi-row UPDATE.
    pub key: Option<String>,
}

impl QueryRequest {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            table: None,
            query: None,
            data: None,
            columns: None,
            filter: None,
            pagination: None,
            order: None,
            returning: None,
            conflict: None,
            params: None,
            key: None,
        }
    }

    /// SELECT; without a query this scans the table.
    pub fn select() -> Self {
        Self::new(Command::Select)
    }

    pub fn insert(data: Value) -> Self {
        Self::new(Command::Insert).data(data)
    }

    pub fn update(data: Value) -> Self {
        Self::new(Command::Update).data(data)
    }

    /// A statement sent as written, after parameter formatting.
    ///
    /// Statements go through the extended query protocol so rows come back
    /// typed, which means the text must hold a single statement. Multi-statement
    /// scripts (schema files and the like) belong in
    /// [`GenericClient::batch_execute`](crate::GenericClient::batch_execute).
    pub fn run(query: impl Into<QueryInput>) -> Self {
        Self::new(Command::Run).query(query)
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn query(mut self, query: impl Into<QueryInput>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the data from any serializable value.
    pub fn try_data<T: Serialize + ?Sized>(self, data: &T) -> Result<Self, QueryBuildError> {
        Ok(self.data(to_value(data, "data")?))
    }

    pub fn columns(mut self, columns: impl Into<ColumnSet>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn returning(mut self, returning: impl Into<String>) -> Self {
        self.returning = Some(returning.into());
        self
    }

    pub fn conflict(mut self, conflict: impl Into<String>) -> Self {
        self.conflict = Some(conflict.into());
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Set the parameters from any serializable value.
    pub fn try_params<T: Serialize + ?Sized>(self, params: &T) -> Result<Self, QueryBuildError> {
        Ok(self.params(to_value(params, "params")?))
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

fn to_value<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<Value, QueryBuildError> {
    serde_json::to_value(value).map_err(|e| {
        QueryBuildError::invalid_parameter(format!("Request {what} could not be serialized: {e}"))
    })
}
