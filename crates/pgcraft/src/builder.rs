//! Query building.
//!
//! [`StatementBuilder`] is the pure half: it turns a [`QueryRequest`] into a
//! finished SQL string without touching the database, so every build error
//! is reported before any I/O. [`QueryBuilder`] pairs it with a client and
//! hands out [`PreparedQuery`] values ready to execute.
//!
//! Caller-written text (base query, raw filter, order, returning, conflict)
//! goes through the formatter with the request parameters. Generated
//! fragments already carry escaped literals and are never formatted again.

use crate::clause::{Clause, ClauseKind, Statement};
use crate::client::GenericClient;
use crate::column::{ColumnSet, DataRows};
use crate::config::QueryOptions;
use crate::error::{BuildErrorKind, PgResult, QueryBuildError};
use crate::execution::PreparedQuery;
use crate::filter::Filter;
use crate::request::{Command, QueryRequest};
use serde_json::Value;

/// Join key of a multi-row UPDATE when the request names none.
pub const DEFAULT_UPDATE_KEY: &str = "id";

/// Alias of the target table in a multi-row UPDATE.
const BULK_UPDATE_ALIAS: &str = "t";

/// A finished statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub text: String,
    /// Parameters the text was formatted with.
    pub params: Option<Value>,
    pub command: Command,
    pub table: Option<String>,
}

/// Turns requests into SQL text.
#[derive(Debug, Clone, Default)]
pub struct StatementBuilder {
    options: QueryOptions,
    table: Option<String>,
}

impl StatementBuilder {
    pub fn new(options: QueryOptions) -> Self {
        Self {
            options,
            table: None,
        }
    }

    /// Bind a default table for requests that name none.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn bound_table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn build(&self, req: &QueryRequest) -> PgResult<BuiltQuery> {
        let table = req.table.as_deref().or(self.table.as_deref());
        let text = match req.command {
            Command::Select => self.select(req, table),
            Command::Insert => self.insert(req, table),
            Command::Update => self.update(req, table),
            Command::Run => self.run(req),
        }
        .and_then(|text| {
            if text.trim().is_empty() {
                Err(QueryBuildError::new(
                    BuildErrorKind::EmptyQuery,
                    "The built statement is empty",
                ))
            } else {
                Ok(text)
            }
        })
        .map_err(|e| e.with_command(req.command).with_table(table))?;

        Ok(BuiltQuery {
            text,
            params: req.params.clone(),
            command: req.command,
            table: table.map(str::to_string),
        })
    }

    fn select(&self, req: &QueryRequest, table: Option<&str>) -> Result<String, QueryBuildError> {
        let base = match &req.query {
            Some(query) => self.format(query.sql()?, req)?,
            None => format!("SELECT * FROM {}", self.options.formatter.table(require_table(table)?)?),
        };
        if base.trim().is_empty() {
            return Err(QueryBuildError::new(
                BuildErrorKind::EmptyQuery,
                "SELECT needs a query or a table",
            ));
        }

        let mut stmt = Statement::new(base);
        self.push_filter(&mut stmt, req, None)?;
        self.push_formatted(&mut stmt, ClauseKind::Order, req.order.as_deref(), req)?;
        if let Some(pagination) = &req.pagination {
            for clause in pagination.clauses(self.options.page_size) {
                stmt.push(clause);
            }
        }
        stmt.finish()
    }

    fn insert(&self, req: &QueryRequest, table: Option<&str>) -> Result<String, QueryBuildError> {
        let table = require_table(table)?;
        let data = DataRows::from_value(req.data.as_ref())?;
        let text = self.columns_for(req, &data)?.insert(&*self.options.formatter, table, &data)?;

        let mut stmt = Statement::new(text);
        self.push_formatted(&mut stmt, ClauseKind::Conflict, req.conflict.as_deref(), req)?;
        self.push_formatted(&mut stmt, ClauseKind::Returning, req.returning.as_deref(), req)?;
        stmt.finish()
    }

    fn update(&self, req: &QueryRequest, table: Option<&str>) -> Result<String, QueryBuildError> {
        let table = require_table(table)?;
        let data = DataRows::from_value(req.data.as_ref())?;
        let fmt = &*self.options.formatter;

        let (text, alias) = match &data {
            DataRows::Single(row) => {
                let text = self.columns_for(req, &data)?.update(fmt, table, row)?;
                (text, table)
            }
            DataRows::Multi(rows) => {
                let columns = req.columns.as_ref().ok_or_else(|| {
                    QueryBuildError::new(
                        BuildErrorKind::ColumnsMissing,
                        "Updating several rows needs a column set",
                    )
                })?;
                let key = req.key.as_deref().unwrap_or(DEFAULT_UPDATE_KEY);
                let text = columns.update_many(fmt, table, rows, key)?;
                (text, BULK_UPDATE_ALIAS)
            }
        };

        let mut stmt = Statement::new(text);
        self.push_filter(&mut stmt, req, Some(alias))?;
        self.push_formatted(&mut stmt, ClauseKind::Returning, req.returning.as_deref(), req)?;
        stmt.finish()
    }

    fn run(&self, req: &QueryRequest) -> Result<String, QueryBuildError> {
        match &req.query {
            Some(query) => self.format(query.sql()?, req),
            None => Err(QueryBuildError::new(
                BuildErrorKind::EmptyQuery,
                "RUN needs a query",
            )),
        }
    }

    fn columns_for(
        &self,
        req: &QueryRequest,
        data: &DataRows<'_>,
    ) -> Result<ColumnSet, QueryBuildError> {
        if let Some(columns) = &req.columns {
            return Ok(columns.clone());
        }
        data.first()
            .map(ColumnSet::from_keys)
            .ok_or_else(|| QueryBuildError::new(BuildErrorKind::EmptyData, "No data to write"))
    }

    fn push_filter(
        &self,
        stmt: &mut Statement,
        req: &QueryRequest,
        default_alias: Option<&str>,
    ) -> Result<(), QueryBuildError> {
        let fragment = match &req.filter {
            None => return Ok(()),
            Some(Filter::Raw(text)) => self.format(text, req)?,
            Some(Filter::Set { set, values }) => {
                set.apply(&*self.options.formatter, values, default_alias)?
            }
        };
        stmt.push(Clause::new(ClauseKind::Where, fragment));
        Ok(())
    }

    fn push_formatted(
        &self,
        stmt: &mut Statement,
        kind: ClauseKind,
        text: Option<&str>,
        req: &QueryRequest,
    ) -> Result<(), QueryBuildError> {
        if let Some(text) = text {
            stmt.push(Clause::new(kind, self.format(text, req)?));
        }
        Ok(())
    }

    fn format(&self, template: &str, req: &QueryRequest) -> Result<String, QueryBuildError> {
        self.options.formatter.format(template, req.params.as_ref())
    }
}

fn require_table(table: Option<&str>) -> Result<&str, QueryBuildError> {
    table.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
        QueryBuildError::new(BuildErrorKind::TableNameMissing, "No table name was given")
    })
}

/// Builds queries and binds them to a client.
pub struct QueryBuilder<'c, C> {
    client: &'c C,
    statements: StatementBuilder,
}

impl<C> Clone for QueryBuilder<'_, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client,
            statements: self.statements.clone(),
        }
    }
}

impl<C> std::fmt::Debug for QueryBuilder<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("statements", &self.statements)
            .finish_non_exhaustive()
    }
}

impl<'c, C: GenericClient> QueryBuilder<'c, C> {
    pub fn new(client: &'c C, options: QueryOptions) -> Self {
        Self {
            client,
            statements: StatementBuilder::new(options),
        }
    }

    pub(crate) fn from_parts(client: &'c C, statements: StatementBuilder) -> Self {
        Self { client, statements }
    }

    /// The same builder bound to `table`.
    pub fn table(&self, table: impl Into<String>) -> Self {
        Self {
            client: self.client,
            statements: self.statements.clone().table(table),
        }
    }

    pub fn client(&self) -> &'c C {
        self.client
    }

    pub fn statements(&self) -> &StatementBuilder {
        &self.statements
    }

    /// Build a SELECT.
    pub fn find(&self, req: QueryRequest) -> PgResult<PreparedQuery<'c, C>> {
        self.prepare(&QueryRequest { command: Command::Select, ..req })
    }

    /// Build an INSERT.
    pub fn add(&self, req: QueryRequest) -> PgResult<PreparedQuery<'c, C>> {
        self.prepare(&QueryRequest { command: Command::Insert, ..req })
    }

    /// Build an UPDATE.
    pub fn update(&self, req: QueryRequest) -> PgResult<PreparedQuery<'c, C>> {
        self.prepare(&QueryRequest { command: Command::Update, ..req })
    }

    /// Build raw SQL.
    pub fn run(&self, req: QueryRequest) -> PgResult<PreparedQuery<'c, C>> {
        self.prepare(&QueryRequest { command: Command::Run, ..req })
    }

    /// Build `req` as given. Nothing runs until the result is read.
    pub fn prepare(&self, req: &QueryRequest) -> PgResult<PreparedQuery<'c, C>> {
        let built = self.statements.build(req)?;
        Ok(PreparedQuery::new(self.client, built, self.statements.options().clone()))
    }
}
