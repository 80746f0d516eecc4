//! Execution and result shaping.
//!
//! A [`PreparedQuery`] runs its statement the first time a result is read and
//! keeps the outcome, so `one`, `many` and `none` can be called any number of
//! times with a single round trip.

use crate::builder::BuiltQuery;
use crate::client::GenericClient;
use crate::config::QueryOptions;
use crate::error::{PgResult, QueryError, QueryExecutionError, QueryResultError};
use crate::row::Record;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;

/// A built statement bound to a client.
pub struct PreparedQuery<'c, C> {
    client: &'c C,
    built: BuiltQuery,
    options: QueryOptions,
    outcome: OnceCell<Result<Vec<Record>, QueryError>>,
}

impl<C> std::fmt::Debug for PreparedQuery<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedQuery")
            .field("built", &self.built)
            .field("executed", &self.outcome.initialized())
            .finish_non_exhaustive()
    }
}

impl<'c, C: GenericClient> PreparedQuery<'c, C> {
    pub(crate) fn new(client: &'c C, built: BuiltQuery, options: QueryOptions) -> Self {
        Self {
            client,
            built,
            options,
            outcome: OnceCell::new(),
        }
    }

    pub fn built(&self) -> &BuiltQuery {
        &self.built
    }

    /// The final SQL text.
    pub fn sql(&self) -> &str {
        &self.built.text
    }

    /// Whether the statement has already run.
    pub fn is_executed(&self) -> bool {
        self.outcome.initialized()
    }

    /// Exactly one row.
    ///
    /// No row is `RECORD_NOT_FOUND`; more than one is `ONE_RECORD_VIOLATION`.
    pub async fn one<T: DeserializeOwned>(&self) -> PgResult<T> {
        match self.rows().await? {
            [] => Err(self.result_error(QueryResultError::not_found())),
            [row] => self.decode(row),
            rows => Err(self.result_error(QueryResultError::one_violation(rows.len()))),
        }
    }

    /// At most one row.
    pub async fn one_or_none<T: DeserializeOwned>(&self) -> PgResult<Option<T>> {
        match self.rows().await? {
            [] => Ok(None),
            [row] => self.decode(row).map(Some),
            rows => Err(self.result_error(QueryResultError::one_violation(rows.len()))),
        }
    }

    /// Every row, possibly none.
    pub async fn many<T: DeserializeOwned>(&self) -> PgResult<Vec<T>> {
        self.rows().await?.iter().map(|row| self.decode(row)).collect()
    }

    /// Run the statement and discard any rows.
    pub async fn none(&self) -> PgResult<()> {
        self.rows().await.map(|_| ())
    }

    /// Every row as untyped records.
    pub async fn records(&self) -> PgResult<Vec<Record>> {
        self.rows().await.map(<[Record]>::to_vec)
    }

    async fn rows(&self) -> PgResult<&[Record]> {
        self.outcome
            .get_or_init(|| self.execute())
            .await
            .as_deref()
            .map_err(Clone::clone)
    }

    async fn execute(&self) -> Result<Vec<Record>, QueryError> {
        let BuiltQuery {
            text,
            command,
            table,
            ..
        } = &self.built;
        self.options.log.log_statement(*command, table.as_deref(), text);

        match self.client.query(text).await {
            Ok(rows) => {
                if let Some(hook) = &self.options.on_return {
                    hook(&rows, text);
                }
                Ok(rows)
            }
            Err(cause) => {
                let err = QueryError::from(QueryExecutionError::classify(
                    cause,
                    Some(*command),
                    table.as_deref(),
                    text.as_str(),
                ));
                self.options.log.log_failure(&err, text);
                match &self.options.on_error {
                    Some(hook) => {
                        hook(&err, text);
                        Ok(Vec::new())
                    }
                    None => Err(err),
                }
            }
        }
    }

    fn decode<T: DeserializeOwned>(&self, row: &Record) -> PgResult<T> {
        serde_json::from_value(Value::Object(row.clone())).map_err(|e| {
            self.result_error(QueryResultError::decode(format!(
                "Row could not be decoded: {e}"
            )))
        })
    }

    fn result_error(&self, err: QueryResultError) -> QueryError {
        err.context(self.built.command, self.built.table.as_deref(), &self.built.text)
            .into()
    }
}
