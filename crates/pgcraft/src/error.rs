//! Error types for pgcraft.
//!
//! Every failure is a [`QueryError`], a closed enum over four kinds:
//!
//! - [`QueryBuildError`]: detected from the request alone, before any I/O
//! - [`QueryExecutionError`]: the driver rejected the statement
//! - [`QueryResultError`]: the rows did not match the requested cardinality
//! - [`ConnectionError`]: raised only from the connect path
//!
//! Driver failures enter the crate as a [`DriverError`], the flat shape the
//! classifier works from.

use crate::config::ConnectionParams;
use crate::request::Command;
use std::fmt;
use thiserror::Error;

/// Result type alias for pgcraft operations.
pub type PgResult<T> = Result<T, QueryError>;

/// Which branch of the taxonomy an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Build,
    Execution,
    Result,
    Connection,
}

/// Structured error returned by every pgcraft operation.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Invalid request, detected before reaching the database
    #[error("Query build error: {0}")]
    Build(#[from] QueryBuildError),

    /// The database rejected the statement
    #[error("Query execution error: {0}")]
    Execution(#[from] QueryExecutionError),

    /// The result did not have the expected shape
    #[error("Query result error: {0}")]
    Result(#[from] QueryResultError),

    /// The connection could not be established
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

impl QueryError {
    /// The taxonomy branch of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Build(_) => ErrorClass::Build,
            Self::Execution(_) => ErrorClass::Execution,
            Self::Result(_) => ErrorClass::Result,
            Self::Connection(_) => ErrorClass::Connection,
        }
    }

    /// Human readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Build(e) => &e.message,
            Self::Execution(e) => &e.message,
            Self::Result(e) => &e.message,
            Self::Connection(e) => &e.message,
        }
    }

    pub fn command(&self) -> Option<Command> {
        match self {
            Self::Build(e) => e.command,
            Self::Execution(e) => e.command,
            Self::Result(e) => e.command,
            Self::Connection(_) => None,
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Build(e) => e.table.as_deref(),
            Self::Execution(e) => e.table.as_deref(),
            Self::Result(e) => e.table.as_deref(),
            Self::Connection(_) => None,
        }
    }

    /// The SQL text involved, when one had been produced.
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::Build(e) => e.query.as_deref(),
            Self::Execution(e) => Some(&e.query),
            Self::Result(e) => e.query.as_deref(),
            Self::Connection(_) => None,
        }
    }

    pub fn build_kind(&self) -> Option<BuildErrorKind> {
        match self {
            Self::Build(e) => Some(e.kind),
            _ => None,
        }
    }

    pub fn execution_kind(&self) -> Option<ExecutionErrorKind> {
        match self {
            Self::Execution(e) => Some(e.kind),
            _ => None,
        }
    }

    pub fn result_kind(&self) -> Option<ResultErrorKind> {
        match self {
            Self::Result(e) => Some(e.kind),
            _ => None,
        }
    }

    pub fn connection_kind(&self) -> Option<ConnectionErrorKind> {
        match self {
            Self::Connection(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Check if this is a build error
    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    /// Check if `one()` found no record
    pub fn is_not_found(&self) -> bool {
        self.result_kind() == Some(ResultErrorKind::RecordNotFound)
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        self.execution_kind() == Some(ExecutionErrorKind::UniqueConstraintViolation)
    }
}

// ─── Build errors ───────────────────────────────────────────────────────────

/// Kinds of errors detected while building a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildErrorKind {
    TableNameMissing,
    EmptyQuery,
    EmptyData,
    DataPropertyMissing,
    ColumnsMissing,
    SqlFileNotFound,
    /// A template placeholder, identifier or data value could not be formatted,
    /// or caller text leaves no place to append a clause.
    InvalidParameter,
}

impl BuildErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TableNameMissing => "TABLE_NAME_MISSING",
            Self::EmptyQuery => "EMPTY_QUERY",
            Self::EmptyData => "EMPTY_DATA",
            Self::DataPropertyMissing => "DATA_PROPERTY_MISSING",
            Self::ColumnsMissing => "COLUMNS_MISSING",
            Self::SqlFileNotFound => "SQL_FILE_NOT_FOUND",
            Self::InvalidParameter => "INVALID_PARAMETER",
        }
    }
}

impl fmt::Display for BuildErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request that cannot be turned into SQL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{kind}] {message}")]
pub struct QueryBuildError {
    pub kind: BuildErrorKind,
    pub message: String,
    pub command: Option<Command>,
    pub table: Option<String>,
    pub query: Option<String>,
}

impl QueryBuildError {
    pub fn new(kind: BuildErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            command: None,
            table: None,
            query: None,
        }
    }

    pub(crate) fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(BuildErrorKind::InvalidParameter, message)
    }

    /// Attach the command, keeping one that is already set.
    pub fn with_command(mut self, command: Command) -> Self {
        self.command.get_or_insert(command);
        self
    }

    /// Attach the table, keeping one that is already set.
    pub fn with_table(mut self, table: Option<&str>) -> Self {
        if self.table.is_none() {
            self.table = table.map(str::to_string);
        }
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

// ─── Execution errors ───────────────────────────────────────────────────────

/// Kinds of errors raised by the database while executing a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionErrorKind {
    /// SQLSTATE 23502
    NotNullViolation,
    /// SQLSTATE 23505
    UniqueConstraintViolation,
    /// SQLSTATE 42703
    MissingColumn,
    /// SQLSTATE 22P02
    InvalidTextRepresentation,
    /// Anything else
    ExecutionError,
}

impl ExecutionErrorKind {
    /// Map a SQLSTATE code to a kind.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("23502") => Self::NotNullViolation,
            Some("23505") => Self::UniqueConstraintViolation,
            Some("42703") => Self::MissingColumn,
            Some("22P02") => Self::InvalidTextRepresentation,
            _ => Self::ExecutionError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotNullViolation => "NOT_NULL_VIOLATION",
            Self::UniqueConstraintViolation => "UNIQUE_CONSTRAINT_VIOLATION",
            Self::MissingColumn => "MISSING_COLUMN",
            Self::InvalidTextRepresentation => "INVALID_TEXT_REPRESENTATION",
            Self::ExecutionError => "EXECUTION_ERROR",
        }
    }
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A statement the database refused, classified from its SQLSTATE.
#[derive(Debug, Clone, Error)]
#[error("[{kind}] {message}")]
pub struct QueryExecutionError {
    pub kind: ExecutionErrorKind,
    pub message: String,
    pub command: Option<Command>,
    pub table: Option<String>,
    /// Final SQL text that was sent.
    pub query: String,
    pub code: Option<String>,
    pub column: Option<String>,
    pub schema: Option<String>,
    pub constraint: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub position: Option<u32>,
    #[source]
    pub cause: DriverError,
}

impl QueryExecutionError {
    /// Classify a driver error raised while running `query`.
    ///
    /// The table reported by the database wins over the request table.
    pub fn classify(
        cause: DriverError,
        command: Option<Command>,
        table: Option<&str>,
        query: impl Into<String>,
    ) -> Self {
        let kind = ExecutionErrorKind::from_code(cause.code.as_deref());
        Self {
            kind,
            message: cause.message.clone(),
            command,
            table: cause.table.clone().or_else(|| table.map(str::to_string)),
            query: query.into(),
            code: cause.code.clone(),
            column: cause.column.clone(),
            schema: cause.schema.clone(),
            constraint: cause.constraint.clone(),
            detail: cause.detail.clone(),
            hint: cause.hint.clone(),
            position: cause.position,
            cause,
        }
    }
}

// ─── Result errors ──────────────────────────────────────────────────────────

/// Kinds of result-shape errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultErrorKind {
    RecordNotFound,
    OneRecordViolation,
    /// A row could not be deserialized into the requested type.
    Decode,
}

impl ResultErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::OneRecordViolation => "ONE_RECORD_VIOLATION",
            Self::Decode => "DECODE",
        }
    }
}

impl fmt::Display for ResultErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows were returned but not in the shape the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{kind}] {message}")]
pub struct QueryResultError {
    pub kind: ResultErrorKind,
    pub message: String,
    pub command: Option<Command>,
    pub table: Option<String>,
    pub query: Option<String>,
}

impl QueryResultError {
    pub fn new(kind: ResultErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            command: None,
            table: None,
            query: None,
        }
    }

    pub(crate) fn not_found() -> Self {
        Self::new(ResultErrorKind::RecordNotFound, "Expected one record, got none")
    }

    pub(crate) fn one_violation(got: usize) -> Self {
        Self::new(
            ResultErrorKind::OneRecordViolation,
            format!("Expected one record, got {got}"),
        )
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::new(ResultErrorKind::Decode, message)
    }

    pub(crate) fn context(
        mut self,
        command: Command,
        table: Option<&str>,
        query: &str,
    ) -> Self {
        self.command = Some(command);
        self.table = table.map(str::to_string);
        self.query = Some(query.to_string());
        self
    }
}

// ─── Connection errors ──────────────────────────────────────────────────────

/// Kinds of connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionErrorKind {
    HostNotFound,
    PortNotResponding,
    DatabaseNotFound,
    AuthFailed,
    RoleNotFound,
    /// Connection parameters could not be parsed.
    InvalidConfig,
    Unknown,
}

impl ConnectionErrorKind {
    /// Map a transport errno or SQLSTATE code to a kind.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("ENOTFOUND") => Self::HostNotFound,
            Some("ECONNREFUSED") => Self::PortNotResponding,
            Some("3D000") => Self::DatabaseNotFound,
            Some("28P01") => Self::AuthFailed,
            Some("28000") => Self::RoleNotFound,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HostNotFound => "HostNotFound",
            Self::PortNotResponding => "PortNotResponding",
            Self::DatabaseNotFound => "DatabaseNotFound",
            Self::AuthFailed => "AuthFailed",
            Self::RoleNotFound => "RoleNotFound",
            Self::InvalidConfig => "InvalidConfig",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to reach or log into the database.
///
/// The attached [`ConnectionParams`] are always redacted, so this error is safe to log.
#[derive(Debug, Clone, Error)]
#[error("[{kind}] {message}")]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub code: Option<String>,
    pub connection: ConnectionParams,
    #[source]
    pub cause: Option<DriverError>,
}

impl ConnectionError {
    /// Classify a driver error raised while connecting with `params`.
    pub fn classify(cause: DriverError, params: &ConnectionParams) -> Self {
        let kind = ConnectionErrorKind::from_code(cause.code.as_deref());
        let message = match kind {
            ConnectionErrorKind::HostNotFound => format!(
                "Connection to the host \"{}\" could not be established",
                params.host
            ),
            ConnectionErrorKind::PortNotResponding => format!(
                "Connection to port \"{}\" on host \"{}\" refused",
                params.port, params.host
            ),
            ConnectionErrorKind::DatabaseNotFound => {
                format!("Database \"{}\" not found", params.database)
            }
            ConnectionErrorKind::AuthFailed => {
                format!("Authentication for user \"{}\" failed", params.user)
            }
            ConnectionErrorKind::RoleNotFound => format!("Role \"{}\" not found", params.user),
            ConnectionErrorKind::InvalidConfig | ConnectionErrorKind::Unknown => format!(
                "Connection to database \"{}\" on {}:{} failed: {}",
                params.database, params.host, params.port, cause.message
            ),
        };
        Self {
            kind,
            message,
            code: cause.code.clone(),
            connection: params.redacted(),
            cause: Some(cause),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self {
            kind: ConnectionErrorKind::InvalidConfig,
            message: message.into(),
            code: None,
            connection: ConnectionParams::default(),
            cause: None,
        }
    }
}

// ─── Driver errors ──────────────────────────────────────────────────────────

/// Raw error reported by the driver or pool.
///
/// Mirrors the fields PostgreSQL attaches to an error response. `code` holds the
/// SQLSTATE for server errors, or an errno-style code (`ECONNREFUSED`,
/// `ENOTFOUND`, ...) for transport failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    pub code: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub position: Option<u32>,
    pub column: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub constraint: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<tokio_postgres::Error> for DriverError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db) = err.as_db_error() {
            let position = db.position().map(|p| match p {
                tokio_postgres::error::ErrorPosition::Original(pos) => *pos,
                tokio_postgres::error::ErrorPosition::Internal { position, .. } => *position,
            });
            return Self {
                code: Some(db.code().code().to_string()),
                message: db.message().to_string(),
                detail: db.detail().map(str::to_string),
                hint: db.hint().map(str::to_string),
                position,
                column: db.column().map(str::to_string),
                schema: db.schema().map(str::to_string),
                table: db.table().map(str::to_string),
                constraint: db.constraint().map(str::to_string),
            };
        }
        Self {
            code: transport_code(&err).map(str::to_string),
            message: err.to_string(),
            ..Self::default()
        }
    }
}

/// Derive an errno-style code from the I/O error behind a transport failure.
fn transport_code(err: &(dyn std::error::Error + 'static)) -> Option<&'static str> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            let text = io.to_string();
            return match io.kind() {
                std::io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
                std::io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
                std::io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
                _ if text.contains("lookup address")
                    || text.contains("not known")
                    || text.contains("nodename nor servname") =>
                {
                    Some("ENOTFOUND")
                }
                _ => None,
            };
        }
        current = e.source();
    }
    None
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for DriverError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(e) => e.into(),
            deadpool_postgres::PoolError::Timeout(_) => {
                Self::with_code("ETIMEDOUT", err.to_string())
            }
            other => Self::new(other.to_string()),
        }
    }
}
