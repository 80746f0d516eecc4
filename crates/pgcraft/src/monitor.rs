//! SQL logging through `tracing`.
//!
//! Every executed statement emits one event on the `pgcraft.sql` target, at the
//! level set in [`SqlLogConfig`]. Failures are reported separately at `warn`
//! with the classified kind and SQLSTATE, whether or not the per-statement
//! event is enabled.

use crate::error::QueryError;
use crate::request::Command;
use tracing::Level;

/// Tracing target of statement events.
pub const SQL_TARGET: &str = "pgcraft.sql";

/// How executed statements are logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlLogConfig {
    /// Emit an event for every executed statement.
    pub enabled: bool,
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes, on a char boundary). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl SqlLogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn the per-statement event off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    /// Emit the statement event for `sql`.
    pub(crate) fn log_statement(&self, command: Command, table: Option<&str>, sql: &str) {
        if !self.enabled {
            return;
        }

        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN => tracing::warn!($($field)*),
                    Level::INFO => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    _ => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(sql);
        let table = table.unwrap_or("-");
        emit_at_level!(
            self.level,
            target: SQL_TARGET,
            command = %command,
            table,
            sql = %sql,
        );
    }

    /// Report a failed statement.
    pub(crate) fn log_failure(&self, err: &QueryError, sql: &str) {
        let kind = match err {
            QueryError::Execution(e) => e.kind.as_str(),
            QueryError::Build(e) => e.kind.as_str(),
            QueryError::Result(e) => e.kind.as_str(),
            QueryError::Connection(e) => e.kind.as_str(),
        };
        let code = match err {
            QueryError::Execution(e) => e.code.as_deref(),
            _ => None,
        };
        tracing::warn!(
            target: SQL_TARGET,
            kind,
            code = code.unwrap_or("-"),
            table = err.table().unwrap_or("-"),
            sql = %self.truncate_sql(sql),
            error = %err.message(),
            "query failed"
        );
    }
}

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
