//! SQL files.
//!
//! Queries kept in `.sql` files are read once, when the [`SqlFile`] is created,
//! and minified: comments are removed and whitespace outside literals collapses
//! to single spaces. A file that cannot be read is not an error until a query
//! built from it is prepared, where it surfaces as `SQL_FILE_NOT_FOUND`.
//!
//! A file used as a query must hold one statement; the driver rejects several
//! statements in one extended-protocol query. Run multi-statement scripts with
//! [`GenericClient::batch_execute`](crate::GenericClient::batch_execute) on
//! [`SqlFile::sql`].

use crate::error::{BuildErrorKind, QueryBuildError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A minified SQL template loaded from disk.
#[derive(Debug, Clone)]
pub struct SqlFile {
    path: PathBuf,
    content: Result<Arc<str>, String>,
}

impl SqlFile {
    /// Load `path`, relative to the working directory unless absolute.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::load(path.as_ref().to_path_buf())
    }

    /// Load `path` relative to `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, path: impl AsRef<Path>) -> Self {
        Self::load(dir.as_ref().join(path))
    }

    fn load(path: PathBuf) -> Self {
        let content = match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Arc::from(minify(&text))),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read SQL file");
                Err(e.to_string())
            }
        };
        Self { path, content }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The read error, if loading failed.
    pub fn error(&self) -> Option<&str> {
        self.content.as_ref().err().map(String::as_str)
    }

    /// The minified SQL text.
    pub fn sql(&self) -> Result<&str, QueryBuildError> {
        match &self.content {
            Ok(sql) => Ok(&**sql),
            Err(e) => Err(QueryBuildError::new(
                BuildErrorKind::SqlFileNotFound,
                format!("SQL file {} could not be read: {e}", self.path.display()),
            )),
        }
    }
}

/// Query text given inline or as a file.
#[derive(Debug, Clone)]
pub enum QueryInput {
    Text(String),
    File(SqlFile),
}

impl QueryInput {
    pub fn sql(&self) -> Result<&str, QueryBuildError> {
        match self {
            Self::Text(text) => Ok(text.as_str()),
            Self::File(file) => file.sql(),
        }
    }
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<SqlFile> for QueryInput {
    fn from(file: SqlFile) -> Self {
        Self::File(file)
    }
}

impl From<&SqlFile> for QueryInput {
    fn from(file: &SqlFile) -> Self {
        Self::File(file.clone())
    }
}

/// Strip comments and collapse whitespace outside quoted text.
pub fn minify(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    let mut pending_space = false;

    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => pending_space = true,
            '-' if sql[i + 1..].starts_with('-') => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                pending_space = true;
            }
            '/' if sql[i + 1..].starts_with('*') => {
                let end = sql[i + 2..].find("*/").map_or(sql.len(), |p| i + 2 + p + 2);
                while chars.peek().is_some_and(|&(j, _)| j < end) {
                    chars.next();
                }
                pending_space = true;
            }
            '\'' | '"' => {
                let end = quoted_end(sql, i, c);
                emit(&mut out, &sql[i..end], &mut pending_space);
                while chars.peek().is_some_and(|&(j, _)| j < end) {
                    chars.next();
                }
            }
            '$' => {
                let end = dollar_quoted_end(sql, i).unwrap_or(i + 1);
                emit(&mut out, &sql[i..end], &mut pending_space);
                while chars.peek().is_some_and(|&(j, _)| j < end) {
                    chars.next();
                }
            }
            _ => emit(&mut out, &sql[i..i + c.len_utf8()], &mut pending_space),
        }
    }
    out
}

fn emit(out: &mut String, text: &str, pending_space: &mut bool) {
    if *pending_space && !out.is_empty() {
        out.push(' ');
    }
    *pending_space = false;
    out.push_str(text);
}

fn quoted_end(sql: &str, start: usize, quote: char) -> usize {
    let mut iter = sql[start + 1..].char_indices().peekable();
    while let Some((j, c)) = iter.next() {
        if c == quote {
            if iter.peek().is_some_and(|&(_, n)| n == quote) {
                iter.next();
                continue;
            }
            return start + 1 + j + 1;
        }
    }
    sql.len()
}

fn dollar_quoted_end(sql: &str, start: usize) -> Option<usize> {
    let rest = &sql[start + 1..];
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let tag_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    if rest.as_bytes().get(tag_len) != Some(&b'$') {
        return None;
    }
    let tag = &sql[start..start + tag_len + 2];
    let body = start + tag.len();
    Some(sql[body..].find(tag).map_or(sql.len(), |p| body + p + tag.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minify_strips_comments_and_whitespace() {
        let sql = "-- list users\nSELECT *\n  FROM users /* all of them */\n WHERE id = ${id}\n";
        assert_eq!(minify(sql), "SELECT * FROM users WHERE id = ${id}");
    }

    #[test]
    fn minify_keeps_literals() {
        let sql = "SELECT '  two  spaces -- not a comment', \"odd  name\" FROM t";
        assert_eq!(minify(sql), sql);
        let sql = "SELECT 'it''s   fine'";
        assert_eq!(minify(sql), sql);
    }

    #[test]
    fn minify_keeps_dollar_quoted_bodies() {
        let sql = "DO $body$\nBEGIN\n  -- keep\nEND\n$body$;";
        assert_eq!(minify(sql), sql);
        assert_eq!(minify("SELECT $1,\n  $2"), "SELECT $1, $2");
    }

    #[test]
    fn minify_handles_multibyte_text() {
        assert_eq!(minify("SELECT  'héllo'  AS  ünï"), "SELECT 'héllo' AS ünï");
    }

    fn temp_sql(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pgcraft-sql-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_and_minifies_file() {
        let path = temp_sql("users.sql", "SELECT *\nFROM users -- all\n");
        let file = SqlFile::in_dir(path.parent().unwrap(), "users.sql");
        assert!(file.error().is_none());
        assert_eq!(file.sql().unwrap(), "SELECT * FROM users");
        assert_eq!(QueryInput::from(&file).sql().unwrap(), "SELECT * FROM users");
    }

    #[test]
    fn missing_file_surfaces_on_use() {
        let file = SqlFile::new("/definitely/not/here.sql");
        assert!(file.error().is_some());
        let err = file.sql().unwrap_err();
        assert_eq!(err.kind, BuildErrorKind::SqlFileNotFound);
        assert!(err.message.contains("here.sql"));
    }
}
