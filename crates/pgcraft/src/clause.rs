//! Clause concatenation.
//!
//! A [`Statement`] starts from a base SQL text and accepts optional clause
//! fragments. It knows which clauses the base already has, so a second WHERE
//! fragment becomes `AND ...` instead of a second `WHERE`.
//!
//! The base is scanned once, at top level only: keywords inside string
//! literals, quoted identifiers, comments and parenthesized sub-queries do not
//! count. After that, presence is tracked explicitly as fragments are pushed.
//!
//! Text that ends inside a `--` comment gets a line break before the next
//! fragment. Text that ends inside a block comment, string or dollar quote
//! cannot be extended, and [`Statement::finish`] reports it.

use crate::error::{BuildErrorKind, QueryBuildError};
use std::collections::HashSet;
use std::fmt;

/// Clause types a statement can be extended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Where,
    Order,
    Limit,
    Offset,
    Returning,
    Conflict,
}

impl ClauseKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Where => "WHERE",
            Self::Order => "ORDER BY",
            Self::Limit => "LIMIT",
            Self::Offset => "OFFSET",
            Self::Returning => "RETURNING",
            Self::Conflict => "ON CONFLICT",
        }
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A clause fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub kind: ClauseKind,
    pub text: String,
}

impl Clause {
    pub fn new(kind: ClauseKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// SQL text being extended clause by clause.
#[derive(Debug, Clone)]
pub struct Statement {
    text: String,
    present: HashSet<ClauseKind>,
    open: bool,
    swallowed: bool,
}

impl Statement {
    pub fn new(base: impl Into<String>) -> Self {
        let mut text = base.into();
        text.truncate(text.trim_end().len());
        let scan = scan(&text);
        let present = top_level_clauses(&scan.words);
        let mut stmt = Self {
            text,
            present,
            open: false,
            swallowed: false,
        };
        stmt.close(scan.tail);
        stmt
    }

    /// Whether the statement already carries `kind`.
    pub fn has(&self, kind: ClauseKind) -> bool {
        self.present.contains(&kind)
    }

    /// Append a fragment. Empty fragments are ignored.
    pub fn push(&mut self, clause: Clause) -> &mut Self {
        let text = strip_keyword(clause.text.trim(), clause.kind);
        if text.is_empty() {
            return self;
        }

        if self.open {
            self.swallowed = true;
        }

        let already = !self.present.insert(clause.kind);
        let joiner = match (clause.kind, already) {
            (ClauseKind::Where, true) => " AND ".to_string(),
            (ClauseKind::Order, true) => ", ".to_string(),
            (_, true) => " ".to_string(),
            (kind, false) => format!(" {} ", kind.keyword()),
        };
        self.text.push_str(&joiner);
        self.text.push_str(text);
        self.close(scan(text).tail);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The final text.
    ///
    /// Fails when a fragment was pushed after text that ends inside a block
    /// comment, string or dollar quote, since the fragment would be swallowed.
    pub fn finish(self) -> Result<String, QueryBuildError> {
        if self.swallowed {
            return Err(QueryBuildError::new(
                BuildErrorKind::InvalidParameter,
                "Query text ends inside an unterminated comment or literal, clauses cannot be appended",
            )
            .with_query(self.text));
        }
        let trimmed = self.text.trim();
        if trimmed.len() == self.text.len() {
            Ok(self.text)
        } else {
            Ok(trimmed.to_string())
        }
    }

    /// Record how the text now ends, ending a trailing line comment.
    fn close(&mut self, tail: Tail) {
        match tail {
            Tail::LineComment => self.text.push('\n'),
            Tail::Open => self.open = true,
            Tail::Closed => {}
        }
    }
}

/// Remove a leading keyword the fragment already carries.
fn strip_keyword(text: &str, kind: ClauseKind) -> &str {
    let mut rest = text;
    for word in kind.keyword().split(' ') {
        let Some(head) = rest.get(..word.len()) else {
            return text;
        };
        let boundary = rest[word.len()..]
            .chars()
            .next()
            .is_none_or(|c| c.is_whitespace());
        if !head.eq_ignore_ascii_case(word) || !boundary {
            return text;
        }
        rest = rest[word.len()..].trim_start();
    }
    rest
}

/// Collect the clause keywords appearing at nesting depth zero.
fn top_level_clauses(words: &[String]) -> HashSet<ClauseKind> {
    let mut found = HashSet::new();
    let mut previous: Option<&str> = None;

    for word in words {
        let kind = match (previous, word.as_str()) {
            (_, "WHERE") => Some(ClauseKind::Where),
            (Some("ORDER"), "BY") => Some(ClauseKind::Order),
            (_, "LIMIT") => Some(ClauseKind::Limit),
            (_, "OFFSET") => Some(ClauseKind::Offset),
            (_, "RETURNING") => Some(ClauseKind::Returning),
            (Some("ON"), "CONFLICT") => Some(ClauseKind::Conflict),
            _ => None,
        };
        if let Some(kind) = kind {
            found.insert(kind);
        }
        previous = Some(word.as_str());
    }
    found
}

/// How a scanned text ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Closed,
    /// Inside a `--` comment; a line break ends it.
    LineComment,
    /// Inside a block comment, string or dollar quote.
    Open,
}

struct Scan {
    /// Uppercased bare words outside literals, comments and parentheses.
    words: Vec<String>,
    tail: Tail,
}

fn scan(sql: &str) -> Scan {
    let bytes = sql.as_bytes();
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let next = match bytes[i] {
            quote @ (b'\'' | b'"') => skip_quoted(bytes, i, quote),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                match bytes[i..].iter().position(|&b| b == b'\n') {
                    Some(p) => Some(i + p + 1),
                    None => {
                        return Scan {
                            words,
                            tail: Tail::LineComment,
                        };
                    }
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                sql[i + 2..].find("*/").map(|p| i + 2 + p + 2)
            }
            b'$' => skip_dollar_quoted(sql, i),
            b'(' => {
                depth += 1;
                Some(i + 1)
            }
            b')' => {
                depth = depth.saturating_sub(1);
                Some(i + 1)
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let end = bytes[i..]
                    .iter()
                    .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
                    .map_or(bytes.len(), |p| i + p);
                if depth == 0 {
                    words.push(sql[i..end].to_ascii_uppercase());
                }
                Some(end)
            }
            _ => Some(i + 1),
        };
        match next {
            Some(next) => i = next,
            None => {
                return Scan {
                    words,
                    tail: Tail::Open,
                };
            }
        }
    }
    Scan {
        words,
        tail: Tail::Closed,
    }
}

/// Skip a quoted run starting at `start`; doubled quotes are escapes.
/// `None` when the quote is never closed.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// Skip a `$tag$ ... $tag$` body; any other `$` is a single character.
/// `None` when the body is never closed.
fn skip_dollar_quoted(sql: &str, start: usize) -> Option<usize> {
    let rest = &sql[start + 1..];
    let tag_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    if rest.as_bytes().get(tag_len) != Some(&b'$') || rest.starts_with(|c: char| c.is_ascii_digit()) {
        return Some(start + 1);
    }
    let tag = &sql[start..start + tag_len + 2];
    let body = start + tag.len();
    sql[body..].find(tag).map(|p| body + p + tag.len())
}
