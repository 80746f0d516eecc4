//! Parameter formatting.
//!
//! Statements are sent to the server as finished text. A [`Formatter`] renders
//! values as escaped SQL literals, quotes identifiers and expands templates.
//!
//! # Template syntax
//!
//! Named placeholders apply when the parameters are a JSON object:
//!
//! - `$<name>`, `${name}`, `$(name)`, `$[name]`, `$/name/`
//! - nested properties: `${user.email}`
//!
//! Positional placeholders `$1`, `$2`, ... apply when the parameters are an
//! array, or a single non-object value (`$1` only).
//!
//! A placeholder may carry a modifier, either as `:word` or a trailing symbol:
//!
//! | modifier | renders |
//! |---|---|
//! | *(none)* | escaped literal |
//! | `:raw`, `^` | value text inserted verbatim |
//! | `:value`, `#` | escaped text without surrounding quotes |
//! | `:name`, `~` | quoted identifier (arrays and object keys become lists) |
//! | `:alias` | identifier quoted only when needed |
//! | `:json` | JSON text as a literal |
//! | `:csv`, `:list` | array items as comma-separated literals |
//!
//! Text that does not parse as a placeholder (`$$`, `$1abc`, casts such as
//! `$1::int`) is left in place.

use crate::error::QueryBuildError;
use crate::ident::{QualifiedName, push_quoted};
use serde_json::Value;
use std::fmt;

/// Renders values and identifiers as SQL text.
///
/// The default methods describe PostgreSQL formatting; implementors usually
/// only override what they need. Formatters are shared behind an `Arc` and must
/// be thread-safe.
pub trait Formatter: Send + Sync + fmt::Debug {
    /// Quote a single identifier. `*` is passed through.
    fn name(&self, name: &str) -> String {
        if name == "*" {
            return name.to_string();
        }
        let mut out = String::with_capacity(name.len() + 2);
        push_quoted(&mut out, name);
        out
    }

    /// Quote a possibly schema-qualified table name, part by part.
    fn table(&self, name: &str) -> Result<String, QueryBuildError> {
        Ok(QualifiedName::parse(name)?.quoted())
    }

    /// Quote an alias, leaving plain lowercase parts bare.
    fn alias(&self, name: &str) -> Result<String, QueryBuildError> {
        Ok(QualifiedName::parse(name)?.minimal())
    }

    /// Escape text for use inside single quotes.
    fn text(&self, text: &str) -> String {
        text.replace('\'', "''")
    }

    /// Render a value as a SQL literal.
    ///
    /// Strings are single-quoted, arrays become `ARRAY[..]` (`'{}'` when empty)
    /// and objects are rendered as quoted JSON text.
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => format!("'{}'", self.text(s)),
            Value::Array(items) if items.is_empty() => "'{}'".to_string(),
            Value::Array(items) => format!("ARRAY[{}]", self.list(items)),
            Value::Object(_) => format!("'{}'", self.text(&value.to_string())),
        }
    }

    /// Comma-separated literals.
    fn list(&self, items: &[Value]) -> String {
        items
            .iter()
            .map(|v| self.literal(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Expand the placeholders of `template` with `params`.
    ///
    /// Without parameters the template is returned unchanged.
    fn format(&self, template: &str, params: Option<&Value>) -> Result<String, QueryBuildError> {
        match params {
            None => Ok(template.to_string()),
            Some(params) => expand(self, template, params),
        }
    }
}

/// PostgreSQL formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgFormatter;

impl Formatter for PgFormatter {}

/// Placeholder modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Default,
    Raw,
    Value,
    Name,
    Alias,
    Json,
    List,
}

impl Modifier {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "raw" => Self::Raw,
            "value" => Self::Value,
            "name" => Self::Name,
            "alias" => Self::Alias,
            "json" => Self::Json,
            "csv" | "list" => Self::List,
            _ => return None,
        })
    }

    fn from_symbol(c: char) -> Option<Self> {
        Some(match c {
            '^' => Self::Raw,
            '#' => Self::Value,
            '~' => Self::Name,
            _ => return None,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
    Named(&'a str),
    Index(usize),
}

#[derive(Debug)]
struct Placeholder<'a> {
    target: Target<'a>,
    modifier: Modifier,
    /// Bytes consumed after the `$`.
    len: usize,
}

fn closing(open: char) -> Option<char> {
    Some(match open {
        '<' => '>',
        '{' => '}',
        '(' => ')',
        '[' => ']',
        '/' => '/',
        _ => return None,
    })
}

/// Parse the placeholder following a `$`, if any.
fn parse_placeholder(rest: &str) -> Option<Placeholder<'_>> {
    let first = rest.chars().next()?;

    if let Some(close) = closing(first) {
        let end = rest[1..].find(close)? + 1;
        let (name, modifier) = split_modifier(rest[1..end].trim())?;
        if !is_property_path(name) {
            return None;
        }
        return Some(Placeholder {
            target: Target::Named(name),
            modifier,
            len: end + 1,
        });
    }

    if first.is_ascii_digit() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let tail = &rest[digits..];
        // `$1abc` is not a placeholder.
        if tail.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            return None;
        }
        let index = rest[..digits].parse().ok()?;
        let (modifier, extra) = trailing_modifier(tail);
        return Some(Placeholder {
            target: Target::Index(index),
            modifier,
            len: digits + extra,
        });
    }

    None
}

/// Split `name:mod` or `name^` inside a bracketed placeholder.
fn split_modifier(inner: &str) -> Option<(&str, Modifier)> {
    if let Some(last) = inner.chars().last()
        && let Some(modifier) = Modifier::from_symbol(last)
    {
        return Some((inner[..inner.len() - 1].trim_end(), modifier));
    }
    match inner.rsplit_once(':') {
        Some((name, word)) => Some((name.trim_end(), Modifier::from_word(word.trim())?)),
        None => Some((inner, Modifier::Default)),
    }
}

/// Modifier written right after a positional placeholder.
fn trailing_modifier(tail: &str) -> (Modifier, usize) {
    let Some(first) = tail.chars().next() else {
        return (Modifier::Default, 0);
    };
    if let Some(modifier) = Modifier::from_symbol(first) {
        return (modifier, 1);
    }
    if first == ':' {
        let word_len = tail[1..]
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        if let Some(modifier) = Modifier::from_word(&tail[1..1 + word_len]) {
            return (modifier, 1 + word_len);
        }
    }
    (Modifier::Default, 0)
}

fn is_property_path(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty()
                && !part.starts_with(|c: char| c.is_ascii_digit())
                && part
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        })
}

fn lookup<'v>(params: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(params, |value, key| value.get(key))
}

/// Resolve a placeholder against the parameters.
///
/// `Ok(None)` means the placeholder style does not apply to these parameters
/// and the text is left as written.
fn resolve<'v>(params: &'v Value, target: &Target<'_>) -> Result<Option<&'v Value>, QueryBuildError> {
    match (target, params) {
        (Target::Named(path), Value::Object(_)) => lookup(params, path)
            .map(Some)
            .ok_or_else(|| {
                QueryBuildError::invalid_parameter(format!("Property '{path}' doesn't exist."))
            }),
        (Target::Named(_), _) | (Target::Index(_), Value::Object(_)) => Ok(None),
        (Target::Index(i), Value::Array(items)) => i
            .checked_sub(1)
            .and_then(|i| items.get(i))
            .map(Some)
            .ok_or_else(|| {
                QueryBuildError::invalid_parameter(format!(
                    "Variable ${i} out of range. Parameters array length: {}",
                    items.len()
                ))
            }),
        (Target::Index(1), single) => Ok(Some(single)),
        (Target::Index(i), _) => Err(QueryBuildError::invalid_parameter(format!(
            "Variable ${i} out of range. Parameters array length: 1"
        ))),
    }
}

fn render<F: Formatter + ?Sized>(
    fmt: &F,
    value: &Value,
    modifier: Modifier,
) -> Result<String, QueryBuildError> {
    Ok(match modifier {
        Modifier::Default => fmt.literal(value),
        Modifier::Raw => match value {
            Value::String(s) => s.clone(),
            Value::Null => "NULL".to_string(),
            other => other.to_string(),
        },
        Modifier::Value => match value {
            Value::String(s) => fmt.text(s),
            Value::Null => "NULL".to_string(),
            Value::Bool(_) | Value::Number(_) => value.to_string(),
            other => fmt.text(&other.to_string()),
        },
        Modifier::Json => format!("'{}'", fmt.text(&value.to_string())),
        Modifier::List => match value {
            Value::Array(items) => fmt.list(items),
            scalar => fmt.literal(scalar),
        },
        Modifier::Name => match value {
            Value::String(s) => fmt.name(s),
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(fmt.name(s)),
                    other => Err(invalid_identifier(other)),
                })
                .collect::<Result<Vec<_>, _>>()?
                .join(", "),
            Value::Object(map) if !map.is_empty() => map
                .keys()
                .map(|k| fmt.name(k))
                .collect::<Vec<_>>()
                .join(", "),
            other => return Err(invalid_identifier(other)),
        },
        Modifier::Alias => match value {
            Value::String(s) => fmt.alias(s)?,
            other => return Err(invalid_identifier(other)),
        },
    })
}

fn invalid_identifier(value: &Value) -> QueryBuildError {
    QueryBuildError::invalid_parameter(format!("Invalid identifier value: {value}"))
}

fn expand<F: Formatter + ?Sized>(
    fmt: &F,
    template: &str,
    params: &Value,
) -> Result<String, QueryBuildError> {
    let mut out = String::with_capacity(template.len());
    let mut pos = 0;

    while let Some(offset) = template[pos..].find('$') {
        let dollar = pos + offset;
        out.push_str(&template[pos..dollar]);
        let rest = &template[dollar + 1..];

        let replaced = match parse_placeholder(rest) {
            Some(ph) => match resolve(params, &ph.target)? {
                Some(value) => {
                    out.push_str(&render(fmt, value, ph.modifier)?);
                    pos = dollar + 1 + ph.len;
                    true
                }
                None => false,
            },
            None => false,
        };

        if !replaced {
            out.push('$');
            pos = dollar + 1;
        }
    }

    out.push_str(&template[pos..]);
    Ok(out)
}
