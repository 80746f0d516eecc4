//! Qualified SQL names.
//!
//! Table names and aliases may be dotted (`schema.table`) and individual parts may
//! already be quoted (`public."UserTable"`). [`QualifiedName`] splits such a name
//! into parts so each part can be quoted on its own.
//!
//! - `"a.b"` is two parts; `"\"a.b\""` is one part containing a dot
//! - Quoted parts escape `"` as `""`

use crate::error::QueryBuildError;

/// One part of a dotted name, unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePart {
    /// Written without quotes.
    Bare(String),
    /// Written inside double quotes.
    Quoted(String),
}

impl NamePart {
    fn text(&self) -> &str {
        match self {
            Self::Bare(s) | Self::Quoted(s) => s,
        }
    }

    /// Whether the part survives unquoted with its case intact.
    fn is_plain(&self) -> bool {
        match self {
            Self::Quoted(_) => false,
            Self::Bare(s) => is_plain_identifier(s),
        }
    }
}

/// A possibly schema-qualified SQL name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub parts: Vec<NamePart>,
}

impl QualifiedName {
    /// Parse a dotted name, honoring quoted parts.
    pub fn parse(s: &str) -> Result<Self, QueryBuildError> {
        if s.trim().is_empty() {
            return Err(QueryBuildError::invalid_parameter("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(QueryBuildError::invalid_parameter(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        loop {
            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            name.push('"');
                        }
                        Some('"') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(QueryBuildError::invalid_parameter(format!(
                                "Unclosed quoted identifier in {s:?}"
                            )));
                        }
                    }
                }
                parts.push(NamePart::Quoted(name));
            } else {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(QueryBuildError::invalid_parameter(format!(
                        "Empty identifier segment in {s:?}"
                    )));
                }
                parts.push(NamePart::Bare(name.to_string()));
            }

            match chars.next() {
                Some('.') => continue,
                None => break,
                Some(c) => {
                    return Err(QueryBuildError::invalid_parameter(format!(
                        "Expected '.' between identifier parts in {s:?}, got '{c}'"
                    )));
                }
            }
        }

        Ok(Self { parts })
    }

    /// Render with every part double-quoted.
    pub fn quoted(&self) -> String {
        self.render(|_| true)
    }

    /// Render quoting only the parts that need it.
    pub fn minimal(&self) -> String {
        self.render(|part| !part.is_plain())
    }

    fn render(&self, needs_quotes: impl Fn(&NamePart) -> bool) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            if needs_quotes(part) {
                push_quoted(&mut out, part.text());
            } else {
                out.push_str(part.text());
            }
        }
        out
    }
}

/// Lowercase identifier that PostgreSQL would not fold or reject.
pub fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c == '$' || c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Append `name` as a double-quoted identifier, escaping `"` as `""`.
pub fn push_quoted(out: &mut String, name: &str) {
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
}
