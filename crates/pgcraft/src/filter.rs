//! Filter operators and filter sets.
//!
//! A [`FilterSet`] is an allow-list: it maps the keys a caller may filter on to a
//! column, an operator and an optional table alias. Applying caller values
//! against the set yields an `AND`-joined predicate; keys outside the set are
//! ignored and `null` values mean "no filter".
//!
//! # Example
//! ```ignore
//! use pgcraft::{FilterOperator, FilterRule, FilterSet};
//! use serde_json::json;
//!
//! let users = FilterSet::new([
//!     ("id", FilterRule::from(FilterOperator::Equal)),
//!     ("search", FilterRule::new("name", FilterOperator::Like)),
//! ]);
//! let filter = users.filter(json!({ "search": "ann", "unknown": 1 }));
//! ```

use crate::error::QueryBuildError;
use crate::format::Formatter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A named comparison used by filter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    /// `IS NULL`, value ignored
    Null,
    /// `IS NOT NULL`, value ignored
    NotNull,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    /// Case-insensitive substring match
    Like,
    /// `IN (..)`
    Includes,
    /// `NOT IN (..)`
    Excludes,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 11] = [
        Self::Null,
        Self::NotNull,
        Self::Equal,
        Self::NotEqual,
        Self::Greater,
        Self::GreaterEqual,
        Self::Less,
        Self::LessEqual,
        Self::Like,
        Self::Includes,
        Self::Excludes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::NotNull => "NOT_NULL",
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::Greater => "GREATER",
            Self::GreaterEqual => "GREATER_EQUAL",
            Self::Less => "LESS",
            Self::LessEqual => "LESS_EQUAL",
            Self::Like => "LIKE",
            Self::Includes => "INCLUDES",
            Self::Excludes => "EXCLUDES",
        }
    }

    /// Render the predicate for `column` (qualified by `alias` when given).
    pub fn render(
        &self,
        fmt: &dyn Formatter,
        column: &str,
        alias: Option<&str>,
        value: &Value,
    ) -> Result<String, QueryBuildError> {
        let target = match alias {
            Some(alias) => format!("{}.{}", fmt.table(alias)?, fmt.name(column)),
            None => fmt.name(column),
        };

        let compare = |op: &str| format!("{target} {op} {}", fmt.literal(value));

        Ok(match self {
            Self::Equal => compare("="),
            Self::NotEqual => compare("!="),
            Self::Greater => compare(">"),
            Self::GreaterEqual => compare(">="),
            Self::Less => compare("<"),
            Self::LessEqual => compare("<="),
            Self::Null => format!("{target} IS NULL"),
            Self::NotNull => format!("{target} IS NOT NULL"),
            Self::Like => {
                let needle = match value {
                    Value::String(s) => fmt.text(s),
                    other => fmt.text(&other.to_string()),
                };
                format!("LOWER({target}) LIKE LOWER('%{needle}%')")
            }
            Self::Includes | Self::Excludes => {
                let items = match value {
                    Value::Array(items) => items.as_slice(),
                    scalar => std::slice::from_ref(scalar),
                };
                match (self, items.is_empty()) {
                    (Self::Includes, true) => "1=0".to_string(),
                    (_, true) => "1=1".to_string(),
                    (Self::Includes, false) => format!("{target} IN ({})", fmt.list(items)),
                    (_, false) => format!("{target} NOT IN ({})", fmt.list(items)),
                }
            }
        })
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = QueryBuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| QueryBuildError::invalid_parameter(format!("Unknown filter operator: {s}")))
    }
}

/// A filter-set entry as written by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    /// Bare operator; the column is the filter key.
    Operator(FilterOperator),
    Rule {
        column: String,
        operator: FilterOperator,
        #[serde(default)]
        alias: Option<String>,
    },
}

impl From<FilterOperator> for FilterSpec {
    fn from(op: FilterOperator) -> Self {
        Self::Operator(op)
    }
}

impl From<FilterRule> for FilterSpec {
    fn from(rule: FilterRule) -> Self {
        Self::Rule {
            column: rule.column,
            operator: rule.operator,
            alias: rule.alias,
        }
    }
}

/// Normalized filter-set entry.
///
/// An empty `column` means "same as the filter key"; it is filled in when the
/// rule is added to a [`FilterSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub column: String,
    pub operator: FilterOperator,
    pub alias: Option<String>,
}

impl FilterRule {
    pub fn new(column: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            column: column.into(),
            operator,
            alias: None,
        }
    }

    /// Qualify the column with a table alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl From<FilterOperator> for FilterRule {
    fn from(operator: FilterOperator) -> Self {
        Self::new(String::new(), operator)
    }
}

/// Allow-list of filter keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<String, FilterSpec>")]
pub struct FilterSet {
    rules: Arc<HashMap<String, FilterRule>>,
}

impl FilterSet {
    pub fn new<I, K, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<FilterSpec>,
    {
        let rules = entries
            .into_iter()
            .map(|(key, spec)| {
                let key = key.into();
                let rule = match spec.into() {
                    FilterSpec::Operator(operator) => FilterRule::new(key.clone(), operator),
                    FilterSpec::Rule {
                        column,
                        operator,
                        alias,
                    } => FilterRule {
                        column: if column.is_empty() { key.clone() } else { column },
                        operator,
                        alias,
                    },
                };
                (key, rule)
            })
            .collect();
        Self {
            rules: Arc::new(rules),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FilterRule> {
        self.rules.get(key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Pair this set with caller values, for use in a request.
    pub fn filter(&self, values: Value) -> Filter {
        Filter::Set {
            set: self.clone(),
            values,
        }
    }

    /// Render the predicate for `values`.
    ///
    /// Fragments follow the key order of `values` and are joined with ` AND `.
    /// Returns an empty string when nothing applies. `default_alias` qualifies
    /// rules that carry no alias of their own.
    pub fn apply(
        &self,
        fmt: &dyn Formatter,
        values: &Value,
        default_alias: Option<&str>,
    ) -> Result<String, QueryBuildError> {
        let values = match values {
            Value::Object(map) => map,
            Value::Null => return Ok(String::new()),
            other => {
                return Err(QueryBuildError::invalid_parameter(format!(
                    "Filter values must be an object, got {other}"
                )));
            }
        };

        let mut fragments = Vec::new();
        for (key, value) in values {
            if value.is_null() {
                continue;
            }
            let Some(rule) = self.rules.get(key) else {
                continue;
            };
            let alias = rule.alias.as_deref().or(default_alias);
            fragments.push(rule.operator.render(fmt, &rule.column, alias, value)?);
        }
        Ok(fragments.join(" AND "))
    }
}

impl<K: Into<String>, S: Into<FilterSpec>> FromIterator<(K, S)> for FilterSet {
    fn from_iter<I: IntoIterator<Item = (K, S)>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<HashMap<String, FilterSpec>> for FilterSet {
    fn from(map: HashMap<String, FilterSpec>) -> Self {
        Self::new(map)
    }
}

/// WHERE input of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Caller-written predicate, formatted with the request parameters.
    Raw(String),
    /// Values resolved against a filter set.
    Set { set: FilterSet, values: Value },
}

impl From<&str> for Filter {
    fn from(text: &str) -> Self {
        Self::Raw(text.to_string())
    }
}

impl From<String> for Filter {
    fn from(text: String) -> Self {
        Self::Raw(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PgFormatter;
    use serde_json::json;

    fn render(op: FilterOperator, alias: Option<&str>, value: Value) -> String {
        op.render(&PgFormatter, "name", alias, &value).unwrap()
    }

    #[test]
    fn comparison_operators() {
        let v = json!(3);
        assert_eq!(render(FilterOperator::Equal, Some("u"), v.clone()), r#""u"."name" = 3"#);
        assert_eq!(render(FilterOperator::NotEqual, None, v.clone()), r#""name" != 3"#);
        assert_eq!(render(FilterOperator::Greater, None, v.clone()), r#""name" > 3"#);
        assert_eq!(render(FilterOperator::GreaterEqual, None, v.clone()), r#""name" >= 3"#);
        assert_eq!(render(FilterOperator::Less, None, v.clone()), r#""name" < 3"#);
        assert_eq!(render(FilterOperator::LessEqual, None, v), r#""name" <= 3"#);
    }

    #[test]
    fn null_checks_ignore_value() {
        assert_eq!(render(FilterOperator::Null, None, json!("x")), r#""name" IS NULL"#);
        assert_eq!(
            render(FilterOperator::NotNull, Some("users"), json!(true)),
            r#""users"."name" IS NOT NULL"#
        );
    }

    #[test]
    fn like_is_case_insensitive_substring() {
        assert_eq!(
            render(FilterOperator::Like, Some("u"), json!("O'Ne")),
            r#"LOWER("u"."name") LIKE LOWER('%O''Ne%')"#
        );
    }

    #[test]
    fn includes_and_excludes() {
        assert_eq!(
            render(FilterOperator::Includes, None, json!([1, 2])),
            r#""name" IN (1, 2)"#
        );
        assert_eq!(
            render(FilterOperator::Includes, None, json!("a")),
            r#""name" IN ('a')"#
        );
        assert_eq!(
            render(FilterOperator::Excludes, None, json!(["a", "b"])),
            r#""name" NOT IN ('a', 'b')"#
        );
        assert_eq!(render(FilterOperator::Includes, None, json!([])), "1=0");
        assert_eq!(render(FilterOperator::Excludes, None, json!([])), "1=1");
    }

    #[test]
    fn operator_names_parse() {
        assert_eq!("GREATER_EQUAL".parse::<FilterOperator>().unwrap(), FilterOperator::GreaterEqual);
        assert_eq!("not_null".parse::<FilterOperator>().unwrap(), FilterOperator::NotNull);
        assert!("BETWEEN".parse::<FilterOperator>().is_err());

        let op: FilterOperator = serde_json::from_value(json!("INCLUDES")).unwrap();
        assert_eq!(op, FilterOperator::Includes);
        for op in FilterOperator::ALL {
            assert_eq!(op.as_str().parse::<FilterOperator>().unwrap(), op);
        }
    }

    fn users() -> FilterSet {
        FilterSet::new([
            ("id", FilterSpec::from(FilterOperator::Equal)),
            ("search", FilterRule::new("name", FilterOperator::Like).into()),
            (
                "role",
                FilterRule::new("role_id", FilterOperator::Includes).alias("r").into(),
            ),
        ])
    }

    #[test]
    fn shorthand_and_structured_specs_normalize() {
        let set = users();
        assert_eq!(set.get("id"), Some(&FilterRule::new("id", FilterOperator::Equal)));
        assert_eq!(set.get("search").unwrap().column, "name");
        assert_eq!(set.get("role").unwrap().alias.as_deref(), Some("r"));
    }

    #[test]
    fn apply_joins_known_keys_in_input_order() {
        let out = users()
            .apply(
                &PgFormatter,
                &json!({ "search": "ann", "id": 4, "role": [1, 2] }),
                Some("users"),
            )
            .unwrap();
        assert_eq!(
            out,
            r#"LOWER("users"."name") LIKE LOWER('%ann%') AND "users"."id" = 4 AND "r"."role_id" IN (1, 2)"#
        );
    }

    #[test]
    fn apply_ignores_unknown_keys() {
        let out = users()
            .apply(&PgFormatter, &json!({ "id": 1, "password": "x" }), None)
            .unwrap();
        assert_eq!(out, r#""id" = 1"#);
        assert!(!out.contains("password"));
    }

    #[test]
    fn apply_skips_null_values() {
        let out = users()
            .apply(&PgFormatter, &json!({ "id": null, "search": null }), Some("users"))
            .unwrap();
        assert_eq!(out, "");
        assert_eq!(users().apply(&PgFormatter, &json!({}), None).unwrap(), "");
        assert_eq!(users().apply(&PgFormatter, &Value::Null, None).unwrap(), "");
    }

    #[test]
    fn apply_rejects_non_object_values() {
        assert!(users().apply(&PgFormatter, &json!([1]), None).is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let set: FilterSet = serde_json::from_value(json!({
            "id": "EQUAL",
            "q": { "column": "title", "operator": "LIKE", "alias": "p" }
        }))
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.get("q"),
            Some(&FilterRule::new("title", FilterOperator::Like).alias("p"))
        );
    }

    #[test]
    fn filter_set_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FilterSet>();
    }
}
