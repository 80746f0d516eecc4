//! Column sets and INSERT / UPDATE generation.
//!
//! A [`ColumnSet`] lists the columns a write may touch. Each [`Column`] names the
//! data property it reads, an optional `::cast`, and whether the property is
//! required. Optional columns whose property is absent from the data are left
//! out of the statement entirely (presence is what counts: `null`, `0` and `""`
//! are all written).

use crate::error::{BuildErrorKind, QueryBuildError};
use crate::format::Formatter;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;

/// A writable column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name in the table.
    pub name: String,
    /// Data property the value is read from.
    pub prop: String,
    /// Type cast appended to every rendered value.
    pub cast: Option<String>,
    pub required: bool,
    /// Value used when the property is absent.
    pub default: Option<Value>,
}

impl Column {
    /// A required column reading the property of the same name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            prop: name.clone(),
            name,
            cast: None,
            required: true,
            default: None,
        }
    }

    /// A column skipped when its property is absent.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::new(name)
        }
    }

    /// Read the value from a differently named property.
    pub fn prop(mut self, prop: impl Into<String>) -> Self {
        self.prop = prop.into();
        self
    }

    pub fn cast(mut self, cast: impl Into<String>) -> Self {
        self.cast = Some(cast.into());
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Parse `name`, `name?`, `name::cast` or `name::cast?`.
    pub fn parse(descriptor: &str) -> Self {
        let descriptor = descriptor.trim();
        let (body, required) = match descriptor.strip_suffix('?') {
            Some(body) => (body, false),
            None => (descriptor, true),
        };
        let (name, cast) = match body.split_once("::") {
            Some((name, cast)) => (name.trim(), Some(cast.trim().to_string())),
            None => (body, None),
        };
        Self {
            cast,
            required,
            ..Self::new(name)
        }
    }

    fn value<'r>(&'r self, row: &'r Map<String, Value>) -> Option<&'r Value> {
        row.get(&self.prop).or(self.default.as_ref())
    }

    fn render(&self, fmt: &dyn Formatter, value: &Value) -> String {
        match &self.cast {
            Some(cast) => format!("{}::{cast}", fmt.literal(value)),
            None => fmt.literal(value),
        }
    }
}

impl From<&str> for Column {
    fn from(descriptor: &str) -> Self {
        Self::parse(descriptor)
    }
}

impl From<String> for Column {
    fn from(descriptor: String) -> Self {
        Self::parse(&descriptor)
    }
}

impl FromStr for Column {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Ordered list of writable columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSet {
    columns: Arc<[Column]>,
}

impl ColumnSet {
    pub fn new<I, C>(columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Columns named after the keys of `row`, all required.
    pub fn from_keys(row: &Map<String, Value>) -> Self {
        Self::new(row.keys().map(|k| Column::new(k.as_str())))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns used for a single data object.
    ///
    /// Optional columns with an absent property are skipped; a required one is
    /// an error.
    pub fn resolve(&self, row: &Map<String, Value>) -> Result<Vec<&Column>, QueryBuildError> {
        let mut used = Vec::with_capacity(self.columns.len());
        for column in self.columns.iter() {
            if column.value(row).is_some() {
                used.push(column);
            } else if column.required {
                return Err(missing_property(&column.prop, None));
            }
        }
        Ok(used)
    }

    /// Columns used for several rows.
    ///
    /// An optional column is kept when at least one row has its property.
    /// A required column must be present in every row.
    pub fn resolve_rows(
        &self,
        rows: &[&Map<String, Value>],
    ) -> Result<Vec<&Column>, QueryBuildError> {
        let mut used = Vec::with_capacity(self.columns.len());
        for column in self.columns.iter() {
            if column.required {
                if let Some(idx) = rows.iter().position(|row| column.value(row).is_none()) {
                    return Err(missing_property(&column.prop, Some(idx)));
                }
                used.push(column);
            } else if rows.iter().any(|row| column.value(row).is_some()) {
                used.push(column);
            }
        }
        Ok(used)
    }

    /// `INSERT INTO "t" ("a", "b") VALUES (..), (..)`
    pub fn insert(
        &self,
        fmt: &dyn Formatter,
        table: &str,
        data: &DataRows<'_>,
    ) -> Result<String, QueryBuildError> {
        let rows = data.rows();
        let columns = match data {
            DataRows::Single(row) => self.resolve(row)?,
            DataRows::Multi(rows) => self.resolve_rows(rows)?,
        };
        if columns.is_empty() {
            return Err(empty_data("No columns to insert"));
        }

        let values = rows
            .iter()
            .map(|row| {
                let cells = columns
                    .iter()
                    .map(|column| match column.value(row) {
                        Some(value) => column.render(fmt, value),
                        None => "DEFAULT".to_string(),
                    })
                    .collect::<Vec<_>>();
                format!("({})", cells.join(", "))
            })
            .collect::<Vec<_>>();

        Ok(format!(
            "INSERT INTO {} ({}) VALUES {}",
            fmt.table(table)?,
            column_names(fmt, &columns),
            values.join(", ")
        ))
    }

    /// `UPDATE "t" SET "a" = .., "b" = ..`
    pub fn update(
        &self,
        fmt: &dyn Formatter,
        table: &str,
        row: &Map<String, Value>,
    ) -> Result<String, QueryBuildError> {
        let assignments = self
            .resolve(row)?
            .into_iter()
            .filter_map(|column| {
                column
                    .value(row)
                    .map(|value| format!("{} = {}", fmt.name(&column.name), column.render(fmt, value)))
            })
            .collect::<Vec<_>>();
        if assignments.is_empty() {
            return Err(empty_data("No columns to update"));
        }
        Ok(format!(
            "UPDATE {} SET {}",
            fmt.table(table)?,
            assignments.join(", ")
        ))
    }

    /// Multi-row update joined on `key`.
    ///
    /// `UPDATE "t" AS t SET "a" = v."a" FROM (VALUES ..) AS v("id", "a") WHERE v."id" = t."id"`
    ///
    /// The key is always in the VALUES list and never assigned. An optional
    /// column is updated only when every row has it; rows disagreeing on an
    /// optional column are rejected.
    pub fn update_many(
        &self,
        fmt: &dyn Formatter,
        table: &str,
        rows: &[&Map<String, Value>],
        key: &str,
    ) -> Result<String, QueryBuildError> {
        let key_column = self.get(key).cloned().unwrap_or_else(|| Column::new(key));

        let mut columns = Vec::new();
        for column in self.columns.iter().filter(|c| c.name != key) {
            let missing = rows.iter().position(|row| column.value(row).is_none());
            match missing {
                None => columns.push(column),
                Some(idx) if column.required => {
                    return Err(missing_property(&column.prop, Some(idx)));
                }
                Some(idx) if rows.iter().any(|row| column.value(row).is_some()) => {
                    return Err(missing_property(&column.prop, Some(idx)));
                }
                Some(_) => {}
            }
        }
        if columns.is_empty() {
            return Err(empty_data("No columns to update"));
        }

        let mut values = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let key_value = key_column
                .value(row)
                .ok_or_else(|| missing_property(&key_column.prop, Some(idx)))?;
            let mut cells = Vec::with_capacity(columns.len() + 1);
            cells.push(key_column.render(fmt, key_value));
            for column in &columns {
                if let Some(value) = column.value(row) {
                    cells.push(column.render(fmt, value));
                }
            }
            values.push(format!("({})", cells.join(", ")));
        }

        let key_name = fmt.name(key);
        let assignments = columns
            .iter()
            .map(|c| {
                let name = fmt.name(&c.name);
                format!("{name} = v.{name}")
            })
            .collect::<Vec<_>>();

        Ok(format!(
            "UPDATE {} AS t SET {} FROM (VALUES {}) AS v({key_name}, {}) WHERE v.{key_name} = t.{key_name}",
            fmt.table(table)?,
            assignments.join(", "),
            values.join(", "),
            column_names(fmt, &columns),
        ))
    }
}

impl<C: Into<Column>> FromIterator<C> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<Vec<&str>> for ColumnSet {
    fn from(columns: Vec<&str>) -> Self {
        Self::new(columns)
    }
}

impl<const N: usize> From<[&str; N]> for ColumnSet {
    fn from(columns: [&str; N]) -> Self {
        Self::new(columns)
    }
}

/// Write data checked for shape: one object or several.
#[derive(Debug, Clone)]
pub enum DataRows<'a> {
    Single(&'a Map<String, Value>),
    Multi(Vec<&'a Map<String, Value>>),
}

impl<'a> DataRows<'a> {
    /// Validate the data of a write.
    ///
    /// Missing data, `{}`, `[]`, arrays of empty objects and anything that is
    /// not an object or an array of objects are rejected as empty.
    pub fn from_value(data: Option<&'a Value>) -> Result<Self, QueryBuildError> {
        match data {
            None | Some(Value::Null) => Err(empty_data("No data provided")),
            Some(Value::Object(row)) if row.is_empty() => Err(empty_data("Data object is empty")),
            Some(Value::Object(row)) => Ok(Self::Single(row)),
            Some(Value::Array(items)) => {
                let rows = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(row) => Ok(row),
                        _ => Err(empty_data("Data array must contain only objects")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if rows.iter().all(|row| row.is_empty()) {
                    return Err(empty_data("Data contains no values"));
                }
                Ok(Self::Multi(rows))
            }
            Some(_) => Err(empty_data("Data must be an object or an array of objects")),
        }
    }

    pub fn rows(&self) -> Vec<&'a Map<String, Value>> {
        match self {
            Self::Single(row) => vec![*row],
            Self::Multi(rows) => rows.clone(),
        }
    }

    /// The object the implicit column list is taken from.
    pub fn first(&self) -> Option<&'a Map<String, Value>> {
        match self {
            Self::Single(row) => Some(*row),
            Self::Multi(rows) => rows
                .iter()
                .copied()
                .find(|r| !r.is_empty())
                .or_else(|| rows.first().copied()),
        }
    }
}

fn column_names(fmt: &dyn Formatter, columns: &[&Column]) -> String {
    columns
        .iter()
        .map(|c| fmt.name(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn empty_data(message: &str) -> QueryBuildError {
    QueryBuildError::new(BuildErrorKind::EmptyData, message)
}

fn missing_property(prop: &str, row: Option<usize>) -> QueryBuildError {
    let message = match row {
        Some(idx) => format!("Property '{prop}' doesn't exist in row {idx}."),
        None => format!("Property '{prop}' doesn't exist."),
    };
    QueryBuildError::new(BuildErrorKind::DataPropertyMissing, message)
}

#[cfg(test)]
mod tests;
