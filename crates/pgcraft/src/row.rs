//! Row decoding.
//!
//! Every result row is decoded into a [`Record`], a JSON object keyed by column
//! name. Typed access goes through `serde` on top of that.

use crate::error::DriverError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use std::fmt::Write as _;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, Type};
use uuid::Uuid;

/// A decoded result row.
pub type Record = serde_json::Map<String, Value>;

/// Dispatch on a (scalar or element) type to `$read::<T, _>(row, idx, convert)`.
///
/// Evaluates to `Result<Option<Value>, DriverError>`; `Ok(None)` means the type
/// has no mapping.
macro_rules! decode {
    ($row:expr, $idx:expr, $ty:expr, $read:ident) => {
        match *$ty {
            Type::BOOL => $read::<bool, _>($row, $idx, Value::from),
            Type::INT2 => $read::<i16, _>($row, $idx, Value::from),
            Type::INT4 => $read::<i32, _>($row, $idx, Value::from),
            Type::INT8 => $read::<i64, _>($row, $idx, Value::from),
            Type::OID => $read::<u32, _>($row, $idx, Value::from),
            Type::FLOAT4 => $read::<f32, _>($row, $idx, Value::from),
            Type::FLOAT8 => $read::<f64, _>($row, $idx, Value::from),
            #[cfg(feature = "rust_decimal")]
            Type::NUMERIC => $read::<rust_decimal::Decimal, _>($row, $idx, |d| {
                Value::String(d.to_string())
            }),
            Type::JSON | Type::JSONB => $read::<Value, _>($row, $idx, |v| v),
            Type::UUID => $read::<Uuid, _>($row, $idx, |u| Value::String(u.to_string())),
            Type::TIMESTAMP => $read::<NaiveDateTime, _>($row, $idx, |t| {
                Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }),
            Type::TIMESTAMPTZ => $read::<DateTime<Utc>, _>($row, $idx, |t| {
                Value::String(t.to_rfc3339())
            }),
            Type::DATE => $read::<NaiveDate, _>($row, $idx, |d| Value::String(d.to_string())),
            Type::TIME => $read::<NaiveTime, _>($row, $idx, |t| Value::String(t.to_string())),
            Type::BYTEA => $read::<Vec<u8>, _>($row, $idx, |b| Value::String(bytea_hex(&b))),
            _ if <String as FromSql>::accepts($ty) => $read::<String, _>($row, $idx, Value::String),
            _ if <EnumLabel as FromSql>::accepts($ty) => {
                $read::<EnumLabel, _>($row, $idx, |l| Value::String(l.0))
            }
            _ => Ok(None),
        }
    };
}

/// Decode every column of `row` into a [`Record`].
///
/// Column types without a JSON mapping are reported as a [`DriverError`] naming
/// the column and its type.
pub fn record_from_row(row: &Row) -> Result<Record, DriverError> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = match ty.kind() {
            Kind::Array(elem) => decode!(row, idx, elem, array),
            _ => decode!(row, idx, ty, scalar),
        };
        let value = value?.ok_or_else(|| {
            DriverError::new(format!(
                "column \"{}\" has unsupported type {}",
                column.name(),
                ty.name()
            ))
            .column(column.name())
        })?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn scalar<'a, T, F>(row: &'a Row, idx: usize, convert: F) -> Result<Option<Value>, DriverError>
where
    T: FromSql<'a>,
    F: Fn(T) -> Value,
{
    let value: Option<T> = row.try_get(idx)?;
    Ok(Some(value.map_or(Value::Null, convert)))
}

fn array<'a, T, F>(row: &'a Row, idx: usize, convert: F) -> Result<Option<Value>, DriverError>
where
    T: FromSql<'a>,
    F: Fn(T) -> Value,
{
    let items: Option<Vec<Option<T>>> = row.try_get(idx)?;
    Ok(Some(match items {
        None => Value::Null,
        Some(items) => Value::Array(
            items
                .into_iter()
                .map(|item| item.map_or(Value::Null, &convert))
                .collect(),
        ),
    }))
}

/// Label of a user-defined enum value.
struct EnumLabel(String);

impl<'a> FromSql<'a> for EnumLabel {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

/// PostgreSQL `bytea` hex output format.
fn bytea_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytea_uses_hex_output_format() {
        assert_eq!(bytea_hex(&[]), "\\x");
        assert_eq!(bytea_hex(&[0x00, 0xde, 0xad, 0x0f]), "\\x00dead0f");
    }

    #[test]
    fn enum_label_accepts_only_enums() {
        assert!(!<EnumLabel as FromSql>::accepts(&Type::TEXT));
        assert!(!<EnumLabel as FromSql>::accepts(&Type::INT4));
    }

    #[test]
    fn text_like_types_decode_as_strings() {
        for ty in [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME] {
            assert!(<String as FromSql>::accepts(&ty));
        }
    }
}
