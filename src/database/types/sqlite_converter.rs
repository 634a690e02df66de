//! SQLite row extraction and parameter binding

use super::value::SqlValue;
use crate::error::{Error, Result};
use crate::Row as JsonRow;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite type converter
///
/// SQLite columns carry an affinity, not a type: a column declared
/// `INTEGER` may hold text. Values are therefore decoded from the storage
/// class of each value, and expression columns such as `COUNT(*)`, which
/// have no declared type, decode the same way.
#[derive(Clone, Debug, Default)]
pub struct SqliteTypeConverter;

impl SqliteTypeConverter {
    pub fn new() -> Self {
        SqliteTypeConverter
    }

    /// Convert a row into an ordered JSON map keyed by column name
    pub fn row_to_json(&self, row: &SqliteRow) -> Result<JsonRow> {
        let mut map = JsonRow::new();
        for column in row.columns() {
            let value = Self::extract_value(row, column.ordinal())?;
            map.insert(column.name().to_string(), value.to_json());
        }
        Ok(map)
    }

    fn extract_value(row: &SqliteRow, index: usize) -> Result<SqlValue> {
        let raw = row.try_get_raw(index).map_err(|e| {
            Error::backend(format!("Failed to read SQLite column {}: {}", index, e))
        })?;

        if raw.is_null() {
            return Ok(SqlValue::Null);
        }

        let storage_class = raw.type_info().name().to_uppercase();
        let value = match storage_class.as_str() {
            "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(index).map(SqlValue::BigInt),
            "REAL" => row.try_get::<f64, _>(index).map(SqlValue::Double),
            "BLOB" => row.try_get::<Vec<u8>, _>(index).map(SqlValue::Bytes),
            "NUMERIC" => row
                .try_get::<i64, _>(index)
                .map(SqlValue::BigInt)
                .or_else(|_| row.try_get::<f64, _>(index).map(SqlValue::Double)),
            _ => row.try_get::<String, _>(index).map(SqlValue::String),
        };

        value.or_else(|e| {
            log::warn!(
                "Could not decode SQLite value of class {} at column {}: {}",
                storage_class,
                index,
                e
            );
            row.try_get_unchecked::<String, _>(index)
                .map(SqlValue::String)
                .map_err(|e| Error::backend(format!("SQLite column {}: {}", index, e)))
        })
    }

    /// Bind a SqlValue to a SQLite query
    pub fn bind_param(query: SqliteQuery<'_>, value: SqlValue) -> SqliteQuery<'_> {
        match value {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Bool(b) => query.bind(b),
            SqlValue::BigInt(i) => query.bind(i),
            SqlValue::UnsignedBigInt(i) => match i64::try_from(i) {
                Ok(i) => query.bind(i),
                // Past INTEGER range, keep the digits
                Err(_) => query.bind(i.to_string()),
            },
            SqlValue::Double(f) => query.bind(f),
            SqlValue::Decimal(d) => query.bind(d.to_string()),
            SqlValue::String(s)
            | SqlValue::Uuid(s)
            | SqlValue::Date(s)
            | SqlValue::Time(s)
            | SqlValue::DateTime(s) => query.bind(s),
            SqlValue::Bytes(b) => query.bind(b),
            SqlValue::Json(j) => query.bind(j.to_string()),
        }
    }
}
