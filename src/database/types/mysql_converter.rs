//! MySQL/MariaDB row extraction and parameter binding

use super::value::SqlValue;
use crate::error::{Error, Result};
use crate::Row as JsonRow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::{Column, MySql, Row, TypeInfo, ValueRef};

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// MySQL type converter
#[derive(Clone, Debug, Default)]
pub struct MySqlTypeConverter;

impl MySqlTypeConverter {
    pub fn new() -> Self {
        MySqlTypeConverter
    }

    /// Convert a row into an ordered JSON map keyed by column name
    pub fn row_to_json(&self, row: &MySqlRow) -> Result<JsonRow> {
        let mut map = JsonRow::new();
        for column in row.columns() {
            let type_name = column.type_info().name().to_uppercase();
            let value = Self::extract_value(row, column.ordinal(), &type_name)?;
            map.insert(column.name().to_string(), value.to_json());
        }
        Ok(map)
    }

    fn extract_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<SqlValue> {
        let raw = row.try_get_raw(index).map_err(|e| {
            Error::backend(format!("Failed to read MySQL column {}: {}", index, e))
        })?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }

        let decoded = match type_name {
            "BOOLEAN" => row.try_get::<bool, _>(index).map(SqlValue::Bool),
            t if t.ends_with("UNSIGNED") => {
                row.try_get::<u64, _>(index).map(SqlValue::UnsignedBigInt)
            }
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                row.try_get::<i64, _>(index).map(SqlValue::BigInt)
            }
            "YEAR" => row
                .try_get::<u16, _>(index)
                .map(|year| SqlValue::BigInt(i64::from(year))),
            "FLOAT" => row
                .try_get::<f32, _>(index)
                .map(|f| SqlValue::Double(f64::from(f))),
            "DOUBLE" => row.try_get::<f64, _>(index).map(SqlValue::Double),
            "DECIMAL" => row
                .try_get::<rust_decimal::Decimal, _>(index)
                .map(SqlValue::Decimal),
            "DATETIME" => row
                .try_get::<NaiveDateTime, _>(index)
                .map(|dt| SqlValue::DateTime(dt.format("%Y-%m-%d %H:%M:%S").to_string())),
            "TIMESTAMP" => row
                .try_get::<DateTime<Utc>, _>(index)
                .map(|dt| SqlValue::DateTime(dt.to_rfc3339())),
            "DATE" => row
                .try_get::<NaiveDate, _>(index)
                .map(|d| SqlValue::Date(d.to_string())),
            "TIME" => row
                .try_get::<NaiveTime, _>(index)
                .map(|t| SqlValue::Time(t.to_string())),
            "JSON" => row.try_get::<JsonValue, _>(index).map(SqlValue::Json),
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
                row.try_get::<Vec<u8>, _>(index).map(SqlValue::Bytes)
            }
            _ => row.try_get::<String, _>(index).map(SqlValue::String),
        };

        decoded.or_else(|e| {
            log::trace!(
                "MySQL column {} of type {} decoded as text: {}",
                index,
                type_name,
                e
            );
            row.try_get_unchecked::<String, _>(index)
                .map(SqlValue::String)
                .map_err(|e| Error::backend(format!("MySQL column {}: {}", index, e)))
        })
    }

    /// Bind a SqlValue to a MySQL query
    pub fn bind_param(query: MySqlQuery<'_>, value: SqlValue) -> MySqlQuery<'_> {
        match value {
            SqlValue::Null => query.bind(None::<Vec<u8>>),
            SqlValue::Bool(b) => query.bind(b),
            SqlValue::BigInt(i) => query.bind(i),
            SqlValue::UnsignedBigInt(i) => query.bind(i),
            SqlValue::Double(f) => query.bind(f),
            SqlValue::Decimal(d) => query.bind(d),
            SqlValue::String(s)
            | SqlValue::Uuid(s)
            | SqlValue::Date(s)
            | SqlValue::Time(s)
            | SqlValue::DateTime(s) => query.bind(s),
            SqlValue::Bytes(b) => query.bind(b),
            SqlValue::Json(j) => query.bind(j),
        }
    }
}
