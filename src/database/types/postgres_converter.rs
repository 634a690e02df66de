//! PostgreSQL row extraction and parameter binding

use super::value::SqlValue;
use crate::error::{Error, Result};
use crate::Row as JsonRow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// PostgreSQL type converter
#[derive(Clone, Debug, Default)]
pub struct PostgresTypeConverter;

impl PostgresTypeConverter {
    pub fn new() -> Self {
        PostgresTypeConverter
    }

    /// Convert a row into an ordered JSON map keyed by column name
    pub fn row_to_json(&self, row: &PgRow) -> Result<JsonRow> {
        let mut map = JsonRow::new();
        for column in row.columns() {
            let type_name = column.type_info().name().to_uppercase();
            let value = Self::extract_value(row, column.ordinal(), &type_name)?;
            map.insert(column.name().to_string(), value.to_json());
        }
        Ok(map)
    }

    fn extract_value(row: &PgRow, index: usize, type_name: &str) -> Result<SqlValue> {
        let raw = row.try_get_raw(index).map_err(|e| {
            Error::backend(format!("Failed to read PostgreSQL column {}: {}", index, e))
        })?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }

        let decoded = match type_name {
            "BOOL" => row.try_get::<bool, _>(index).map(SqlValue::Bool),
            "INT2" => row
                .try_get::<i16, _>(index)
                .map(|i| SqlValue::BigInt(i64::from(i))),
            "INT4" => row
                .try_get::<i32, _>(index)
                .map(|i| SqlValue::BigInt(i64::from(i))),
            "INT8" => row.try_get::<i64, _>(index).map(SqlValue::BigInt),
            "FLOAT4" => row
                .try_get::<f32, _>(index)
                .map(|f| SqlValue::Double(f64::from(f))),
            "FLOAT8" => row.try_get::<f64, _>(index).map(SqlValue::Double),
            "NUMERIC" => row
                .try_get::<rust_decimal::Decimal, _>(index)
                .map(SqlValue::Decimal),
            "JSON" | "JSONB" => row.try_get::<JsonValue, _>(index).map(SqlValue::Json),
            "TIMESTAMP" => row
                .try_get::<NaiveDateTime, _>(index)
                .map(|dt| SqlValue::DateTime(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string())),
            "TIMESTAMPTZ" => row
                .try_get::<DateTime<Utc>, _>(index)
                .map(|dt| SqlValue::DateTime(dt.to_rfc3339())),
            "DATE" => row
                .try_get::<NaiveDate, _>(index)
                .map(|d| SqlValue::Date(d.to_string())),
            "TIME" => row
                .try_get::<NaiveTime, _>(index)
                .map(|t| SqlValue::Time(t.to_string())),
            "UUID" => row
                .try_get::<uuid::Uuid, _>(index)
                .map(|u| SqlValue::Uuid(u.to_string())),
            "BYTEA" => row.try_get::<Vec<u8>, _>(index).map(SqlValue::Bytes),
            _ => row.try_get::<String, _>(index).map(SqlValue::String),
        };

        decoded.or_else(|e| {
            log::warn!(
                "Unsupported PostgreSQL type {} at column {}, returning null: {}",
                type_name,
                index,
                e
            );
            Ok(SqlValue::Null)
        })
    }

    /// Bind a SqlValue to a PostgreSQL query
    pub fn bind_param(query: PgQuery<'_>, value: SqlValue) -> PgQuery<'_> {
        match value {
            // PostgreSQL requires typed NULLs
            SqlValue::Null => query.bind(None::<Vec<u8>>),
            SqlValue::Bool(b) => query.bind(b),
            SqlValue::BigInt(i) => query.bind(i),
            SqlValue::UnsignedBigInt(i) => match i64::try_from(i) {
                Ok(i) => query.bind(i),
                Err(_) => query.bind(rust_decimal::Decimal::from(i)),
            },
            SqlValue::Double(f) => query.bind(f),
            SqlValue::Decimal(d) => query.bind(d),
            SqlValue::String(s)
            | SqlValue::Date(s)
            | SqlValue::Time(s)
            | SqlValue::DateTime(s) => query.bind(s),
            SqlValue::Uuid(s) => match uuid::Uuid::parse_str(&s) {
                Ok(u) => query.bind(u),
                Err(_) => query.bind(s),
            },
            SqlValue::Bytes(b) => query.bind(b),
            SqlValue::Json(j) => query.bind(j),
        }
    }
}
