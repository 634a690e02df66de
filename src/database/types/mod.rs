//! Value type and per-engine conversions between sqlx rows/arguments and JSON

pub mod mysql_converter;
pub mod postgres_converter;
pub mod sqlite_converter;
pub mod value;

pub use mysql_converter::MySqlTypeConverter;
pub use postgres_converter::PostgresTypeConverter;
pub use sqlite_converter::SqliteTypeConverter;
pub use value::SqlValue;
