//! SQL value type used for parameter binding and result extraction

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Value bound to a statement marker or read back from a column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    BigInt(i64),
    UnsignedBigInt(u64),
    Double(f64),
    Decimal(rust_decimal::Decimal),
    String(String),
    Bytes(Vec<u8>),

    // Semantic types, carried as text
    Uuid(String),
    Date(String),
    Time(String),
    DateTime(String),

    /// Arrays and objects, stored as JSON text where the engine has no JSON type
    Json(JsonValue),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::BigInt(i) => Some(*i),
            SqlValue::UnsignedBigInt(i) => i64::try_from(*i).ok(),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Convert to the JSON value returned in result rows
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Null => JsonValue::Null,
            SqlValue::Bool(b) => JsonValue::Bool(*b),
            SqlValue::BigInt(i) => JsonValue::from(*i),
            SqlValue::UnsignedBigInt(i) => JsonValue::from(*i),
            SqlValue::Double(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            SqlValue::Decimal(d) => JsonValue::String(d.to_string()),
            SqlValue::String(s)
            | SqlValue::Uuid(s)
            | SqlValue::Date(s)
            | SqlValue::Time(s)
            | SqlValue::DateTime(s) => JsonValue::String(s.clone()),
            SqlValue::Bytes(b) => {
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            SqlValue::Json(j) => j.clone(),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::BigInt(i) => write!(f, "{}", i),
            SqlValue::UnsignedBigInt(i) => write!(f, "{}", i),
            SqlValue::Double(v) => write!(f, "{}", v),
            SqlValue::Decimal(d) => write!(f, "{}", d),
            SqlValue::String(s)
            | SqlValue::Uuid(s)
            | SqlValue::Date(s)
            | SqlValue::Time(s)
            | SqlValue::DateTime(s) => write!(f, "'{}'", s),
            SqlValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            SqlValue::Json(j) => write!(f, "{}", j),
        }
    }
}

impl From<&JsonValue> for SqlValue {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::BigInt(i)
                } else if let Some(u) = n.as_u64() {
                    SqlValue::UnsignedBigInt(u)
                } else {
                    SqlValue::Double(n.as_f64().unwrap_or_default())
                }
            }
            JsonValue::String(s) => SqlValue::String(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => SqlValue::Json(value.clone()),
        }
    }
}

impl From<JsonValue> for SqlValue {
    fn from(value: JsonValue) -> Self {
        SqlValue::from(&value)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::String(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::String(s)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::BigInt(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        assert_eq!(SqlValue::from(&json!(25)), SqlValue::BigInt(25));
        assert_eq!(SqlValue::from(&json!(1.5)), SqlValue::Double(1.5));
        assert_eq!(
            SqlValue::from(&json!(u64::MAX)),
            SqlValue::UnsignedBigInt(u64::MAX)
        );
        assert_eq!(SqlValue::from(&json!("JohnDoe")), SqlValue::from("JohnDoe"));
        assert_eq!(SqlValue::from(&json!(null)), SqlValue::Null);
        assert_eq!(
            SqlValue::from(&json!({"a": 1})),
            SqlValue::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(SqlValue::BigInt(7).as_i64(), Some(7));
        assert_eq!(SqlValue::from("12").as_i64(), Some(12));
        assert_eq!(SqlValue::Bool(true).as_i64(), Some(1));
        assert_eq!(SqlValue::UnsignedBigInt(u64::MAX).as_i64(), None);
        assert_eq!(SqlValue::Null.as_i64(), None);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(SqlValue::BigInt(26).to_json(), json!(26));
        assert_eq!(SqlValue::Bytes(vec![1, 2, 3]).to_json(), json!("AQID"));
        assert_eq!(SqlValue::Double(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(
            SqlValue::DateTime("2024-01-01 10:00:00".into()).to_json(),
            json!("2024-01-01 10:00:00")
        );
    }

    #[test]
    fn test_display_for_logging() {
        assert_eq!(SqlValue::from("JohnDoe").to_string(), "'JohnDoe'");
        assert_eq!(SqlValue::Null.to_string(), "NULL");
    }
}
