//! SQLite dialect

use super::{DatabaseBackend, SqlDialect};
use crate::error::{Error, Result};
use crate::query::Operator;

/// SQLite dialect
///
/// SQLite ships without a REGEXP implementation, so `match` and
/// `not match` are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct SQLiteDialect;

impl SQLiteDialect {
    pub fn new() -> Self {
        Self
    }
}

impl SqlDialect for SQLiteDialect {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::SQLite
    }

    fn quote_segment(&self, segment: &str) -> String {
        format!("`{}`", segment.replace('`', "``"))
    }

    fn placeholder(&self, _marker: &str, _position: usize) -> String {
        "?".to_string()
    }

    fn operator_token(&self, operator: Operator) -> Result<&'static str> {
        match operator {
            Operator::Match | Operator::NotMatch => {
                Err(Error::unsupported_operator(operator.as_str(), "sqlite"))
            }
            other => Ok(super::default_operator_token(other)),
        }
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name <> 'sqlite_sequence' ORDER BY name"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_is_unsupported() {
        let dialect = SQLiteDialect::new();
        assert!(matches!(
            dialect.operator_token(Operator::Match),
            Err(Error::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            dialect.operator_token(Operator::NotMatch),
            Err(Error::UnsupportedOperator { .. })
        ));
        assert_eq!(dialect.operator_token(Operator::Like).unwrap(), "LIKE");
    }
}
