//! MySQL/MariaDB dialect

use super::{DatabaseBackend, SqlDialect};

/// MySQL/MariaDB dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct MySQLDialect;

impl MySQLDialect {
    pub fn new() -> Self {
        Self
    }
}

impl SqlDialect for MySQLDialect {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySQL
    }

    fn quote_segment(&self, segment: &str) -> String {
        format!("`{}`", segment.replace('`', "``"))
    }

    fn placeholder(&self, _marker: &str, _position: usize) -> String {
        "?".to_string()
    }

    fn upsert_syntax(&self, update_columns: &[String]) -> Option<String> {
        if update_columns.is_empty() {
            return None;
        }
        Some(format!(
            " ON DUPLICATE KEY UPDATE {}",
            update_columns
                .iter()
                .map(|col| format!("{} = VALUES({})", col, col))
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn supports_mutation_joins(&self) -> bool {
        true
    }

    fn list_tables_sql(&self) -> &'static str {
        "SHOW TABLES"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Operator;

    #[test]
    fn test_quoting_escapes_backticks() {
        let dialect = MySQLDialect::new();
        assert_eq!(dialect.quote_identifier("users.age"), "`users`.`age`");
        assert_eq!(dialect.quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_operator_tokens() {
        let dialect = MySQLDialect::new();
        assert_eq!(dialect.operator_token(Operator::Match).unwrap(), "REGEXP");
        assert_eq!(dialect.operator_token(Operator::NotIn).unwrap(), "NOT IN");
    }

    #[test]
    fn test_upsert_syntax() {
        let dialect = MySQLDialect::new();
        assert_eq!(
            dialect.upsert_syntax(&["`age`".to_string()]).unwrap(),
            " ON DUPLICATE KEY UPDATE `age` = VALUES(`age`)"
        );
        assert!(dialect.upsert_syntax(&[]).is_none());
    }
}
