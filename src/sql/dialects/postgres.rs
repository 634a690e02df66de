//! PostgreSQL dialect

use super::{DatabaseBackend, SqlDialect};
use crate::error::Result;
use crate::query::Operator;

/// PostgreSQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub fn new() -> Self {
        Self
    }
}

impl SqlDialect for PostgresDialect {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Postgres
    }

    fn quote_segment(&self, segment: &str) -> String {
        format!("\"{}\"", segment.replace('"', "\"\""))
    }

    fn placeholder(&self, _marker: &str, position: usize) -> String {
        format!("${}", position)
    }

    fn operator_token(&self, operator: Operator) -> Result<&'static str> {
        Ok(match operator {
            Operator::Match => "~",
            Operator::NotMatch => "!~",
            other => super::default_operator_token(other),
        })
    }

    fn limit_syntax(&self, limit: Option<i64>, skip: Option<i64>) -> String {
        let mut sql = String::new();
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(skip) = skip {
            sql.push_str(&format!(" OFFSET {}", skip));
        }
        sql
    }

    fn returning_syntax(&self, columns: &[String]) -> Option<String> {
        Some(format!(" RETURNING {}", columns.join(", ")))
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname = current_schema() ORDER BY tablename"
    }
}
