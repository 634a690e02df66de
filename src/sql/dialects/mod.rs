//! SQL dialects: identifier quoting, placeholders, operator tokens and
//! clause syntax per engine

use crate::error::Result;
use crate::query::Operator;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod generic;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use generic::GenericDialect;
pub use mysql::MySQLDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SQLiteDialect;

/// SQL engines with a dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    MySQL,
    MariaDB,
    SQLite,
    /// Engine-neutral rendering with named `:markerN` placeholders
    Generic,
}

impl DatabaseBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseBackend::Postgres => "postgres",
            DatabaseBackend::MySQL => "mysql",
            DatabaseBackend::MariaDB => "mariadb",
            DatabaseBackend::SQLite => "sqlite",
            DatabaseBackend::Generic => "generic",
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row count used when a skip is given without a limit
pub const UNBOUNDED_LIMIT: i64 = i64::MAX;

/// `name(inner)`: a single leading identifier wrapping a parenthesized argument
static FUNCTION_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\((.+)\)\s*$")
        .expect("dialects: Invalid function call regex")
});

/// Split `name(inner)` into its function name and argument
pub fn split_function_call(raw: &str) -> Option<(&str, &str)> {
    let captures = FUNCTION_CALL.captures(raw)?;
    let name = captures.get(1)?.as_str();
    let inner = captures.get(2)?.as_str();
    Some((name, inner))
}

/// Quote `raw` segment by segment with `quote_segment`
///
/// `*` passes through, `name(inner)` quotes only `inner`, and dotted
/// `container.field` forms quote every non-wildcard segment.
pub fn quote_with<F>(raw: &str, quote_segment: F) -> String
where
    F: Fn(&str) -> String,
{
    let raw = raw.trim();
    if raw == "*" {
        return raw.to_string();
    }

    if let Some((name, inner)) = split_function_call(raw) {
        return format!("{}({})", name, quote_with(inner, quote_segment));
    }

    raw.split('.')
        .map(|segment| {
            if segment == "*" {
                segment.to_string()
            } else {
                quote_segment(segment)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Operator tokens shared by the MySQL family and the generic dialect
pub fn default_operator_token(operator: Operator) -> &'static str {
    match operator {
        Operator::Is => "=",
        Operator::IsNot => "<>",
        Operator::Greater => ">",
        Operator::Less => "<",
        Operator::In => "IN",
        Operator::NotIn => "NOT IN",
        Operator::Like => "LIKE",
        Operator::NotLike => "NOT LIKE",
        Operator::Match => "REGEXP",
        Operator::NotMatch => "NOT REGEXP",
    }
}

/// `LIMIT skip,limit` form used by MySQL and SQLite
pub fn comma_limit_syntax(limit: Option<i64>, skip: Option<i64>) -> String {
    match (limit, skip) {
        (Some(limit), Some(skip)) => format!(" LIMIT {},{}", skip, limit),
        (Some(limit), None) => format!(" LIMIT 0,{}", limit),
        (None, Some(skip)) => format!(" LIMIT {},{}", skip, UNBOUNDED_LIMIT),
        (None, None) => String::new(),
    }
}

/// Engine-specific SQL generation
pub trait SqlDialect: Send + Sync + fmt::Debug {
    fn backend(&self) -> DatabaseBackend;

    /// Quote one identifier segment, escaping embedded delimiters
    fn quote_segment(&self, segment: &str) -> String;

    /// Quote a field or container reference (see [`quote_with`])
    fn quote_identifier(&self, identifier: &str) -> String {
        quote_with(identifier, |segment| self.quote_segment(segment))
    }

    /// Placeholder text for the marker at 1-based `position`
    fn placeholder(&self, marker: &str, position: usize) -> String;

    /// Token for a comparison operator, or `UnsupportedOperator`
    fn operator_token(&self, operator: Operator) -> Result<&'static str> {
        Ok(default_operator_token(operator))
    }

    fn limit_syntax(&self, limit: Option<i64>, skip: Option<i64>) -> String {
        comma_limit_syntax(limit, skip)
    }

    /// `ON DUPLICATE KEY UPDATE` style tail for INSERT, when the engine has one
    fn upsert_syntax(&self, _update_columns: &[String]) -> Option<String> {
        None
    }

    /// Whether UPDATE and DELETE may carry JOIN clauses
    fn supports_mutation_joins(&self) -> bool {
        false
    }

    /// `RETURNING` tail for INSERT, when the engine supports it
    fn returning_syntax(&self, _columns: &[String]) -> Option<String> {
        None
    }

    /// Statement listing the tables of the current database
    fn list_tables_sql(&self) -> &'static str;
}

/// Factory function to create the appropriate dialect for a database backend
pub fn create_dialect(backend: DatabaseBackend) -> Box<dyn SqlDialect> {
    match backend {
        DatabaseBackend::Postgres => Box::new(PostgresDialect::new()),
        DatabaseBackend::MySQL | DatabaseBackend::MariaDB => Box::new(MySQLDialect::new()),
        DatabaseBackend::SQLite => Box::new(SQLiteDialect::new()),
        DatabaseBackend::Generic => Box::new(GenericDialect::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backticks(segment: &str) -> String {
        format!("`{}`", segment)
    }

    #[test]
    fn test_wildcard_passes_through() {
        assert_eq!(quote_with("*", backticks), "*");
        assert_eq!(quote_with("users.*", backticks), "`users`.*");
    }

    #[test]
    fn test_function_call_quotes_inner_only() {
        assert_eq!(quote_with("COUNT(*)", backticks), "COUNT(*)");
        assert_eq!(quote_with("MAX(age)", backticks), "MAX(`age`)");
        assert_eq!(quote_with("lower(users.name)", backticks), "lower(`users`.`name`)");
    }

    #[test]
    fn test_dotted_segments() {
        assert_eq!(quote_with("age", backticks), "`age`");
        assert_eq!(quote_with("users.age", backticks), "`users`.`age`");
    }

    #[test]
    fn test_split_function_call() {
        assert_eq!(split_function_call("COUNT(id)"), Some(("COUNT", "id")));
        assert_eq!(split_function_call("users.id"), None);
        assert_eq!(split_function_call("1drop(x)"), None);
    }

    #[test]
    fn test_comma_limit_syntax() {
        assert_eq!(comma_limit_syntax(None, None), "");
        assert_eq!(comma_limit_syntax(Some(10), None), " LIMIT 0,10");
        assert_eq!(comma_limit_syntax(Some(10), Some(5)), " LIMIT 5,10");
        assert_eq!(
            comma_limit_syntax(None, Some(5)),
            format!(" LIMIT 5,{}", UNBOUNDED_LIMIT)
        );
    }

    #[test]
    fn test_create_dialect() {
        for backend in [
            DatabaseBackend::Postgres,
            DatabaseBackend::MySQL,
            DatabaseBackend::MariaDB,
            DatabaseBackend::SQLite,
            DatabaseBackend::Generic,
        ] {
            let dialect = create_dialect(backend);
            let expected = match backend {
                DatabaseBackend::MariaDB => DatabaseBackend::MySQL,
                other => other,
            };
            assert_eq!(dialect.backend(), expected);
        }
    }
}
