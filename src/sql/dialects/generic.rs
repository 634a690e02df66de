//! Engine-neutral dialect rendering named `:markerN` placeholders

use super::{DatabaseBackend, SqlDialect};

/// Backtick quoting, `:markerN` placeholders and the default operator table
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl GenericDialect {
    pub fn new() -> Self {
        Self
    }
}

impl SqlDialect for GenericDialect {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Generic
    }

    fn quote_segment(&self, segment: &str) -> String {
        format!("`{}`", segment.replace('`', "``"))
    }

    fn placeholder(&self, marker: &str, _position: usize) -> String {
        format!(":{}", marker)
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT table_name FROM information_schema.tables"
    }
}
