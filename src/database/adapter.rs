//! Database adapter trait over the sqlx engines
//!
//! An adapter owns a connection pool and runs already-translated SQL with
//! positional parameters. Rows come back as ordered JSON maps.

use crate::database::types::SqlValue;
use crate::error::Result;
use crate::sql::dialects::DatabaseBackend;
use crate::Row;
use async_trait::async_trait;

/// Result type for statements that modify data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryResult {
    /// Number of rows affected by the statement
    pub rows_affected: u64,
    /// Last inserted id, where the engine reports one
    pub last_insert_id: Option<i64>,
}

/// Unified database adapter trait
///
/// Implemented for PostgreSQL, MySQL/MariaDB and SQLite. Every call
/// acquires a pooled connection for the duration of one statement.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Name of this connection
    fn name(&self) -> &str;

    fn backend(&self) -> DatabaseBackend;

    /// Execute a statement that modifies data (INSERT, UPDATE, DELETE)
    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<QueryResult>;

    /// Fetch all rows of a query
    async fn fetch_all(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>>;

    /// Fetch the first row of a query, if any
    async fn fetch_one(&self, sql: &str, params: Vec<SqlValue>) -> Result<Option<Row>>;

    /// Test database connectivity
    async fn ping(&self) -> Result<bool>;

    /// The concrete adapter, for callers that need the underlying pool
    fn as_any(&self) -> &dyn std::any::Any;

    fn clone_box(&self) -> Box<dyn DatabaseAdapter>;
}

impl Clone for Box<dyn DatabaseAdapter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
