//! SQLite database adapter implementation

use crate::database::adapter::{DatabaseAdapter, QueryResult};
use crate::database::config::ConnectionConfig;
use crate::database::types::{SqlValue, SqliteTypeConverter};
use crate::error::{Error, Result};
use crate::sql::dialects::DatabaseBackend;
use crate::Row;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use std::sync::Arc;

/// SQLite database adapter
#[derive(Clone)]
pub struct SqliteAdapter {
    name: String,
    pool: Arc<SqlitePool>,
    converter: SqliteTypeConverter,
}

impl SqliteAdapter {
    /// Create a new SQLite adapter with default pool settings
    pub async fn new(name: impl Into<String>, connection_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(connection_url)
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to SQLite: {}", e)))?;

        Ok(Self::from_pool(name, pool))
    }

    /// Create a new SQLite adapter sized from a connection configuration
    ///
    /// An in-memory database lives as long as its connection, so those
    /// pools hold exactly one connection that never expires.
    pub async fn connect(name: impl Into<String>, config: &ConnectionConfig) -> Result<Self> {
        let url = config.connection_url()?;
        let options = if url.contains(":memory:") {
            log::debug!("SQLite in-memory database, pinning a single connection");
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(config.idle_timeout())
                .max_lifetime(config.max_lifetime())
        };

        let pool = options
            .acquire_timeout(config.connect_timeout())
            .connect(&url)
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to SQLite: {}", e)))?;

        Ok(Self::from_pool(name, pool))
    }

    /// Create adapter from existing pool
    pub fn from_pool(name: impl Into<String>, pool: SqlitePool) -> Self {
        Self {
            name: name.into(),
            pool: Arc::new(pool),
            converter: SqliteTypeConverter::new(),
        }
    }

    /// Get reference to the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn prepare<'q>(
        sql: &'q str,
        params: Vec<SqlValue>,
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        params
            .into_iter()
            .fold(sqlx::query(sql), SqliteTypeConverter::bind_param)
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::SQLite
    }

    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<QueryResult> {
        #[cfg(debug_assertions)]
        {
            log::debug!("SQLite EXECUTE: {}", sql);
            log::debug!("  Parameters: {:?}", params);
        }

        let result = Self::prepare(sql, params).execute(&*self.pool).await?;

        Ok(QueryResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn fetch_all(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>> {
        #[cfg(debug_assertions)]
        {
            log::debug!("SQLite FETCH_ALL: {}", sql);
            log::debug!("  Parameters: {:?}", params);
        }

        let rows = Self::prepare(sql, params).fetch_all(&*self.pool).await?;
        rows.iter()
            .map(|row| self.converter.row_to_json(row))
            .collect()
    }

    async fn fetch_one(&self, sql: &str, params: Vec<SqlValue>) -> Result<Option<Row>> {
        #[cfg(debug_assertions)]
        {
            log::debug!("SQLite FETCH_ONE: {}", sql);
            log::debug!("  Parameters: {:?}", params);
        }

        let row = Self::prepare(sql, params)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(|row| self.converter.row_to_json(&row)).transpose()
    }

    async fn ping(&self) -> Result<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&*self.pool)
            .await
            .map(|_| true)
            .map_err(|e| Error::connection(format!("SQLite ping failed: {}", e)))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn DatabaseAdapter> {
        Box::new(self.clone())
    }
}
