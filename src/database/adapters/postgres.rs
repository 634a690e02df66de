//! PostgreSQL database adapter implementation

use crate::database::adapter::{DatabaseAdapter, QueryResult};
use crate::database::config::ConnectionConfig;
use crate::database::types::{PostgresTypeConverter, SqlValue};
use crate::error::{Error, Result};
use crate::sql::dialects::DatabaseBackend;
use crate::Row;
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{PgPool, Postgres};
use std::sync::Arc;

/// PostgreSQL database adapter
#[derive(Clone)]
pub struct PostgresAdapter {
    name: String,
    pool: Arc<PgPool>,
    converter: PostgresTypeConverter,
}

impl PostgresAdapter {
    /// Create a new PostgreSQL adapter with default pool settings
    pub async fn new(name: impl Into<String>, connection_url: &str) -> Result<Self> {
        let pool = PgPool::connect(connection_url)
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self::from_pool(name, pool))
    }

    /// Create a new adapter sized from a connection configuration
    pub async fn connect(name: impl Into<String>, config: &ConnectionConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .connect(&config.connection_url()?)
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self::from_pool(name, pool))
    }

    /// Create adapter from existing pool
    pub fn from_pool(name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            name: name.into(),
            pool: Arc::new(pool),
            converter: PostgresTypeConverter::new(),
        }
    }

    /// Get reference to the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn prepare(sql: &str, params: Vec<SqlValue>) -> sqlx::query::Query<'_, Postgres, PgArguments> {
        params
            .into_iter()
            .fold(sqlx::query(sql), PostgresTypeConverter::bind_param)
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Postgres
    }

    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<QueryResult> {
        #[cfg(debug_assertions)]
        {
            log::debug!("PostgreSQL EXECUTE: {}", sql);
            log::debug!("  Parameters: {:?}", params);
        }

        let result = Self::prepare(sql, params).execute(&*self.pool).await?;

        // Generated keys come back through RETURNING instead
        Ok(QueryResult {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }

    async fn fetch_all(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>> {
        #[cfg(debug_assertions)]
        {
            log::debug!("PostgreSQL FETCH_ALL: {}", sql);
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
            log::debug!("PostgreSQL FETCH_ONE: {}", sql);
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
            .map_err(|e| Error::connection(format!("PostgreSQL ping failed: {}", e)))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn DatabaseAdapter> {
        Box::new(self.clone())
    }
}
