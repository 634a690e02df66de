//! MySQL/MariaDB database adapter implementation

use crate::database::adapter::{DatabaseAdapter, QueryResult};
use crate::database::config::{BackendKind, ConnectionConfig};
use crate::database::types::{MySqlTypeConverter, SqlValue};
use crate::error::{Error, Result};
use crate::sql::dialects::DatabaseBackend;
use crate::Row;
use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlPoolOptions};
use sqlx::{MySql, MySqlPool};
use std::sync::Arc;

/// MySQL database adapter, also used for MariaDB
#[derive(Clone)]
pub struct MySqlAdapter {
    name: String,
    backend: DatabaseBackend,
    pool: Arc<MySqlPool>,
    converter: MySqlTypeConverter,
}

impl MySqlAdapter {
    /// Create a new MySQL adapter with default pool settings
    pub async fn new(name: impl Into<String>, connection_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(connection_url)
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to MySQL: {}", e)))?;

        Ok(Self::from_pool(name, pool))
    }

    /// Create a new adapter sized from a connection configuration
    pub async fn connect(name: impl Into<String>, config: &ConnectionConfig) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .connect(&config.connection_url()?)
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to MySQL: {}", e)))?;

        let mut adapter = Self::from_pool(name, pool);
        if config.backend == BackendKind::MariaDb {
            adapter.backend = DatabaseBackend::MariaDB;
        }
        Ok(adapter)
    }

    /// Create adapter from existing pool
    pub fn from_pool(name: impl Into<String>, pool: MySqlPool) -> Self {
        Self {
            name: name.into(),
            backend: DatabaseBackend::MySQL,
            pool: Arc::new(pool),
            converter: MySqlTypeConverter::new(),
        }
    }

    /// Get reference to the underlying pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    fn prepare(sql: &str, params: Vec<SqlValue>) -> sqlx::query::Query<'_, MySql, MySqlArguments> {
        params
            .into_iter()
            .fold(sqlx::query(sql), MySqlTypeConverter::bind_param)
    }
}

#[async_trait]
impl DatabaseAdapter for MySqlAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<QueryResult> {
        #[cfg(debug_assertions)]
        {
            log::debug!("MySQL EXECUTE: {}", sql);
            log::debug!("  Parameters: {:?}", params);
        }

        let result = Self::prepare(sql, params).execute(&*self.pool).await?;

        Ok(QueryResult {
            rows_affected: result.rows_affected(),
            last_insert_id: i64::try_from(result.last_insert_id()).ok(),
        })
    }

    async fn fetch_all(&self, sql: &str, params: Vec<SqlValue>) -> Result<Vec<Row>> {
        #[cfg(debug_assertions)]
        {
            log::debug!("MySQL FETCH_ALL: {}", sql);
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
            log::debug!("MySQL FETCH_ONE: {}", sql);
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
            .map_err(|e| Error::connection(format!("MySQL ping failed: {}", e)))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn DatabaseAdapter> {
        Box::new(self.clone())
    }
}
