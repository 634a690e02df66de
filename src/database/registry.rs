//! Registry of named connections
//!
//! Keeps several [`Connection`]s under names, with one of them marked as
//! the default, so an application can hold one handle per database.

use crate::connection::Connection;
use crate::database::config::DatabasesConfig;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry for managing multiple named connections
#[derive(Clone)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, Connection>>>,
    default: Arc<RwLock<Option<String>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            default: Arc::new(RwLock::new(None)),
        }
    }

    /// Connect every entry of `config` and register it under its name
    ///
    /// The entry flagged `is_default` (or the first by name) becomes the
    /// default. Stops at the first connection failure.
    pub async fn from_config(config: &DatabasesConfig) -> Result<Self> {
        let registry = Self::new();
        let default = config.get_default().map(|(name, _)| name.clone());

        for name in config.names() {
            let Some(entry) = config.get(&name) else {
                continue;
            };
            let connection = Connection::connect(entry).await.map_err(|e| {
                e.with_context(format!("Failed to connect database '{}'", name))
            })?;
            let is_default = default.as_deref() == Some(name.as_str());
            registry.register(name, connection, is_default).await;
        }

        Ok(registry)
    }

    /// Register a connection
    ///
    /// The first registered connection becomes the default unless another
    /// one is later registered with `set_as_default`.
    pub async fn register(&self, name: impl Into<String>, connection: Connection, set_as_default: bool) {
        let name = name.into();

        let mut connections = self.connections.write().await;
        connections.insert(name.clone(), connection);

        if set_as_default || connections.len() == 1 {
            let mut default = self.default.write().await;
            *default = Some(name);
        }
    }

    pub async fn get(&self, name: &str) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(name).cloned()
    }

    /// Get the default connection
    pub async fn get_default(&self) -> Result<Connection> {
        let default = self.default.read().await;

        match &*default {
            Some(name) => self.get(name).await.ok_or_else(|| {
                Error::configuration(format!("Default database '{}' not found in registry", name))
            }),
            None => Err(Error::configuration("No default database configured")),
        }
    }

    pub async fn set_default(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();

        let connections = self.connections.read().await;
        if !connections.contains_key(&name) {
            return Err(Error::configuration(format!(
                "Database '{}' not found in registry",
                name
            )));
        }
        drop(connections);

        let mut default = self.default.write().await;
        *default = Some(name);
        Ok(())
    }

    /// Registered names, sorted
    pub async fn names(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut names: Vec<String> = connections.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn contains(&self, name: &str) -> bool {
        let connections = self.connections.read().await;
        connections.contains_key(name)
    }

    /// Remove a connection; the default cannot be removed
    pub async fn remove(&self, name: &str) -> Result<Connection> {
        let default = self.default.read().await;
        if default.as_deref() == Some(name) {
            return Err(Error::invalid_state(
                "Cannot remove the default database. Set a different default first.",
            ));
        }
        drop(default);

        let mut connections = self.connections.write().await;
        connections
            .remove(name)
            .ok_or_else(|| Error::configuration(format!("Database '{}' not found", name)))
    }

    pub async fn clear(&self) {
        let mut connections = self.connections.write().await;
        connections.clear();

        let mut default = self.default.write().await;
        *default = None;
    }

    pub async fn stats(&self) -> RegistryStats {
        let connections = self.connections.read().await;
        let default = self.default.read().await;

        let mut names: Vec<String> = connections.keys().cloned().collect();
        names.sort();
        RegistryStats {
            total_databases: connections.len(),
            default_database: default.clone(),
            database_names: names,
        }
    }
}

/// Statistics about the connection registry
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub total_databases: usize,
    pub default_database: Option<String>,
    /// Sorted
    pub database_names: Vec<String>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
