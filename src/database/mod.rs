//! sqlx-backed SQL engines: adapters, value conversion, connection
//! configuration and the named connection registry

pub mod adapter;
pub mod adapters;
pub mod config;
pub mod registry;
pub mod types;

pub use adapter::{DatabaseAdapter, QueryResult};
pub use adapters::{MySqlAdapter, PostgresAdapter, SqliteAdapter};
pub use config::{BackendKind, ConnectionConfig, ConnectionConfigBuilder, DatabasesConfig};
pub use registry::{ConnectionRegistry, RegistryStats};
pub use types::SqlValue;
