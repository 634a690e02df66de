//! Strata - one query interface over SQL and document databases
//!
//! Strata provides:
//! - A backend-neutral query specification (search, select, sort, join, paging)
//! - Parameterized SQL generation for MySQL/MariaDB, PostgreSQL and SQLite
//! - MongoDB filter/projection generation with emulated joins
//! - Per-query filters and validators, interceptors and result caching

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod backend;
pub mod cache;
pub mod connection;
pub mod container;
pub mod cursor;
pub mod database;
pub mod document;
pub mod error;
pub mod interceptor;
pub mod query;
pub mod sql;

/// A fetched record: field name to value, in column/document order
pub type Row = serde_json::Map<String, serde_json::Value>;

// Re-export main types for public API
pub use backend::{Backend, SaveOutcome, Translator};
pub use cache::{MemoryCache, ResultCache};
pub use connection::Connection;
pub use container::{Container, Query};
pub use cursor::RowCursor;
pub use database::{BackendKind, ConnectionConfig, ConnectionRegistry, DatabasesConfig};
pub use document::{DocumentBackend, DocumentDriver, DocumentTranslator};
pub use error::{Error, ErrorContext, Result};
pub use interceptor::{LogInterceptor, Operation, QueryEvent, QueryInterceptor, QueryOutcome};
pub use query::{Operator, QuerySpec, SortOrder};
pub use sql::{SqlBackend, SqlTranslator, Statement};

// Re-export commonly used external types
pub use serde_json::{json, Value};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::*;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::json;
}
