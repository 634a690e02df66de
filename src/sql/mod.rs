//! SQL side: dialects, the translator and the backend that runs its output

pub mod backend;
pub mod dialects;
pub mod translator;

pub use backend::SqlBackend;
pub use dialects::{create_dialect, DatabaseBackend, SqlDialect};
pub use translator::{SqlTranslator, Statement};
