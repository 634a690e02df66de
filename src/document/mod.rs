//! Document-store side: driver seam, translator, join emulation and backend

pub mod backend;
pub mod convert;
pub mod driver;
pub mod join;
pub mod translator;

pub use backend::DocumentBackend;
pub use convert::{bson_to_json, document_to_row};
pub use driver::{BulkWriteResult, DocumentDriver, FindRequest, MongoDriver, WriteOp};
pub use translator::{like_pattern, DocumentTranslator, SearchPartition};
