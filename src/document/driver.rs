//! Document-store driver seam and its MongoDB implementation
//!
//! The backend speaks to the store through three primitives: run a find
//! with cursor options, count matching documents, and apply a batch of
//! writes. Keeping the seam this narrow lets tests drive the backend with
//! an in-memory store.

use crate::database::config::ConnectionConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};

/// A find with its cursor options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindRequest {
    pub filter: Document,
    pub projection: Option<Document>,
    /// Field → `1` or `-1`, in precedence order
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

impl FindRequest {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }
}

/// One write in a batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert(Document),
    Update {
        filter: Document,
        update: Document,
        upsert: bool,
        /// Update every match instead of the first one
        multi: bool,
    },
    Delete {
        filter: Document,
        multi: bool,
    },
}

/// Counters accumulated over a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteResult {
    pub inserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub deleted: u64,
    /// Id of the document created by an upsert, if any
    pub upserted_id: Option<Bson>,
}

/// Minimal document-store interface used by the document backend
#[async_trait]
pub trait DocumentDriver: Send + Sync {
    async fn execute_query(&self, collection: &str, request: &FindRequest) -> Result<Vec<Document>>;

    async fn count_documents(&self, collection: &str, filter: &Document) -> Result<u64>;

    /// Apply `ops` in order; stops at the first failure
    async fn execute_bulk_write(&self, collection: &str, ops: Vec<WriteOp>) -> Result<BulkWriteResult>;

    async fn collection_names(&self) -> Result<Vec<String>>;

    async fn ping(&self) -> Result<bool> {
        Ok(true)
    }
}

/// MongoDB driver over one database
#[derive(Clone, Debug)]
pub struct MongoDriver {
    database: Database,
}

impl MongoDriver {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Connect with pool settings from the configuration
    ///
    /// The database is `config.database`, or the default database named in the URL.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let url = config.connection_url()?;
        let mut options = ClientOptions::parse(&url).await?;
        options.max_pool_size = Some(config.max_connections);
        options.min_pool_size = Some(config.min_connections);
        options.connect_timeout = Some(config.connect_timeout());
        options.max_idle_time = Some(config.idle_timeout());

        let name = config
            .database
            .clone()
            .or_else(|| options.default_database.clone())
            .ok_or_else(|| Error::configuration("mongodb connection needs a database name"))?;

        let client = Client::with_options(options)?;
        log::info!("MongoDB client ready for database '{}'", name);
        Ok(Self::new(client.database(&name)))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

#[async_trait]
impl DocumentDriver for MongoDriver {
    async fn execute_query(&self, collection: &str, request: &FindRequest) -> Result<Vec<Document>> {
        log::debug!(
            "MongoDB FIND {}: filter={} projection={:?} sort={:?} limit={:?} skip={:?}",
            collection,
            request.filter,
            request.projection,
            request.sort,
            request.limit,
            request.skip
        );

        let collection = self.database.collection::<Document>(collection);
        let mut find = collection.find(request.filter.clone());
        if let Some(projection) = &request.projection {
            find = find.projection(projection.clone());
        }
        if let Some(sort) = &request.sort {
            find = find.sort(sort.clone());
        }
        if let Some(limit) = request.limit {
            find = find.limit(limit);
        }
        if let Some(skip) = request.skip {
            find = find.skip(skip);
        }

        // The cursor is drained here and dropped on every path
        let cursor = find.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count_documents(&self, collection: &str, filter: &Document) -> Result<u64> {
        log::debug!("MongoDB COUNT {}: filter={}", collection, filter);
        let collection = self.database.collection::<Document>(collection);
        Ok(collection.count_documents(filter.clone()).await?)
    }

    async fn execute_bulk_write(&self, collection: &str, ops: Vec<WriteOp>) -> Result<BulkWriteResult> {
        let collection = self.database.collection::<Document>(collection);
        let mut result = BulkWriteResult::default();

        for op in ops {
            log::debug!("MongoDB WRITE {}: {:?}", collection.name(), op);
            match op {
                WriteOp::Insert(document) => {
                    collection.insert_one(document).await?;
                    result.inserted += 1;
                }
                WriteOp::Update {
                    filter,
                    update,
                    upsert,
                    multi,
                } => {
                    let outcome = if multi {
                        collection.update_many(filter, update).upsert(upsert).await?
                    } else {
                        collection.update_one(filter, update).upsert(upsert).await?
                    };
                    result.matched += outcome.matched_count;
                    result.modified += outcome.modified_count;
                    if outcome.upserted_id.is_some() {
                        result.upserted_id = outcome.upserted_id;
                    }
                }
                WriteOp::Delete { filter, multi } => {
                    let outcome = if multi {
                        collection.delete_many(filter).await?
                    } else {
                        collection.delete_one(filter).await?
                    };
                    result.deleted += outcome.deleted_count;
                }
            }
        }

        Ok(result)
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        Ok(self.database.list_collection_names().await?)
    }

    async fn ping(&self) -> Result<bool> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| true)
            .map_err(|e| Error::connection(format!("MongoDB ping failed: {}", e)))
    }
}
