//! [`Backend`] over a [`DocumentDriver`]

use super::convert::{bson_to_json, document_to_row};
use super::driver::{DocumentDriver, WriteOp};
use super::join::{resolve_aliases, restrict_to_selection, JoinEmulator};
use super::translator::DocumentTranslator;
use crate::backend::{strip_namespace, Backend, SaveOutcome, Translator};
use crate::error::{Error, Result};
use crate::query::QuerySpec;
use crate::Row;
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use serde_json::Value as JsonValue;
use std::sync::Arc;

const BACKEND: &str = "mongodb";

/// Document-store backend with client-side join emulation
#[derive(Clone)]
pub struct DocumentBackend {
    driver: Arc<dyn DocumentDriver>,
    translator: DocumentTranslator,
    namespace: String,
}

impl DocumentBackend {
    pub fn new(driver: Arc<dyn DocumentDriver>) -> Self {
        Self {
            driver,
            translator: DocumentTranslator::default(),
            namespace: String::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.translator = DocumentTranslator::new(primary_key);
        self
    }

    pub fn translator(&self) -> &DocumentTranslator {
        &self.translator
    }

    fn collection(&self, container: &str) -> String {
        format!("{}{}", self.namespace, container)
    }

    /// Filter for a write: the root search, without joins
    fn write_filter(&self, container: &str, spec: &QuerySpec, operation: &str) -> Result<Document> {
        if !spec.joins().is_empty() {
            return Err(Error::unsupported_feature(
                BACKEND,
                format!("JOIN in {}", operation),
            ));
        }
        let partition = self.translator.partition_search(container, spec)?;
        self.translator.filter(&partition.root)
    }

    fn set_document(&self, data: &Row, operation: &str) -> Result<Document> {
        if data.is_empty() {
            return Err(Error::invalid_argument(format!(
                "{}() needs at least one field",
                operation
            )));
        }
        let mut update = Document::new();
        update.insert("$set", self.translator.document(data)?);
        Ok(update)
    }
}

/// Skip then limit; a negative limit reads as its magnitude, like the store does
fn page(rows: Vec<Row>, skip: Option<u64>, limit: Option<i64>) -> Vec<Row> {
    let skip = usize::try_from(skip.unwrap_or(0)).unwrap_or(usize::MAX);
    let limit = limit
        .map(|limit| usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX))
        .unwrap_or(usize::MAX);
    rows.into_iter().skip(skip).take(limit).collect()
}

#[async_trait]
impl Backend for DocumentBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn primary_key(&self) -> &str {
        self.translator.primary_key()
    }

    async fn fetch(&self, container: &str, spec: &QuerySpec) -> Result<Vec<Row>> {
        let mut request = self.translator.translate(container, spec)?;
        let partition = self.translator.partition_search(container, spec)?;
        // The store reads a zero limit as "no limit"
        if request.limit == Some(0) {
            return Ok(Vec::new());
        }
        // Semi-joins drop root rows, so paging waits for the merged rows
        let deferred_paging = if partition.joined.is_empty() {
            None
        } else {
            Some((request.skip.take(), request.limit.take()))
        };

        let documents = self
            .driver
            .execute_query(&self.collection(container), &request)
            .await?;
        let mut rows: Vec<Row> = documents.into_iter().map(document_to_row).collect();

        resolve_aliases(&mut rows, spec, container, true)?;
        if !spec.joins().is_empty() {
            rows = JoinEmulator::new(self.driver.as_ref(), &self.translator, &self.namespace)
                .apply(container, spec, &partition, rows)
                .await?;
        }
        if let Some((skip, limit)) = deferred_paging {
            rows = page(rows, skip, limit);
        }
        Ok(restrict_to_selection(rows, spec))
    }

    async fn count(&self, container: &str, spec: &QuerySpec) -> Result<u64> {
        if !spec.joins().is_empty() {
            // Semi-joins can drop rows, so the joined rows are counted
            let mut unpaged = spec.clone();
            unpaged.limit = None;
            unpaged.skip = None;
            return Ok(self.fetch(container, &unpaged).await?.len() as u64);
        }

        let request = self.translator.translate(container, spec)?;
        self.driver
            .count_documents(&self.collection(container), &request.filter)
            .await
    }

    async fn insert(&self, container: &str, data: Row) -> Result<JsonValue> {
        let mut document = self.translator.document(&data)?;
        let key = self.translator.primary_key().to_string();
        if !document.contains_key(&key) {
            document.insert(key.clone(), ObjectId::new());
        }
        let id = document.get(&key).cloned().unwrap_or(Bson::Null);

        self.driver
            .execute_bulk_write(&self.collection(container), vec![WriteOp::Insert(document)])
            .await?;
        Ok(bson_to_json(id))
    }

    async fn update(&self, container: &str, spec: &QuerySpec, data: Row) -> Result<u64> {
        let filter = self.write_filter(container, spec, "UPDATE")?;
        let update = self.set_document(&data, "update")?;

        let result = self
            .driver
            .execute_bulk_write(
                &self.collection(container),
                vec![WriteOp::Update {
                    filter,
                    update,
                    upsert: false,
                    multi: true,
                }],
            )
            .await?;
        Ok(result.modified)
    }

    async fn remove(&self, container: &str, spec: &QuerySpec) -> Result<u64> {
        let filter = self.write_filter(container, spec, "DELETE")?;
        let result = self
            .driver
            .execute_bulk_write(
                &self.collection(container),
                vec![WriteOp::Delete {
                    filter,
                    multi: true,
                }],
            )
            .await?;
        Ok(result.deleted)
    }

    async fn save(&self, container: &str, spec: &QuerySpec, data: Row) -> Result<SaveOutcome> {
        if !spec.joins().is_empty() {
            return Err(Error::unsupported_feature(BACKEND, "JOIN in save"));
        }
        spec.key_predicates()?;
        let update = self.set_document(&data, "save")?;
        let filter = if spec.search_groups().is_empty() {
            self.translator.document(&data)?
        } else {
            self.write_filter(container, spec, "save")?
        };

        let result = self
            .driver
            .execute_bulk_write(
                &self.collection(container),
                vec![WriteOp::Update {
                    filter,
                    update,
                    upsert: true,
                    multi: false,
                }],
            )
            .await?;

        Ok(match result.upserted_id {
            Some(id) => SaveOutcome::Inserted(bson_to_json(id)),
            None => SaveOutcome::Updated(result.matched),
        })
    }

    async fn container_names(&self) -> Result<Vec<String>> {
        let names = self.driver.collection_names().await?;
        Ok(strip_namespace(names, &self.namespace))
    }

    async fn ping(&self) -> Result<bool> {
        self.driver.ping().await
    }
}
