//! [`Backend`] over a sqlx [`DatabaseAdapter`]

use super::dialects::{create_dialect, DatabaseBackend};
use super::translator::{SqlTranslator, Statement};
use crate::backend::{strip_namespace, Backend, SaveOutcome};
use crate::database::adapter::DatabaseAdapter;
use crate::database::types::SqlValue;
use crate::error::{Error, Result};
use crate::query::{first_value, Operator, Predicate, QuerySpec};
use crate::Row;
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

/// SQL backend: translates with the adapter's dialect, executes through the adapter
#[derive(Clone)]
pub struct SqlBackend {
    adapter: Arc<dyn DatabaseAdapter>,
    translator: SqlTranslator,
    primary_key: String,
}

impl SqlBackend {
    pub fn new(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        let dialect = create_dialect(adapter.backend());
        Self {
            adapter,
            translator: SqlTranslator::new(Arc::from(dialect)),
            primary_key: "id".to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.translator = self.translator.with_namespace(namespace);
        self
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn translator(&self) -> &SqlTranslator {
        &self.translator
    }

    pub fn adapter(&self) -> &Arc<dyn DatabaseAdapter> {
        &self.adapter
    }

    async fn execute(&self, statement: Statement) -> Result<crate::database::QueryResult> {
        let params = statement.values();
        self.adapter.execute(&statement.sql, params).await
    }

    /// Lookup used by `save` when the dialect has no upsert syntax
    fn save_lookup(spec: &QuerySpec, data: &Row) -> Result<QuerySpec> {
        if !spec.search_groups().is_empty() {
            return Ok(spec.clone());
        }
        let mut lookup = QuerySpec::match_all();
        for (field, value) in data {
            lookup.search(Predicate::new(field.clone(), Operator::Is, value.clone())?);
        }
        Ok(lookup)
    }

    /// Record to insert for `save`: key fields first, then the data
    fn save_record(spec: &QuerySpec, data: Row) -> Result<Row> {
        let mut record = Row::new();
        for predicate in spec.key_predicates()? {
            record.insert(predicate.field.clone(), predicate.value.clone());
        }
        record.extend(data);
        Ok(record)
    }
}

fn count_value(value: Option<JsonValue>) -> Result<u64> {
    match value.map(SqlValue::from).unwrap_or(SqlValue::Null) {
        SqlValue::Null => Ok(0),
        SqlValue::Double(f) if f >= 0.0 => Ok(f as u64),
        // Engines returning COUNT as DECIMAL text land here as strings
        other => other
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| Error::backend(format!("invalid count value {:?}", other))),
    }
}

#[async_trait]
impl Backend for SqlBackend {
    fn name(&self) -> &'static str {
        self.adapter.backend().as_str()
    }

    fn namespace(&self) -> &str {
        self.translator.namespace()
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    async fn fetch(&self, container: &str, spec: &QuerySpec) -> Result<Vec<Row>> {
        let statement = self.translator.select(container, spec)?;
        let params = statement.values();
        self.adapter.fetch_all(&statement.sql, params).await
    }

    async fn count(&self, container: &str, spec: &QuerySpec) -> Result<u64> {
        let statement = self.translator.count(container, spec)?;
        let params = statement.values();
        let row = self.adapter.fetch_one(&statement.sql, params).await?;
        let rows: Vec<Row> = row.into_iter().collect();
        count_value(first_value(&rows))
    }

    async fn insert(&self, container: &str, data: Row) -> Result<JsonValue> {
        let returning = (self.adapter.backend() == DatabaseBackend::Postgres)
            .then_some(self.primary_key.as_str());
        let statement = self.translator.insert(container, &data, returning)?;

        if returning.is_some() {
            let params = statement.values();
            let row = self.adapter.fetch_one(&statement.sql, params).await?;
            return Ok(row
                .and_then(|mut row| row.remove(&self.primary_key))
                .unwrap_or(JsonValue::Null));
        }

        let result = self.execute(statement).await?;
        if let Some(id) = data.get(&self.primary_key) {
            return Ok(id.clone());
        }
        Ok(match result.last_insert_id {
            Some(id) if id > 0 => json!(id),
            _ => JsonValue::Null,
        })
    }

    async fn update(&self, container: &str, spec: &QuerySpec, data: Row) -> Result<u64> {
        let statement = self.translator.update(container, spec, &data)?;
        Ok(self.execute(statement).await?.rows_affected)
    }

    async fn remove(&self, container: &str, spec: &QuerySpec) -> Result<u64> {
        let statement = self.translator.delete(container, spec)?;
        Ok(self.execute(statement).await?.rows_affected)
    }

    async fn save(&self, container: &str, spec: &QuerySpec, data: Row) -> Result<SaveOutcome> {
        // Neither the upsert nor the count-then-insert path can carry a join
        if !spec.joins().is_empty() {
            return Err(Error::unsupported_feature(self.name(), "JOIN in save"));
        }
        spec.key_predicates()?;
        if let Some(statement) = self.translator.upsert(container, spec, &data)? {
            let record = Self::save_record(spec, data)?;
            let result = self.execute(statement).await?;
            // ON DUPLICATE KEY UPDATE reports 1 for an insert, 2 for an update, 0 if unchanged
            return Ok(match result.rows_affected {
                1 => SaveOutcome::Inserted(match record.get(&self.primary_key) {
                    Some(id) => id.clone(),
                    None => result
                        .last_insert_id
                        .filter(|id| *id > 0)
                        .map(|id| json!(id))
                        .unwrap_or(JsonValue::Null),
                }),
                affected => SaveOutcome::Updated(affected / 2),
            });
        }

        let lookup = Self::save_lookup(spec, &data)?;
        if self.count(container, &lookup).await? > 0 {
            log::debug!("save() on '{}' matched existing rows, updating", container);
            let affected = self.update(container, &lookup, data).await?;
            Ok(SaveOutcome::Updated(affected))
        } else {
            log::debug!("save() on '{}' matched nothing, inserting", container);
            let record = Self::save_record(spec, data)?;
            Ok(SaveOutcome::Inserted(self.insert(container, record).await?))
        }
    }

    async fn container_names(&self) -> Result<Vec<String>> {
        let statement = self.translator.list_containers();
        let rows = self.adapter.fetch_all(&statement.sql, vec![]).await?;
        let names = rows
            .into_iter()
            .filter_map(|row| {
                row.into_iter()
                    .next()
                    .and_then(|(_, value)| value.as_str().map(str::to_string))
            })
            .collect();
        Ok(strip_namespace(names, self.namespace()))
    }

    async fn ping(&self) -> Result<bool> {
        self.adapter.ping().await
    }
}
