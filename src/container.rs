//! Container and query handles
//!
//! A [`Container`] names one table or collection on a [`Connection`]. Its
//! `search*` methods start a [`Query`], which accumulates a [`QuerySpec`]
//! plus per-query filters and validators through chained calls and ends in
//! one of the terminal operations.
//!
//! ```rust,ignore
//! let adults = connection
//!     .container("users")
//!     .search("age", "greater", 17)?
//!     .select_as("username", "name")?
//!     .sort("age", "desc")?
//!     .limit(10)?
//!     .fetch()
//!     .await?;
//! ```

use crate::backend::SaveOutcome;
use crate::connection::Connection;
use crate::cursor::RowCursor;
use crate::error::{Error, Result};
use crate::interceptor::{Operation, QueryOutcome};
use crate::query::{first_value, IntoOperator, Operator, Predicate, QuerySpec, ResultShaper};
use crate::Row;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Convert serializable data into a row; anything but an object is rejected
pub fn to_row<T: Serialize + ?Sized>(data: &T) -> Result<Row> {
    match serde_json::to_value(data)? {
        JsonValue::Object(row) => Ok(row),
        other => Err(Error::invalid_argument(format!(
            "record data must serialize to an object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// One named table or collection
#[derive(Debug, Clone)]
pub struct Container {
    connection: Connection,
    name: String,
}

impl Container {
    pub(crate) fn new(connection: Connection, name: impl Into<String>) -> Self {
        Self {
            connection,
            name: name.into(),
        }
    }

    /// Name without the namespace prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// A query with no search yet; every other builder call fails until one of
    /// the `search*` methods runs
    pub fn query(&self) -> Query {
        Query {
            container: self.clone(),
            spec: QuerySpec::new(),
            shaper: ResultShaper::new(),
        }
    }

    pub fn search(
        &self,
        field: impl Into<String>,
        operator: impl IntoOperator,
        value: impl Into<JsonValue>,
    ) -> Result<Query> {
        self.query().search(field, operator, value)
    }

    /// Query matching the record whose primary key is `id`
    pub fn search_id(&self, id: impl Into<JsonValue>) -> Result<Query> {
        self.query().search_id(id)
    }

    /// Query matching the records whose primary key is one of `ids`
    pub fn search_ids<I, V>(&self, ids: I) -> Result<Query>
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        self.query().search_ids(ids)
    }

    /// Query matching every record
    pub fn search_all(&self) -> Query {
        self.query().search_all()
    }

    pub async fn find(
        &self,
        field: impl Into<String>,
        operator: impl IntoOperator,
        value: impl Into<JsonValue>,
    ) -> Result<Vec<Row>> {
        self.search(field, operator, value)?.fetch().await
    }

    pub async fn find_one(
        &self,
        field: impl Into<String>,
        operator: impl IntoOperator,
        value: impl Into<JsonValue>,
    ) -> Result<Row> {
        self.search(field, operator, value)?.fetch_one().await
    }

    pub async fn find_first(
        &self,
        field: impl Into<String>,
        operator: impl IntoOperator,
        value: impl Into<JsonValue>,
    ) -> Result<Option<JsonValue>> {
        self.search(field, operator, value)?.fetch_first().await
    }

    /// Insert one record and return its id (null when the backend cannot tell)
    pub async fn insert<T: Serialize + ?Sized>(&self, data: &T) -> Result<JsonValue> {
        let row = to_row(data)?;
        let backend = self.connection.backend();
        self.connection
            .intercept(
                &self.name,
                Operation::Insert,
                None,
                backend.insert(&self.name, row),
                |_| QueryOutcome::Affected(1),
            )
            .await
    }
}

/// A query being built against one container
#[derive(Debug, Clone)]
pub struct Query {
    container: Container,
    spec: QuerySpec,
    shaper: ResultShaper,
}

impl Query {
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// AND a predicate onto the search
    pub fn search(
        mut self,
        field: impl Into<String>,
        operator: impl IntoOperator,
        value: impl Into<JsonValue>,
    ) -> Result<Self> {
        let predicate = Predicate::new(field, operator.into_operator()?, value.into())?;
        self.spec.search(predicate);
        Ok(self)
    }

    pub fn search_id(self, id: impl Into<JsonValue>) -> Result<Self> {
        let key = self.container.connection.primary_key().to_string();
        self.search(key, Operator::Is, id)
    }

    pub fn search_ids<I, V>(self, ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let key = self.container.connection.primary_key().to_string();
        let ids: Vec<JsonValue> = ids.into_iter().map(Into::into).collect();
        self.search(key, Operator::In, ids)
    }

    /// Drop every search predicate so the query matches all records
    pub fn search_all(mut self) -> Self {
        self.spec.reset_search();
        self
    }

    /// OR a predicate into the most recent search group
    pub fn or_search(
        mut self,
        field: impl Into<String>,
        operator: impl IntoOperator,
        value: impl Into<JsonValue>,
    ) -> Result<Self> {
        self.spec.ensure_initialized("or_search")?;
        let predicate = Predicate::new(field, operator.into_operator()?, value.into())?;
        self.spec.or_search(predicate)?;
        Ok(self)
    }

    pub fn select(mut self, field: impl Into<String>) -> Result<Self> {
        self.spec.select(field, None)?;
        Ok(self)
    }

    pub fn select_as(mut self, field: impl Into<String>, alias: impl Into<String>) -> Result<Self> {
        self.spec.select(field, Some(alias.into()))?;
        Ok(self)
    }

    pub fn select_many<I, S>(mut self, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            self.spec.select(field, None)?;
        }
        Ok(self)
    }

    pub fn sort(mut self, field: impl Into<String>, order: impl Into<String>) -> Result<Self> {
        self.spec.sort(field, order)?;
        Ok(self)
    }

    pub fn limit(mut self, limit: i64) -> Result<Self> {
        self.spec.limit(limit)?;
        Ok(self)
    }

    pub fn skip(mut self, skip: i64) -> Result<Self> {
        self.spec.skip(skip)?;
        Ok(self)
    }

    /// Equality join between two `container.field` references
    pub fn join(mut self, field1: &str, field2: &str) -> Result<Self> {
        self.spec.join(field1, field2)?;
        Ok(self)
    }

    pub fn group(mut self, field: impl Into<String>) -> Result<Self> {
        self.spec.group(field)?;
        Ok(self)
    }

    pub fn having(
        mut self,
        field: impl Into<String>,
        operator: impl IntoOperator,
        value: impl Into<JsonValue>,
    ) -> Result<Self> {
        self.spec.ensure_initialized("having")?;
        let predicate = Predicate::new(field, operator.into_operator()?, value.into())?;
        self.spec.having(predicate)?;
        Ok(self)
    }

    pub fn or_having(
        mut self,
        field: impl Into<String>,
        operator: impl IntoOperator,
        value: impl Into<JsonValue>,
    ) -> Result<Self> {
        self.spec.ensure_initialized("or_having")?;
        let predicate = Predicate::new(field, operator.into_operator()?, value.into())?;
        self.spec.or_having(predicate)?;
        Ok(self)
    }

    /// Alias a table for the SQL FROM clause
    pub fn from(mut self, table: impl Into<String>, alias: impl Into<String>) -> Result<Self> {
        self.spec.from(table, alias)?;
        Ok(self)
    }

    /// Replace `field` on every fetched row with `filter(value)`
    pub fn filter<F>(mut self, field: impl Into<String>, filter: F) -> Result<Self>
    where
        F: Fn(JsonValue) -> JsonValue + Send + Sync + 'static,
    {
        self.spec.ensure_initialized("filter")?;
        self.shaper.add_filter(field, Arc::new(filter));
        Ok(self)
    }

    /// Drop fetched rows for which `validator(value)` is false
    pub fn validate<F>(mut self, field: impl Into<String>, validator: F) -> Result<Self>
    where
        F: Fn(&JsonValue) -> bool + Send + Sync + 'static,
    {
        self.spec.ensure_initialized("validate")?;
        self.shaper.add_validator(field, Arc::new(validator));
        Ok(self)
    }

    fn name(&self) -> &str {
        &self.container.name
    }

    fn connection(&self) -> &Connection {
        &self.container.connection
    }

    async fn shaped_rows(&self) -> Result<Vec<Row>> {
        let rows = self
            .connection()
            .backend()
            .fetch(self.name(), &self.spec)
            .await?;
        Ok(self.shaper.apply(rows))
    }

    async fn run_fetch(&self, operation: Operation) -> Result<Vec<Row>> {
        self.spec.ensure_initialized(operation.as_str())?;
        self.connection()
            .intercept(
                self.name(),
                operation,
                Some(&self.spec),
                self.shaped_rows(),
                |rows| QueryOutcome::Rows(rows.len()),
            )
            .await
    }

    /// Every matching row, after filters and validators
    pub async fn fetch(&self) -> Result<Vec<Row>> {
        self.run_fetch(Operation::Fetch).await
    }

    /// The first matching row, or an empty row when nothing matches
    pub async fn fetch_one(&self) -> Result<Row> {
        let rows = self.run_fetch(Operation::FetchOne).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    /// The first value of the first matching row
    pub async fn fetch_first(&self) -> Result<Option<JsonValue>> {
        let rows = self.run_fetch(Operation::FetchFirst).await?;
        Ok(first_value(&rows))
    }

    /// Matching rows as a forward-only cursor
    pub async fn cursor(&self) -> Result<RowCursor> {
        let rows = self.run_fetch(Operation::Cursor).await?;
        Ok(RowCursor::new(rows))
    }

    /// Number of matching records; sort, limit and skip are ignored
    pub async fn count(&self) -> Result<u64> {
        self.spec.ensure_initialized("count")?;
        let backend = self.connection().backend();
        self.connection()
            .intercept(
                self.name(),
                Operation::Count,
                Some(&self.spec),
                backend.count(self.name(), &self.spec),
                |n| QueryOutcome::Rows(*n as usize),
            )
            .await
    }

    /// Set `data`'s fields on every matching record; returns the affected count
    pub async fn update<T: Serialize + ?Sized>(&self, data: &T) -> Result<u64> {
        self.spec.ensure_initialized("update")?;
        let row = to_row(data)?;
        let backend = self.connection().backend();
        self.connection()
            .intercept(
                self.name(),
                Operation::Update,
                Some(&self.spec),
                backend.update(self.name(), &self.spec, row),
                |n| QueryOutcome::Affected(*n),
            )
            .await
    }

    /// Delete every matching record; returns the affected count
    pub async fn remove(&self) -> Result<u64> {
        self.spec.ensure_initialized("remove")?;
        let backend = self.connection().backend();
        self.connection()
            .intercept(
                self.name(),
                Operation::Remove,
                Some(&self.spec),
                backend.remove(self.name(), &self.spec),
                |n| QueryOutcome::Affected(*n),
            )
            .await
    }

    /// Update the record matched by the search's `is` predicates, or insert it
    pub async fn save<T: Serialize + ?Sized>(&self, data: &T) -> Result<SaveOutcome> {
        self.spec.ensure_initialized("save")?;
        let row = to_row(data)?;
        let backend = self.connection().backend();
        self.connection()
            .intercept(
                self.name(),
                Operation::Save,
                Some(&self.spec),
                backend.save(self.name(), &self.spec, row),
                |outcome| match outcome {
                    SaveOutcome::Inserted(_) => QueryOutcome::Affected(1),
                    SaveOutcome::Updated(n) => QueryOutcome::Affected(*n),
                },
            )
            .await
    }

    async fn cached_rows(
        &self,
        operation: Operation,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<Vec<Row>> {
        self.spec.ensure_initialized(operation.as_str())?;
        let cache = match self.connection().cache() {
            Some(cache) => cache.clone(),
            None => return self.run_fetch(operation).await,
        };

        if let Some(cached) = cache.get(key) {
            match serde_json::from_value::<Vec<Row>>(cached) {
                Ok(rows) => {
                    self.connection()
                        .notify_cached(self.name(), operation, &self.spec);
                    return Ok(rows);
                }
                Err(e) => log::warn!("Ignoring malformed cache entry '{}': {}", key, e),
            }
        }

        let rows = self.run_fetch(operation).await?;
        let value = serde_json::to_value(&rows)?;
        if let Err(e) = cache.put(key, value, ttl) {
            log::warn!("Failed to cache result under '{}': {}", key, e);
        }
        Ok(rows)
    }

    /// [`fetch`](Self::fetch) memoised under `key` in the connection's cache
    pub async fn fetch_and_cache(&self, key: &str, ttl: Option<Duration>) -> Result<Vec<Row>> {
        self.cached_rows(Operation::Fetch, key, ttl).await
    }

    pub async fn fetch_one_and_cache(&self, key: &str, ttl: Option<Duration>) -> Result<Row> {
        let rows = self.cached_rows(Operation::FetchOne, key, ttl).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    pub async fn fetch_first_and_cache(
        &self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<Option<JsonValue>> {
        let rows = self.cached_rows(Operation::FetchFirst, key, ttl).await?;
        Ok(first_value(&rows))
    }
}
