//! Backend seam: what a storage engine must provide to run a [`QuerySpec`]
//!
//! A backend pairs a [`Translator`], which turns the query specification into a
//! native request, with the driver that executes it. [`SqlBackend`] and
//! [`DocumentBackend`] are the two implementations.
//!
//! [`SqlBackend`]: crate::sql::SqlBackend
//! [`DocumentBackend`]: crate::document::DocumentBackend

use crate::error::Result;
use crate::query::QuerySpec;
use crate::Row;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Turns a query specification into a backend-native request
///
/// Translation is pure: it validates the query specification and builds the
/// request without touching the backend.
pub trait Translator {
    type Request;

    fn translate(&self, container: &str, spec: &QuerySpec) -> Result<Self::Request>;
}

/// What `save` ended up doing
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// A new record was written; carries its id when the backend reports one
    Inserted(JsonValue),
    /// Existing records were updated; carries the affected count
    Updated(u64),
}

impl SaveOutcome {
    pub fn is_insert(&self) -> bool {
        matches!(self, SaveOutcome::Inserted(_))
    }
}

/// A storage engine able to execute query specifications
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short engine name such as `sqlite` or `mongodb`
    fn name(&self) -> &'static str;

    /// Prefix applied to container names
    fn namespace(&self) -> &str;

    /// Field holding record ids
    fn primary_key(&self) -> &str;

    async fn fetch(&self, container: &str, spec: &QuerySpec) -> Result<Vec<Row>>;

    async fn count(&self, container: &str, spec: &QuerySpec) -> Result<u64>;

    /// Insert one record and return its id, or null when unknown
    async fn insert(&self, container: &str, data: Row) -> Result<JsonValue>;

    async fn update(&self, container: &str, spec: &QuerySpec, data: Row) -> Result<u64>;

    async fn remove(&self, container: &str, spec: &QuerySpec) -> Result<u64>;

    /// Update the record matched by the search's `is` predicates, or insert it
    async fn save(&self, container: &str, spec: &QuerySpec, data: Row) -> Result<SaveOutcome>;

    /// Containers visible under this backend's namespace, without the prefix
    async fn container_names(&self) -> Result<Vec<String>>;

    async fn ping(&self) -> Result<bool>;
}

/// Keep names that carry `namespace` and strip it
pub(crate) fn strip_namespace(names: Vec<String>, namespace: &str) -> Vec<String> {
    let mut names: Vec<String> = names
        .into_iter()
        .filter_map(|name| name.strip_prefix(namespace).map(str::to_string))
        .filter(|name| !name.is_empty())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_namespace() {
        let names = vec![
            "olive_users".to_string(),
            "other_users".to_string(),
            "olive_articles".to_string(),
        ];
        assert_eq!(
            strip_namespace(names.clone(), "olive_"),
            vec!["articles", "users"]
        );
        assert_eq!(strip_namespace(names, "").len(), 3);
    }
}
