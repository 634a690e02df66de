//! Shared fixtures: an in-memory document store and SQLite connections

#![allow(dead_code)]

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use regex::RegexBuilder;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use strata::document::{BulkWriteResult, DocumentBackend, DocumentDriver, FindRequest, WriteOp};
use strata::{BackendKind, Connection, ConnectionConfig, Result};

/// Document store kept in memory, evaluating the filter operators the
/// document translator emits
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, Vec<Document>>>,
    /// Every find issued, in order
    pub finds: Mutex<Vec<(String, FindRequest)>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, collection: &str, documents: Vec<Document>) {
        let mut collections = self.collections.lock().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }

    pub fn documents(&self, collection: &str) -> Vec<Document> {
        let collections = self.collections.lock().unwrap();
        collections.get(collection).cloned().unwrap_or_default()
    }

    pub fn find_count(&self) -> usize {
        self.finds.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentDriver for MemoryStore {
    async fn execute_query(&self, collection: &str, request: &FindRequest) -> Result<Vec<Document>> {
        self.finds
            .lock()
            .unwrap()
            .push((collection.to_string(), request.clone()));

        let mut rows: Vec<Document> = self
            .documents(collection)
            .into_iter()
            .filter(|doc| matches(doc, &request.filter))
            .collect();

        if let Some(sort) = &request.sort {
            rows.sort_by(|a, b| {
                for (field, direction) in sort {
                    let ordering = compare(a.get(field), b.get(field)).unwrap_or(Ordering::Equal);
                    let ordering = if direction.as_i32() == Some(-1) {
                        ordering.reverse()
                    } else {
                        ordering
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let skip = request.skip.unwrap_or(0) as usize;
        let rows = rows.into_iter().skip(skip);
        let rows: Vec<Document> = match request.limit {
            Some(limit) if limit != 0 => rows.take(limit.unsigned_abs() as usize).collect(),
            _ => rows.collect(),
        };

        Ok(match &request.projection {
            Some(projection) => rows.into_iter().map(|doc| project(doc, projection)).collect(),
            None => rows,
        })
    }

    async fn count_documents(&self, collection: &str, filter: &Document) -> Result<u64> {
        Ok(self
            .documents(collection)
            .iter()
            .filter(|doc| matches(doc, filter))
            .count() as u64)
    }

    async fn execute_bulk_write(&self, collection: &str, ops: Vec<WriteOp>) -> Result<BulkWriteResult> {
        let mut collections = self.collections.lock().unwrap();
        let docs = collections.entry(collection.to_string()).or_default();
        let mut result = BulkWriteResult::default();

        for op in ops {
            match op {
                WriteOp::Insert(doc) => {
                    docs.push(doc);
                    result.inserted += 1;
                }
                WriteOp::Update {
                    filter,
                    update,
                    upsert,
                    multi,
                } => {
                    let set = update.get_document("$set").cloned().unwrap_or_default();
                    let mut matched = 0;
                    for doc in docs.iter_mut().filter(|doc| matches(doc, &filter)) {
                        matched += 1;
                        let mut changed = false;
                        for (field, value) in &set {
                            if doc.get(field) != Some(value) {
                                doc.insert(field.clone(), value.clone());
                                changed = true;
                            }
                        }
                        if changed {
                            result.modified += 1;
                        }
                        if !multi {
                            break;
                        }
                    }
                    result.matched += matched;

                    if matched == 0 && upsert {
                        let mut doc = equality_fields(&filter);
                        for (field, value) in set {
                            doc.insert(field, value);
                        }
                        if !doc.contains_key("_id") {
                            doc.insert("_id", ObjectId::new());
                        }
                        result.upserted_id = doc.get("_id").cloned();
                        docs.push(doc);
                    }
                }
                WriteOp::Delete { filter, multi } => {
                    let before = docs.len();
                    if multi {
                        docs.retain(|doc| !matches(doc, &filter));
                    } else if let Some(index) = docs.iter().position(|doc| matches(doc, &filter)) {
                        docs.remove(index);
                    }
                    result.deleted += (before - docs.len()) as u64;
                }
            }
        }
        Ok(result)
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        Ok(self.collections.lock().unwrap().keys().cloned().collect())
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => clauses(condition).iter().all(|clause| matches(doc, clause)),
        "$or" => clauses(condition).iter().any(|clause| matches(doc, clause)),
        field => field_matches(doc.get(field), condition),
    })
}

fn clauses(condition: &Bson) -> Vec<Document> {
    match condition {
        Bson::Array(items) => items
            .iter()
            .filter_map(|item| item.as_document().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> bool {
    let operators = match condition {
        Bson::Document(doc) if doc.keys().any(|key| key.starts_with('$')) => doc,
        other => return equals(value, other),
    };

    let options = operators.get_str("$options").unwrap_or("");
    operators.iter().all(|(operator, operand)| match operator.as_str() {
        "$ne" => !equals(value, operand),
        "$gt" => compare(value, Some(operand)) == Some(Ordering::Greater),
        "$lt" => compare(value, Some(operand)) == Some(Ordering::Less),
        "$in" => members(operand).iter().any(|item| equals(value, item)),
        "$nin" => !members(operand).iter().any(|item| equals(value, item)),
        "$regex" => match operand {
            Bson::String(pattern) => regex_matches(value, pattern, options),
            Bson::RegularExpression(regex) => regex_matches(value, &regex.pattern, &regex.options),
            _ => false,
        },
        "$options" => true,
        "$not" => match operand {
            Bson::RegularExpression(regex) => !regex_matches(value, &regex.pattern, &regex.options),
            other => !field_matches(value, other),
        },
        _ => false,
    })
}

fn members(operand: &Bson) -> Vec<Bson> {
    match operand {
        Bson::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn regex_matches(value: Option<&Bson>, pattern: &str, options: &str) -> bool {
    let Some(Bson::String(text)) = value else {
        return false;
    };
    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .build()
        .map(|regex| regex.is_match(text))
        .unwrap_or(false)
}

fn number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match (value, expected) {
        (None, Bson::Null) => true,
        (None, _) => false,
        (Some(actual), expected) => match (number(actual), number(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => actual == expected,
        },
    }
}

fn compare(a: Option<&Bson>, b: Option<&Bson>) -> Option<Ordering> {
    let (a, b) = (a?, b?);
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn project(doc: Document, projection: &Document) -> Document {
    let truthy = |value: &Bson| number(value).map_or(false, |n| n != 0.0);
    let inclusive = projection
        .iter()
        .any(|(field, value)| field != "_id" && truthy(value));

    doc.into_iter()
        .filter(|(field, _)| match projection.get(field) {
            Some(value) => truthy(value),
            None => inclusive && field == "_id" || !inclusive,
        })
        .collect()
}

/// Plain `field: value` conditions, the fields an upsert seeds the new document with
fn equality_fields(filter: &Document) -> Document {
    let mut doc = Document::new();
    for (key, condition) in filter {
        if key == "$and" {
            for clause in clauses(condition) {
                for (field, value) in equality_fields(&clause) {
                    doc.insert(field, value);
                }
            }
        } else if !key.starts_with('$') {
            let is_operator = matches!(condition, Bson::Document(d) if d.keys().any(|k| k.starts_with('$')));
            if !is_operator {
                doc.insert(key.clone(), condition.clone());
            }
        }
    }
    doc
}

/// Connection over a fresh in-memory document store
pub fn document_connection(store: Arc<MemoryStore>) -> Connection {
    Connection::new(Arc::new(DocumentBackend::new(store)))
}

/// Connection to a private in-memory SQLite database
pub async fn sqlite_connection() -> Connection {
    let config = ConnectionConfig::builder(BackendKind::Sqlite)
        .database(":memory:")
        .build()
        .unwrap();
    Connection::connect(&config).await.unwrap()
}
