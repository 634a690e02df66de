//! Join emulation for stores without native joins
//!
//! Joins run in declaration order against the rows fetched so far. For
//! each one the distinct non-null key values are collected, a secondary
//! `field in values` query runs against the other container, and every
//! matching secondary record is merged into the rows that reference it.
//! Secondary fields overwrite root fields of the same name.

use super::convert::document_to_row;
use super::driver::{DocumentDriver, FindRequest};
use super::translator::{DocumentTranslator, SearchPartition};
use crate::error::{Error, Result};
use crate::query::QuerySpec;
use crate::Row;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// Runs the joins of one specification
pub(crate) struct JoinEmulator<'a> {
    driver: &'a dyn DocumentDriver,
    translator: &'a DocumentTranslator,
    namespace: &'a str,
}

impl<'a> JoinEmulator<'a> {
    pub(crate) fn new(
        driver: &'a dyn DocumentDriver,
        translator: &'a DocumentTranslator,
        namespace: &'a str,
    ) -> Self {
        Self {
            driver,
            translator,
            namespace,
        }
    }

    /// Apply every join of `spec` to `rows`, sequentially
    ///
    /// Predicates pushed to a joined container turn its join into a
    /// semi-join: rows without a matching secondary record are dropped.
    pub(crate) async fn apply(
        &self,
        container: &str,
        spec: &QuerySpec,
        partition: &SearchPartition,
        mut rows: Vec<Row>,
    ) -> Result<Vec<Row>> {
        for step in spec.plan_joins(&[container])? {
            let existing_key = lookup_key(spec, container, step.existing, step.existing_field);
            let pushed = partition.joined.get(step.target);

            let values = distinct_values(&rows, &existing_key);
            if values.is_empty() {
                if pushed.is_some() {
                    rows.clear();
                }
                continue;
            }

            let mut filter = Document::new();
            filter.insert(step.target_field, in_condition(&values));
            if let Some(groups) = pushed {
                let extra = self.translator.filter(groups)?;
                filter = {
                    let mut and = Document::new();
                    and.insert("$and", vec![filter, extra]);
                    and
                };
            }

            let request = FindRequest {
                filter,
                projection: self.translator.secondary_projection(step.target, spec),
                ..Default::default()
            };
            let collection = format!("{}{}", self.namespace, step.target);
            log::debug!(
                "Joining '{}' on {}.{} = {}.{} ({} keys)",
                collection,
                step.existing,
                step.existing_field,
                step.target,
                step.target_field,
                values.len()
            );
            let documents = self.driver.execute_query(&collection, &request).await?;

            // Key before aliases rename the join field
            let mut keyed: Vec<(String, Row)> = documents
                .into_iter()
                .map(document_to_row)
                .filter_map(|row| {
                    let key = row.get(step.target_field).map(key_of)?;
                    Some((key, row))
                })
                .collect();
            for (_, row) in keyed.iter_mut() {
                resolve_row_aliases(row, spec, step.target, false)?;
            }

            let mut index: HashMap<String, Vec<Row>> = HashMap::new();
            for (key, row) in keyed {
                index.entry(key).or_default().push(row);
            }

            rows = rows
                .into_iter()
                .filter_map(|mut row| {
                    let matches = row
                        .get(existing_key.as_str())
                        .filter(|value| !value.is_null())
                        .and_then(|value| index.get(&key_of(value)));
                    match matches {
                        Some(secondaries) => {
                            for secondary in secondaries {
                                for (field, value) in secondary {
                                    row.insert(field.clone(), value.clone());
                                }
                            }
                            Some(row)
                        }
                        None if pushed.is_some() => None,
                        None => Some(row),
                    }
                })
                .collect();
        }

        Ok(rows)
    }
}

/// Rename selected fields of `container` to their aliases
///
/// `root` marks the queried container, which also owns undotted selections.
pub(crate) fn resolve_aliases(
    rows: &mut [Row],
    spec: &QuerySpec,
    container: &str,
    root: bool,
) -> Result<()> {
    for row in rows.iter_mut() {
        resolve_row_aliases(row, spec, container, root)?;
    }
    Ok(())
}

fn resolve_row_aliases(row: &mut Row, spec: &QuerySpec, container: &str, root: bool) -> Result<()> {
    for selection in spec.selections() {
        let alias = match &selection.alias {
            Some(alias) => alias,
            None => continue,
        };
        let field = match selection.container() {
            Some((owner, field)) if owner == container => field,
            None if root => selection.field.as_str(),
            _ => continue,
        };
        if field == alias {
            continue;
        }
        if let Some(value) = row.remove(field) {
            if row.contains_key(alias) {
                return Err(Error::ambiguous_alias(format!(
                    "alias '{}' for '{}' is already set on {}",
                    alias, selection.field, container
                )));
            }
            row.insert(alias.clone(), value);
        }
    }
    Ok(())
}

/// Keep only the selected output names, in selection order
pub(crate) fn restrict_to_selection(rows: Vec<Row>, spec: &QuerySpec) -> Vec<Row> {
    if spec.selections().is_empty() {
        return rows;
    }
    let names: Vec<&str> = spec
        .selections()
        .iter()
        .map(|selection| selection.output_name())
        .collect();

    rows.into_iter()
        .map(|mut row| {
            names
                .iter()
                .filter_map(|name| row.remove(*name).map(|value| (name.to_string(), value)))
                .collect()
        })
        .collect()
}

/// Row key holding `container.field`, following an alias when the field was renamed
fn lookup_key(spec: &QuerySpec, root: &str, container: &str, field: &str) -> String {
    spec.selections()
        .iter()
        .find_map(|selection| match (selection.container(), &selection.alias) {
            (Some((owner, selected)), Some(alias)) if owner == container && selected == field => {
                Some(alias.clone())
            }
            (None, Some(alias)) if container == root && selection.field == field => {
                Some(alias.clone())
            }
            _ => None,
        })
        .unwrap_or_else(|| field.to_string())
}

fn key_of(value: &JsonValue) -> String {
    value.to_string()
}

fn distinct_values(rows: &[Row], key: &str) -> Vec<JsonValue> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(key))
        .filter(|value| !value.is_null())
        .filter(|value| seen.insert(key_of(value)))
        .cloned()
        .collect()
}

/// `$in` over the key values
///
/// ObjectIds come back from the root fetch as hex strings; those are
/// matched both as strings and as ObjectIds.
fn in_condition(values: &[JsonValue]) -> Document {
    let mut candidates = Vec::with_capacity(values.len());
    for value in values {
        if let JsonValue::String(s) = value {
            if let Ok(oid) = ObjectId::parse_str(s) {
                candidates.push(Bson::ObjectId(oid));
            }
        }
        match bson::to_bson(value) {
            Ok(bson) => candidates.push(bson),
            Err(e) => log::warn!("Skipping join key {} not representable as BSON: {}", value, e),
        }
    }
    let mut condition = Document::new();
    condition.insert("$in", candidates);
    condition
}
