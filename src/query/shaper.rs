//! Post-fetch row shaping: per-field filters and validators

use crate::Row;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Replaces a field's value after fetch
pub type FilterFn = Arc<dyn Fn(JsonValue) -> JsonValue + Send + Sync>;

/// Keeps a row only when it returns `true` for the field's value
pub type ValidatorFn = Arc<dyn Fn(&JsonValue) -> bool + Send + Sync>;

/// Filters and validators registered on one query
#[derive(Clone, Default)]
pub struct ResultShaper {
    filters: Vec<(String, FilterFn)>,
    validators: Vec<(String, ValidatorFn)>,
}

impl ResultShaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter(&mut self, field: impl Into<String>, filter: FilterFn) {
        self.filters.push((field.into(), filter));
    }

    pub fn add_validator(&mut self, field: impl Into<String>, validator: ValidatorFn) {
        self.validators.push((field.into(), validator));
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.validators.is_empty()
    }

    /// Apply filters to every row, then drop rows rejected by a validator
    pub fn apply(&self, rows: Vec<Row>) -> Vec<Row> {
        if self.is_empty() {
            return rows;
        }

        rows.into_iter()
            .filter_map(|mut row| {
                for (field, filter) in &self.filters {
                    if let Some(value) = row.get_mut(field) {
                        let current = value.take();
                        *value = filter(current);
                    }
                }

                let accepted = self.validators.iter().all(|(field, validator)| {
                    row.get(field).map_or(true, |value| validator(value))
                });

                if accepted {
                    Some(row)
                } else {
                    log::trace!("Row dropped by validator");
                    None
                }
            })
            .collect()
    }
}

impl fmt::Debug for ResultShaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultShaper")
            .field(
                "filters",
                &self.filters.iter().map(|(field, _)| field).collect::<Vec<_>>(),
            )
            .field(
                "validators",
                &self.validators.iter().map(|(field, _)| field).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Value of the first key of the first row, in insertion order
pub fn first_value(rows: &[Row]) -> Option<JsonValue> {
    rows.first()
        .and_then(|row| row.values().next())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: JsonValue) -> Vec<Row> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_filter_replaces_present_fields_only() {
        let mut shaper = ResultShaper::new();
        shaper.add_filter(
            "username",
            Arc::new(|value| json!(value.as_str().unwrap_or_default().to_uppercase())),
        );

        let shaped = shaper.apply(rows(json!([
            {"username": "JohnDoe", "age": 25},
            {"age": 22}
        ])));

        assert_eq!(shaped[0]["username"], "JOHNDOE");
        assert!(shaped[1].get("username").is_none());
    }

    #[test]
    fn test_validator_drops_whole_row() {
        let mut shaper = ResultShaper::new();
        shaper.add_validator("age", Arc::new(|value| value.as_i64().unwrap_or(0) >= 18));

        let shaped = shaper.apply(rows(json!([
            {"username": "JohnDoe", "age": 25},
            {"username": "JanetteDoe", "age": 5},
            {"username": "NoAge"}
        ])));

        let names: Vec<_> = shaped.iter().map(|row| row["username"].clone()).collect();
        assert_eq!(names, vec![json!("JohnDoe"), json!("NoAge")]);
    }

    #[test]
    fn test_filters_run_before_validators() {
        let mut shaper = ResultShaper::new();
        shaper.add_filter("age", Arc::new(|value| json!(value.as_i64().unwrap_or(0) * 10)));
        shaper.add_validator("age", Arc::new(|value| value.as_i64().unwrap_or(0) > 100));

        let shaped = shaper.apply(rows(json!([{"age": 25}, {"age": 5}])));
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped[0]["age"], 250);
    }

    #[test]
    fn test_first_value() {
        let fetched = rows(json!([{"username": "JohnDoe", "age": 25}]));
        assert_eq!(first_value(&fetched), Some(json!("JohnDoe")));
        assert_eq!(first_value(&[]), None);
        assert_eq!(first_value(&[Row::new()]), None);
    }
}
