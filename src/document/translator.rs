//! Turns a [`QuerySpec`] into a document-store [`FindRequest`]
//!
//! Predicates become one-key filter documents, OR-groups become `$or` and
//! the groups are combined with `$and`. Predicates on joined containers are
//! kept apart so the join emulation can push them into the secondary
//! queries.

use super::driver::FindRequest;
use crate::backend::Translator;
use crate::error::{Error, Result};
use crate::query::{Operator, OrGroup, Predicate, QuerySpec};
use crate::sql::dialects::split_function_call;
use crate::Row;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

const BACKEND: &str = "mongodb";

/// Search groups split by the container they constrain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPartition {
    /// Groups on the root container, with the root prefix removed
    pub root: Vec<OrGroup>,
    /// Groups per joined container, with that container's prefix removed
    pub joined: IndexMap<String, Vec<OrGroup>>,
}

/// Document-store translator
#[derive(Debug, Clone)]
pub struct DocumentTranslator {
    primary_key: String,
}

impl Default for DocumentTranslator {
    fn default() -> Self {
        Self::new("_id")
    }
}

impl DocumentTranslator {
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
        }
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Reject the SQL-only parts of a specification
    pub fn check_supported(&self, spec: &QuerySpec) -> Result<()> {
        if !spec.group_fields().is_empty() {
            return Err(Error::unsupported_feature(BACKEND, "GROUP BY"));
        }
        if !spec.having_groups().is_empty() {
            return Err(Error::unsupported_feature(BACKEND, "HAVING"));
        }
        if !spec.table_aliases().is_empty() {
            return Err(Error::unsupported_feature(BACKEND, "table aliases"));
        }
        for selection in spec.selections() {
            if split_function_call(&selection.field).is_some() {
                return Err(Error::unsupported_feature(
                    BACKEND,
                    format!("function selection '{}'", selection.field),
                ));
            }
        }
        Ok(())
    }

    /// Split the search between the root and the joined containers
    ///
    /// An OR-group must stay within one container.
    pub fn partition_search(&self, container: &str, spec: &QuerySpec) -> Result<SearchPartition> {
        let joined = joined_containers(container, spec);
        let mut partition = SearchPartition::default();

        for group in spec.search_groups() {
            let mut owner: Option<&str> = None;
            let mut rewritten = Vec::with_capacity(group.len());

            for predicate in group {
                let (target, field) = locate(container, &joined, &predicate.field);
                match owner {
                    Some(existing) if existing != target => {
                        return Err(Error::unsupported_feature(
                            BACKEND,
                            "OR across joined containers",
                        ))
                    }
                    _ => owner = Some(target),
                }
                rewritten.push(Predicate {
                    field: field.to_string(),
                    operator: predicate.operator,
                    value: predicate.value.clone(),
                });
            }

            match owner {
                Some(target) if target != container => partition
                    .joined
                    .entry(target.to_string())
                    .or_default()
                    .push(rewritten),
                _ => partition.root.push(rewritten),
            }
        }

        Ok(partition)
    }

    /// AND of OR-groups as a filter document; `{}` matches everything
    pub fn filter(&self, groups: &[OrGroup]) -> Result<Document> {
        let mut clauses = Vec::with_capacity(groups.len());
        for group in groups {
            let mut members = group
                .iter()
                .map(|predicate| self.predicate(predicate))
                .collect::<Result<Vec<_>>>()?;
            let clause = if members.len() == 1 {
                members.remove(0)
            } else {
                let mut or = Document::new();
                or.insert("$or", members);
                or
            };
            clauses.push(clause);
        }

        Ok(match clauses.len() {
            0 => Document::new(),
            1 => clauses.remove(0),
            _ => {
                let mut and = Document::new();
                and.insert("$and", clauses);
                and
            }
        })
    }

    /// One predicate as a single-key filter document
    pub fn predicate(&self, predicate: &Predicate) -> Result<Document> {
        validate_field(&predicate.field)?;
        let field = predicate.field.as_str();

        let condition = match predicate.operator {
            Operator::Is => self.value(field, &predicate.value)?,
            Operator::IsNot => operator_doc("$ne", self.value(field, &predicate.value)?),
            Operator::Greater => operator_doc("$gt", self.value(field, &predicate.value)?),
            Operator::Less => operator_doc("$lt", self.value(field, &predicate.value)?),
            Operator::In => operator_doc("$in", self.values(field, predicate.values())?),
            Operator::NotIn => operator_doc("$nin", self.values(field, predicate.values())?),
            Operator::Like => {
                let mut condition = Document::new();
                condition.insert("$regex", like_pattern(pattern_str(predicate)?));
                condition.insert("$options", "i");
                Bson::Document(condition)
            }
            Operator::NotLike => operator_doc(
                "$not",
                Bson::RegularExpression(bson::Regex {
                    pattern: like_pattern(pattern_str(predicate)?),
                    options: "i".to_string(),
                }),
            ),
            Operator::Match => operator_doc("$regex", Bson::String(pattern_str(predicate)?.to_string())),
            Operator::NotMatch => operator_doc(
                "$not",
                Bson::RegularExpression(bson::Regex {
                    pattern: pattern_str(predicate)?.to_string(),
                    options: String::new(),
                }),
            ),
        };

        let mut filter = Document::new();
        filter.insert(field, condition);
        Ok(filter)
    }

    /// BSON for a predicate value; primary key strings become ObjectIds when they parse
    pub fn value(&self, field: &str, value: &JsonValue) -> Result<Bson> {
        if field == self.primary_key {
            if let JsonValue::String(s) = value {
                if let Ok(oid) = ObjectId::parse_str(s) {
                    return Ok(Bson::ObjectId(oid));
                }
            }
        }
        Ok(bson::to_bson(value)?)
    }

    fn values(&self, field: &str, values: &[JsonValue]) -> Result<Bson> {
        values
            .iter()
            .map(|value| self.value(field, value))
            .collect::<Result<Vec<_>>>()
            .map(Bson::Array)
    }

    /// A record as a document, with the primary key converted like a predicate value
    pub fn document(&self, row: &Row) -> Result<Document> {
        let mut document = Document::new();
        for (field, value) in row {
            validate_field(field)?;
            document.insert(field.clone(), self.value(field, value)?);
        }
        Ok(document)
    }

    /// Projection for the root container
    ///
    /// Covers the selected root fields plus the root-side join keys; `None`
    /// when no root field is selected.
    pub fn projection(&self, container: &str, spec: &QuerySpec) -> Option<Document> {
        let joined = joined_containers(container, spec);
        let fields = spec
            .selections()
            .iter()
            .filter_map(|selection| {
                let (target, field) = locate(container, &joined, &selection.field);
                (target == container).then_some(field)
            })
            .collect::<Vec<_>>();
        self.projection_of(container, spec, fields)
    }

    /// Projection for a joined container, including its join keys
    pub fn secondary_projection(&self, target: &str, spec: &QuerySpec) -> Option<Document> {
        let fields = spec
            .selections()
            .iter()
            .filter_map(|selection| match selection.container() {
                Some((owner, field)) if owner == target => Some(field),
                _ => None,
            })
            .collect::<Vec<_>>();
        self.projection_of(target, spec, fields)
    }

    fn projection_of(&self, container: &str, spec: &QuerySpec, fields: Vec<&str>) -> Option<Document> {
        if fields.is_empty() {
            return None;
        }

        let mut projection = Document::new();
        if !fields.contains(&self.primary_key.as_str()) {
            projection.insert(self.primary_key.clone(), 0);
        }
        for field in fields {
            projection.insert(field, 1);
        }
        for join in spec.joins() {
            if join.container1 == container {
                projection.insert(join.field1.clone(), 1);
            }
            if join.container2 == container {
                projection.insert(join.field2.clone(), 1);
            }
        }
        Some(projection)
    }

    /// Sort document in precedence order, `None` when unsorted
    pub fn sort(&self, container: &str, spec: &QuerySpec) -> Result<Option<Document>> {
        let orders = spec.sort_orders()?;
        if orders.is_empty() {
            return Ok(None);
        }

        let joined = joined_containers(container, spec);
        let mut sort = Document::new();
        for (field, order) in orders {
            let (target, field) = locate(container, &joined, field);
            if target != container {
                return Err(Error::unsupported_feature(
                    BACKEND,
                    "sort on a joined container",
                ));
            }
            validate_field(field)?;
            sort.insert(field, order.as_direction());
        }
        Ok(Some(sort))
    }
}

impl Translator for DocumentTranslator {
    type Request = FindRequest;

    fn translate(&self, container: &str, spec: &QuerySpec) -> Result<FindRequest> {
        self.check_supported(spec)?;
        spec.check_aliases()?;
        spec.plan_joins(&[container])?;

        let partition = self.partition_search(container, spec)?;
        let skip = match spec.skip_value() {
            Some(skip) => Some(u64::try_from(skip).map_err(|_| {
                Error::invalid_argument(format!("skip must not be negative, got {}", skip))
            })?),
            None => None,
        };

        let request = FindRequest {
            filter: self.filter(&partition.root)?,
            projection: self.projection(container, spec),
            sort: self.sort(container, spec)?,
            limit: spec.limit_value(),
            skip,
        };
        log::trace!("Translated find on '{}': {:?}", container, request);
        Ok(request)
    }
}

/// Containers brought in by joins, excluding the root
fn joined_containers<'a>(container: &str, spec: &'a QuerySpec) -> HashSet<&'a str> {
    spec.joins()
        .iter()
        .flat_map(|join| [join.container1.as_str(), join.container2.as_str()])
        .filter(|name| *name != container)
        .collect()
}

/// Owning container and local field name of a possibly dotted field
///
/// Dotted fields whose prefix is neither the root nor a joined container
/// are nested paths on the root.
fn locate<'a>(container: &'a str, joined: &HashSet<&str>, field: &'a str) -> (&'a str, &'a str) {
    match field.split_once('.') {
        Some((owner, rest)) if owner == container => (container, rest),
        Some((owner, rest)) if joined.contains(owner) => (owner, rest),
        _ => (container, field),
    }
}

fn operator_doc(operator: &str, value: impl Into<Bson>) -> Bson {
    let mut condition = Document::new();
    condition.insert(operator, value.into());
    Bson::Document(condition)
}

fn pattern_str(predicate: &Predicate) -> Result<&str> {
    predicate.value.as_str().ok_or_else(|| {
        Error::invalid_argument(format!(
            "operator '{}' on '{}' requires a string pattern",
            predicate.operator, predicate.field
        ))
    })
}

/// SQL LIKE pattern as an anchored regular expression
///
/// `%` matches any run of characters, `_` a single one; everything else is literal.
pub fn like_pattern(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            c => regex.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    regex.push('$');
    regex
}

/// Field names the store would misread as operators or reject outright
pub fn validate_field(field: &str) -> Result<()> {
    if field.is_empty() {
        return Err(Error::invalid_argument("field name must not be empty"));
    }
    if field.starts_with('$') {
        return Err(Error::invalid_argument(format!(
            "field name '{}' must not start with '$'",
            field
        )));
    }
    if field.chars().any(char::is_control) {
        return Err(Error::invalid_argument(format!(
            "field name {:?} contains control characters",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    fn translator() -> DocumentTranslator {
        DocumentTranslator::default()
    }

    fn spec_with(predicates: &[(&str, Operator, JsonValue)]) -> QuerySpec {
        let mut spec = QuerySpec::match_all();
        for (field, operator, value) in predicates {
            spec.search(Predicate::new(*field, *operator, value.clone()).unwrap());
        }
        spec
    }

    #[test]
    fn test_empty_search_matches_everything() {
        let request = translator()
            .translate("users", &QuerySpec::match_all())
            .unwrap();
        assert_eq!(request, FindRequest::new(Document::new()));
    }

    #[test]
    fn test_is_binds_directly() {
        let spec = spec_with(&[("username", Operator::Is, json!("JohnDoe"))]);
        let request = translator().translate("users", &spec).unwrap();
        assert_eq!(request.filter, doc! { "username": "JohnDoe" });
    }

    #[test]
    fn test_groups_become_and_of_or() {
        let mut spec = spec_with(&[
            ("gender", Operator::Is, json!("F")),
            ("age", Operator::Greater, json!(20)),
        ]);
        spec.or_search(Predicate::new("age", Operator::Less, json!(10)).unwrap())
            .unwrap();

        let request = translator().translate("users", &spec).unwrap();
        assert_eq!(
            request.filter,
            doc! {
                "$and": [
                    { "gender": "F" },
                    { "$or": [ { "age": { "$gt": 20_i64 } }, { "age": { "$lt": 10_i64 } } ] },
                ]
            }
        );
    }

    #[test]
    fn test_set_operators() {
        let spec = spec_with(&[
            ("tag", Operator::In, json!(["cooking", "people"])),
            ("tag", Operator::NotIn, json!(["geo"])),
            ("status", Operator::IsNot, json!("draft")),
        ]);
        let request = translator().translate("articles", &spec).unwrap();
        assert_eq!(
            request.filter,
            doc! {
                "$and": [
                    { "tag": { "$in": ["cooking", "people"] } },
                    { "tag": { "$nin": ["geo"] } },
                    { "status": { "$ne": "draft" } },
                ]
            }
        );
    }

    #[test]
    fn test_like_patterns() {
        assert_eq!(like_pattern("%recipe%"), "^.*recipe.*$");
        assert_eq!(like_pattern("a_c"), "^a.c$");
        assert_eq!(like_pattern("1+1=2%"), r"^1\+1=2.*$");

        let spec = spec_with(&[("title", Operator::Like, json!("%recipe%"))]);
        let filter = translator().translate("articles", &spec).unwrap().filter;
        assert_eq!(
            filter,
            doc! { "title": { "$regex": "^.*recipe.*$", "$options": "i" } }
        );

        let spec = spec_with(&[("title", Operator::NotLike, json!("%recipes%"))]);
        let filter = translator().translate("articles", &spec).unwrap().filter;
        assert_eq!(
            filter,
            doc! {
                "title": {
                    "$not": Bson::RegularExpression(bson::Regex {
                        pattern: "^.*recipes.*$".to_string(),
                        options: "i".to_string(),
                    })
                }
            }
        );
    }

    #[test]
    fn test_like_requires_string_pattern() {
        let spec = spec_with(&[("title", Operator::Like, json!(42))]);
        assert!(matches!(
            translator().translate("articles", &spec),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_match_is_raw_regex() {
        let spec = spec_with(&[("title", Operator::Match, json!("^New recipe"))]);
        let filter = translator().translate("articles", &spec).unwrap().filter;
        assert_eq!(filter, doc! { "title": { "$regex": "^New recipe" } });
    }

    #[test]
    fn test_primary_key_strings_become_object_ids() {
        let oid = ObjectId::new();
        let spec = spec_with(&[("_id", Operator::Is, json!(oid.to_hex()))]);
        let filter = translator().translate("users", &spec).unwrap().filter;
        assert_eq!(filter, doc! { "_id": oid });

        let spec = spec_with(&[("_id", Operator::Is, json!("custom-key"))]);
        let filter = translator().translate("users", &spec).unwrap().filter;
        assert_eq!(filter, doc! { "_id": "custom-key" });
    }

    #[test]
    fn test_operator_like_field_names_are_rejected() {
        let spec = spec_with(&[("$where", Operator::Is, json!("1"))]);
        assert!(matches!(
            translator().translate("users", &spec),
            Err(Error::InvalidArgument(_))
        ));

        let spec = spec_with(&[("name\0", Operator::Is, json!("x"))]);
        assert!(matches!(
            translator().translate("users", &spec),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_projection_and_sort() {
        let mut spec = QuerySpec::match_all();
        spec.select("username", Some("user".into())).unwrap();
        spec.select("users.age", None).unwrap();
        spec.sort("age", "desc").unwrap();
        spec.sort("username", "asc").unwrap();
        spec.limit(10).unwrap();
        spec.skip(5).unwrap();

        let request = translator().translate("users", &spec).unwrap();
        assert_eq!(
            request.projection,
            Some(doc! { "_id": 0, "username": 1, "age": 1 })
        );
        assert_eq!(request.sort, Some(doc! { "age": -1, "username": 1 }));
        assert_eq!(request.limit, Some(10));
        assert_eq!(request.skip, Some(5));
    }

    #[test]
    fn test_projection_keeps_join_keys() {
        let mut spec = QuerySpec::match_all();
        spec.select("title", None).unwrap();
        spec.select("users.username", None).unwrap();
        spec.join("articles.user_id", "users._id").unwrap();

        let translator = translator();
        assert_eq!(
            translator.projection("articles", &spec),
            Some(doc! { "_id": 0, "title": 1, "user_id": 1 })
        );
        assert_eq!(
            translator.secondary_projection("users", &spec),
            Some(doc! { "_id": 1, "username": 1 })
        );
    }

    #[test]
    fn test_sql_only_features_are_rejected() {
        let mut spec = QuerySpec::match_all();
        spec.group("tag").unwrap();
        assert!(matches!(
            translator().translate("articles", &spec),
            Err(Error::UnsupportedFeature { .. })
        ));

        let mut spec = QuerySpec::match_all();
        spec.select("COUNT(*)", None).unwrap();
        assert!(matches!(
            translator().translate("articles", &spec),
            Err(Error::UnsupportedFeature { .. })
        ));
    }

    #[test]
    fn test_partition_pushes_joined_predicates() {
        let mut spec = spec_with(&[
            ("tag", Operator::Is, json!("cooking")),
            ("users.age", Operator::Greater, json!(20)),
            ("meta.lang", Operator::Is, json!("en")),
        ]);
        spec.join("articles.user_id", "users._id").unwrap();

        let partition = translator().partition_search("articles", &spec).unwrap();
        assert_eq!(partition.root.len(), 2);
        assert_eq!(partition.root[1][0].field, "meta.lang");
        assert_eq!(partition.joined["users"][0][0].field, "age");
    }

    #[test]
    fn test_or_across_containers_is_rejected() {
        let mut spec = spec_with(&[("tag", Operator::Is, json!("cooking"))]);
        spec.or_search(Predicate::new("users.age", Operator::Greater, json!(20)).unwrap())
            .unwrap();
        spec.join("articles.user_id", "users._id").unwrap();

        assert!(matches!(
            translator().partition_search("articles", &spec),
            Err(Error::UnsupportedFeature { .. })
        ));
    }

    #[test]
    fn test_negative_skip_is_rejected() {
        let mut spec = QuerySpec::match_all();
        spec.skip(-1).unwrap();
        assert!(matches!(
            translator().translate("users", &spec),
            Err(Error::InvalidArgument(_))
        ));
    }
}
