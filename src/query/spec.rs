//! Backend-neutral query specification
//!
//! A [`QuerySpec`] accumulates everything a request asks for: search
//! predicates (AND of OR-groups), field selection with aliases, sort order,
//! joins, limit/skip and the SQL-only group/having/from parts. It holds no
//! backend state; translators read it and produce their native request.

use super::operator::{Operator, SortOrder};
use crate::error::{Error, Result};
use serde_json::Value as JsonValue;

/// One atomic `{field, operator, value}` condition
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: JsonValue,
}

impl Predicate {
    /// Build a predicate, checking the value shape against the operator
    pub fn new(field: impl Into<String>, operator: Operator, value: JsonValue) -> Result<Self> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(Error::invalid_argument("predicate field must not be empty"));
        }

        if operator.requires_sequence() {
            if !value.is_array() {
                return Err(Error::invalid_argument(format!(
                    "operator '{}' on '{}' requires a sequence value",
                    operator, field
                )));
            }
        } else if value.is_array() {
            return Err(Error::invalid_argument(format!(
                "operator '{}' on '{}' requires a scalar value",
                operator, field
            )));
        }

        Ok(Self {
            field,
            operator,
            value,
        })
    }

    /// Values bound by this predicate, one per element for `in`/`not in`
    pub fn values(&self) -> &[JsonValue] {
        match &self.value {
            JsonValue::Array(values) => values,
            value => std::slice::from_ref(value),
        }
    }
}

/// Predicates combined with OR
pub type OrGroup = Vec<Predicate>;

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub field: String,
    pub alias: Option<String>,
}

impl Selection {
    /// Key the field has in an output row
    pub fn output_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.field.rsplit('.').next().unwrap_or(&self.field),
        }
    }

    /// `(container, field)` when the field is in dotted form
    pub fn container(&self) -> Option<(&str, &str)> {
        self.field.split_once('.')
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    /// Raw order string, validated when the query is translated
    pub order: String,
}

/// Equality join `container1.field1 = container2.field2`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub container1: String,
    pub field1: String,
    pub container2: String,
    pub field2: String,
}

impl JoinSpec {
    pub fn parse(field1: &str, field2: &str) -> Result<Self> {
        let (container1, field1) = split_qualified(field1)?;
        let (container2, field2) = split_qualified(field2)?;
        Ok(Self {
            container1,
            field1,
            container2,
            field2,
        })
    }
}

fn split_qualified(raw: &str) -> Result<(String, String)> {
    match raw.split_once('.') {
        Some((container, field)) if !container.is_empty() && !field.is_empty() => {
            Ok((container.to_string(), field.to_string()))
        }
        _ => Err(Error::invalid_argument(format!(
            "invalid join field '{}', expected container.field",
            raw
        ))),
    }
}

/// A join oriented from a container already in the working set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinStep<'a> {
    pub existing: &'a str,
    pub existing_field: &'a str,
    pub target: &'a str,
    pub target_field: &'a str,
}

/// SQL table alias registered with `from(table, alias)`
#[derive(Debug, Clone, PartialEq)]
pub struct TableAlias {
    pub table: String,
    pub alias: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub(crate) search: Vec<OrGroup>,
    pub(crate) select: Vec<Selection>,
    pub(crate) sort: Vec<SortSpec>,
    pub(crate) join: Vec<JoinSpec>,
    pub(crate) limit: Option<i64>,
    pub(crate) skip: Option<i64>,
    pub(crate) group: Vec<String>,
    pub(crate) having: Vec<OrGroup>,
    pub(crate) from: Vec<TableAlias>,
    pub(crate) initialized: bool,
}

impl QuerySpec {
    /// An uninitialized specification; `search*` must be called first
    pub fn new() -> Self {
        Self::default()
    }

    /// An initialized specification matching every row
    pub fn match_all() -> Self {
        Self {
            initialized: true,
            ..Self::default()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Fails with [`Error::SearchNotInitialized`] naming `operation`
    pub fn ensure_initialized(&self, operation: &'static str) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::SearchNotInitialized(operation))
        }
    }

    /// Append a new AND-group holding one predicate
    pub fn search(&mut self, predicate: Predicate) {
        self.initialized = true;
        self.search.push(vec![predicate]);
    }

    /// Drop every search predicate (match all)
    pub fn reset_search(&mut self) {
        self.initialized = true;
        self.search.clear();
    }

    /// Fold a predicate into the last AND-group as an OR branch
    pub fn or_search(&mut self, predicate: Predicate) -> Result<()> {
        self.ensure_initialized("or_search")?;
        match self.search.last_mut() {
            Some(group) if !group.is_empty() => {
                group.push(predicate);
                Ok(())
            }
            _ => Err(Error::invalid_state(
                "or_search() needs an existing search predicate to extend",
            )),
        }
    }

    pub fn select(&mut self, field: impl Into<String>, alias: Option<String>) -> Result<()> {
        self.ensure_initialized("select")?;
        let field = field.into();
        if field.trim().is_empty() {
            return Err(Error::invalid_argument("select field must not be empty"));
        }
        let alias = alias.filter(|alias| !alias.is_empty());
        self.select.push(Selection { field, alias });
        Ok(())
    }

    /// Add a sort key; sorting an already sorted field replaces its order in place
    pub fn sort(&mut self, field: impl Into<String>, order: impl Into<String>) -> Result<()> {
        self.ensure_initialized("sort")?;
        let field = field.into();
        let order = order.into().to_lowercase();
        match self.sort.iter_mut().find(|spec| spec.field == field) {
            Some(existing) => existing.order = order,
            None => self.sort.push(SortSpec { field, order }),
        }
        Ok(())
    }

    pub fn join(&mut self, field1: &str, field2: &str) -> Result<()> {
        self.ensure_initialized("join")?;
        self.join.push(JoinSpec::parse(field1, field2)?);
        Ok(())
    }

    pub fn limit(&mut self, limit: i64) -> Result<()> {
        self.ensure_initialized("limit")?;
        self.limit = Some(limit);
        Ok(())
    }

    pub fn skip(&mut self, skip: i64) -> Result<()> {
        self.ensure_initialized("skip")?;
        self.skip = Some(skip);
        Ok(())
    }

    pub fn group(&mut self, field: impl Into<String>) -> Result<()> {
        self.ensure_initialized("group")?;
        self.group.push(field.into());
        Ok(())
    }

    pub fn having(&mut self, predicate: Predicate) -> Result<()> {
        self.ensure_initialized("having")?;
        self.having.push(vec![predicate]);
        Ok(())
    }

    pub fn or_having(&mut self, predicate: Predicate) -> Result<()> {
        self.ensure_initialized("or_having")?;
        match self.having.last_mut() {
            Some(group) if !group.is_empty() => {
                group.push(predicate);
                Ok(())
            }
            _ => Err(Error::invalid_state(
                "or_having() needs an existing having predicate to extend",
            )),
        }
    }

    pub fn from(&mut self, table: impl Into<String>, alias: impl Into<String>) -> Result<()> {
        self.ensure_initialized("from")?;
        let table = table.into();
        let alias = alias.into();
        if table.is_empty() || alias.is_empty() {
            return Err(Error::invalid_argument(
                "from() needs both a table and an alias",
            ));
        }
        self.from.push(TableAlias { table, alias });
        Ok(())
    }

    pub fn search_groups(&self) -> &[OrGroup] {
        &self.search
    }

    pub fn selections(&self) -> &[Selection] {
        &self.select
    }

    pub fn sorts(&self) -> &[SortSpec] {
        &self.sort
    }

    pub fn joins(&self) -> &[JoinSpec] {
        &self.join
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn skip_value(&self) -> Option<i64> {
        self.skip
    }

    pub fn group_fields(&self) -> &[String] {
        &self.group
    }

    pub fn having_groups(&self) -> &[OrGroup] {
        &self.having
    }

    pub fn table_aliases(&self) -> &[TableAlias] {
        &self.from
    }

    /// Validated sort keys in precedence order
    pub fn sort_orders(&self) -> Result<Vec<(&str, SortOrder)>> {
        self.sort
            .iter()
            .map(|spec| Ok((spec.field.as_str(), SortOrder::parse(&spec.order)?)))
            .collect()
    }

    /// Fails with [`Error::AmbiguousAlias`] when two selections produce the same output key
    pub fn check_aliases(&self) -> Result<()> {
        for (index, selection) in self.select.iter().enumerate() {
            let alias = match &selection.alias {
                Some(alias) => alias,
                None => continue,
            };
            let clash = self.select.iter().enumerate().any(|(other_index, other)| {
                other_index != index && other.output_name() == alias && other.field != selection.field
            });
            if clash {
                return Err(Error::ambiguous_alias(format!(
                    "alias '{}' is used by more than one selected field",
                    alias
                )));
            }
        }
        Ok(())
    }

    /// Orient every join from a container already reachable from `roots`
    pub fn plan_joins<'a>(&'a self, roots: &[&'a str]) -> Result<Vec<JoinStep<'a>>> {
        let mut joined: Vec<&str> = roots.to_vec();
        let mut steps = Vec::with_capacity(self.join.len());

        for spec in &self.join {
            let step = if joined.contains(&spec.container1.as_str()) {
                JoinStep {
                    existing: &spec.container1,
                    existing_field: &spec.field1,
                    target: &spec.container2,
                    target_field: &spec.field2,
                }
            } else if joined.contains(&spec.container2.as_str()) {
                JoinStep {
                    existing: &spec.container2,
                    existing_field: &spec.field2,
                    target: &spec.container1,
                    target_field: &spec.field1,
                }
            } else {
                return Err(Error::DisconnectedJoin {
                    root: roots.first().copied().unwrap_or_default().to_string(),
                    container1: spec.container1.clone(),
                    container2: spec.container2.clone(),
                });
            };
            joined.push(step.target);
            steps.push(step);
        }

        Ok(steps)
    }

    /// The search predicates when every AND-group is a single `is` predicate
    pub fn key_predicates(&self) -> Result<Vec<&Predicate>> {
        let mut predicates = Vec::with_capacity(self.search.len());
        for group in &self.search {
            match group.as_slice() {
                [predicate] if predicate.operator == Operator::Is => predicates.push(predicate),
                [predicate] => {
                    return Err(Error::invalid_operator(format!(
                        "save() requires 'is' predicates, found '{}' on '{}'",
                        predicate.operator, predicate.field
                    )))
                }
                _ => {
                    return Err(Error::invalid_operator(
                        "save() requires a single 'is' predicate per group",
                    ))
                }
            }
        }
        Ok(predicates)
    }

    /// Copy of this specification selecting `COUNT(*)` only
    pub fn for_count(&self) -> Self {
        let mut spec = self.clone();
        spec.select = vec![Selection {
            field: "COUNT(*)".to_string(),
            alias: None,
        }];
        spec.sort.clear();
        spec
    }
}
