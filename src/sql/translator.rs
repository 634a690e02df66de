//! Turns a [`QuerySpec`] into parameterized SQL
//!
//! Every value goes through a marker: the statement text only ever holds
//! quoted identifiers, operator tokens and placeholders. Markers are named
//! `marker1`, `marker2`, ... in the order they appear in the text, so the
//! parameter map doubles as the positional binding order.

use super::dialects::{split_function_call, SqlDialect};
use crate::backend::Translator;
use crate::database::types::SqlValue;
use crate::error::{Error, Result};
use crate::query::{Operator, OrGroup, Predicate, QuerySpec};
use crate::Row;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Statement text plus its marker→value map
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: IndexMap<String, SqlValue>,
}

impl Statement {
    /// Parameter values in binding order
    pub fn values(&self) -> Vec<SqlValue> {
        self.params.values().cloned().collect()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Marker allocation for one translation pass
struct Markers<'d> {
    dialect: &'d dyn SqlDialect,
    params: IndexMap<String, SqlValue>,
}

impl<'d> Markers<'d> {
    fn new(dialect: &'d dyn SqlDialect) -> Self {
        Self {
            dialect,
            params: IndexMap::new(),
        }
    }

    /// Register a value and return the placeholder text for it
    fn bind(&mut self, value: SqlValue) -> String {
        let position = self.params.len() + 1;
        let marker = format!("marker{}", position);
        let placeholder = self.dialect.placeholder(&marker, position);
        self.params.insert(marker, value);
        placeholder
    }

    fn finish(self, sql: String) -> Statement {
        log::trace!("Translated SQL: {}", sql);
        Statement {
            sql,
            params: self.params,
        }
    }
}

/// SQL translator for one dialect and namespace
#[derive(Clone)]
pub struct SqlTranslator {
    dialect: Arc<dyn SqlDialect>,
    namespace: String,
}

impl fmt::Debug for SqlTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlTranslator")
            .field("dialect", &self.dialect.backend())
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl SqlTranslator {
    pub fn new(dialect: Arc<dyn SqlDialect>) -> Self {
        Self {
            dialect,
            namespace: String::new(),
        }
    }

    /// Prefix prepended to every container name
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Quoted, namespaced container name
    pub fn table(&self, container: &str) -> String {
        self.dialect
            .quote_segment(&format!("{}{}", self.namespace, container))
    }

    /// Quoted field reference; the container part of a dotted field is namespaced
    pub fn column(&self, raw: &str) -> String {
        self.dialect.quote_identifier(&self.qualify(raw))
    }

    fn qualify(&self, raw: &str) -> String {
        if self.namespace.is_empty() {
            return raw.to_string();
        }
        if let Some((name, inner)) = split_function_call(raw) {
            return format!("{}({})", name, self.qualify(inner));
        }
        if raw.contains('.') {
            format!("{}{}", self.namespace, raw)
        } else {
            raw.to_string()
        }
    }

    /// `SELECT ... FROM ... [JOIN] [WHERE] [GROUP BY] [HAVING] [ORDER BY] [LIMIT]`
    pub fn select(&self, container: &str, spec: &QuerySpec) -> Result<Statement> {
        spec.check_aliases()?;
        let sort = spec.sort_orders()?;
        let mut markers = Markers::new(self.dialect.as_ref());

        let mut sql = String::from("SELECT ");
        if spec.selections().is_empty() {
            sql.push('*');
        } else {
            let columns = spec
                .selections()
                .iter()
                .map(|selection| match &selection.alias {
                    Some(alias) => format!(
                        "{} AS {}",
                        self.column(&selection.field),
                        self.dialect.quote_identifier(alias)
                    ),
                    None => self.column(&selection.field),
                })
                .collect::<Vec<_>>();
            sql.push_str(&columns.join(", "));
        }

        sql.push_str(&self.from_clause(container, spec));
        sql.push_str(&self.join_clauses(container, spec)?);

        if let Some(conditions) = self.conditions(spec.search_groups(), &mut markers)? {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }

        if !spec.group_fields().is_empty() {
            let fields = spec
                .group_fields()
                .iter()
                .map(|field| self.column(field))
                .collect::<Vec<_>>();
            sql.push_str(" GROUP BY ");
            sql.push_str(&fields.join(", "));
        }

        if let Some(conditions) = self.conditions(spec.having_groups(), &mut markers)? {
            sql.push_str(" HAVING ");
            sql.push_str(&conditions);
        }

        if !sort.is_empty() {
            let clauses = sort
                .iter()
                .map(|(field, order)| format!("{} {}", self.column(field), order.as_sql()))
                .collect::<Vec<_>>();
            sql.push_str(" ORDER BY ");
            sql.push_str(&clauses.join(", "));
        }

        sql.push_str(
            &self
                .dialect
                .limit_syntax(spec.limit_value(), spec.skip_value()),
        );

        Ok(markers.finish(sql))
    }

    /// `SELECT COUNT(*)` over the same containers and predicates
    ///
    /// Sort, limit and skip do not apply to a count.
    pub fn count(&self, container: &str, spec: &QuerySpec) -> Result<Statement> {
        let mut counting = spec.for_count();
        counting.limit = None;
        counting.skip = None;
        self.select(container, &counting)
    }

    /// `UPDATE ... SET field=marker,... [WHERE]`
    pub fn update(&self, container: &str, spec: &QuerySpec, data: &Row) -> Result<Statement> {
        if data.is_empty() {
            return Err(Error::invalid_argument("update() needs at least one field"));
        }
        self.check_mutation_joins(spec, "JOIN in UPDATE")?;
        let mut markers = Markers::new(self.dialect.as_ref());

        let mut sql = format!("UPDATE {}", self.table(container));
        sql.push_str(&self.join_clauses(container, spec)?);

        let assignments = data
            .iter()
            .map(|(field, value)| {
                format!("{} = {}", self.column(field), markers.bind(SqlValue::from(value)))
            })
            .collect::<Vec<_>>();
        sql.push_str(" SET ");
        sql.push_str(&assignments.join(", "));

        if let Some(conditions) = self.conditions(spec.search_groups(), &mut markers)? {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }

        Ok(markers.finish(sql))
    }

    /// `DELETE FROM ... [WHERE]`
    pub fn delete(&self, container: &str, spec: &QuerySpec) -> Result<Statement> {
        self.check_mutation_joins(spec, "JOIN in DELETE")?;
        let mut markers = Markers::new(self.dialect.as_ref());
        let table = self.table(container);

        let mut sql = if spec.joins().is_empty() {
            format!("DELETE FROM {}", table)
        } else {
            format!("DELETE {} FROM {}", table, table)
        };
        sql.push_str(&self.join_clauses(container, spec)?);

        if let Some(conditions) = self.conditions(spec.search_groups(), &mut markers)? {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions);
        }

        Ok(markers.finish(sql))
    }

    /// `INSERT INTO ... (fields) VALUES (markers)`, with `RETURNING` where supported
    pub fn insert(&self, container: &str, data: &Row, returning: Option<&str>) -> Result<Statement> {
        if data.is_empty() {
            return Err(Error::invalid_argument("insert() needs at least one field"));
        }
        let mut markers = Markers::new(self.dialect.as_ref());
        let (columns, placeholders) = self.insert_lists(data, &mut markers);

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(container),
            columns.join(", "),
            placeholders.join(", ")
        );
        if let Some(column) = returning {
            if let Some(tail) = self.dialect.returning_syntax(&[self.column(column)]) {
                sql.push_str(&tail);
            }
        }

        Ok(markers.finish(sql))
    }

    /// Single-statement upsert keyed on the search's `is` predicates
    ///
    /// Returns `Ok(None)` when the dialect has no upsert syntax; callers then
    /// fall back to a count lookup followed by update or insert.
    pub fn upsert(&self, container: &str, spec: &QuerySpec, data: &Row) -> Result<Option<Statement>> {
        if data.is_empty() {
            return Err(Error::invalid_argument("save() needs at least one field"));
        }
        let keys = spec.key_predicates()?;

        let update_columns = data
            .keys()
            .map(|field| self.column(field))
            .collect::<Vec<_>>();
        let tail = match self.dialect.upsert_syntax(&update_columns) {
            Some(tail) => tail,
            None => return Ok(None),
        };

        let mut row = Row::new();
        for predicate in keys {
            row.insert(predicate.field.clone(), predicate.value.clone());
        }
        for (field, value) in data {
            row.insert(field.clone(), value.clone());
        }

        let mut markers = Markers::new(self.dialect.as_ref());
        let (columns, placeholders) = self.insert_lists(&row, &mut markers);
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            self.table(container),
            columns.join(", "),
            placeholders.join(", "),
            tail
        );

        Ok(Some(markers.finish(sql)))
    }

    /// Statement listing the containers of the connected database
    pub fn list_containers(&self) -> Statement {
        Statement {
            sql: self.dialect.list_tables_sql().to_string(),
            params: IndexMap::new(),
        }
    }

    fn insert_lists(&self, data: &Row, markers: &mut Markers<'_>) -> (Vec<String>, Vec<String>) {
        data.iter()
            .map(|(field, value)| (self.column(field), markers.bind(SqlValue::from(value))))
            .unzip()
    }

    fn check_mutation_joins(&self, spec: &QuerySpec, feature: &str) -> Result<()> {
        if !spec.joins().is_empty() && !self.dialect.supports_mutation_joins() {
            return Err(Error::unsupported_feature(
                self.dialect.backend().to_string(),
                feature,
            ));
        }
        Ok(())
    }

    fn from_clause(&self, container: &str, spec: &QuerySpec) -> String {
        let aliases = spec.table_aliases();
        if aliases.is_empty() {
            return format!(" FROM {}", self.table(container));
        }

        let mut tables = aliases
            .iter()
            .map(|alias| format!("{} AS {}", self.table(&alias.table), self.table(&alias.alias)))
            .collect::<Vec<_>>();
        if !aliases.iter().any(|alias| alias.table == container) {
            tables.push(self.table(container));
        }
        format!(" FROM {}", tables.join(", "))
    }

    fn join_clauses(&self, container: &str, spec: &QuerySpec) -> Result<String> {
        if spec.joins().is_empty() {
            return Ok(String::new());
        }

        let mut roots = vec![container];
        roots.extend(spec.table_aliases().iter().map(|alias| alias.alias.as_str()));

        let mut sql = String::new();
        for step in spec.plan_joins(&roots)? {
            sql.push_str(&format!(
                " LEFT JOIN {} ON {} = {}",
                self.table(step.target),
                self.column(&format!("{}.{}", step.existing, step.existing_field)),
                self.column(&format!("{}.{}", step.target, step.target_field)),
            ));
        }
        Ok(sql)
    }

    /// `((a OR b) AND (c))`, or `None` when there are no groups
    fn conditions(&self, groups: &[OrGroup], markers: &mut Markers<'_>) -> Result<Option<String>> {
        if groups.is_empty() {
            return Ok(None);
        }

        let mut ands = Vec::with_capacity(groups.len());
        for group in groups {
            let ors = group
                .iter()
                .map(|predicate| self.predicate(predicate, markers))
                .collect::<Result<Vec<_>>>()?;
            ands.push(format!("({})", ors.join(" OR ")));
        }
        Ok(Some(format!("({})", ands.join(" AND "))))
    }

    fn predicate(&self, predicate: &Predicate, markers: &mut Markers<'_>) -> Result<String> {
        let token = self.dialect.operator_token(predicate.operator)?;
        let column = self.column(&predicate.field);

        match predicate.operator {
            Operator::In | Operator::NotIn => {
                let values = predicate.values();
                if values.is_empty() {
                    // Nothing is in an empty set
                    return Ok(if predicate.operator == Operator::In {
                        "1=0".to_string()
                    } else {
                        "1=1".to_string()
                    });
                }
                let placeholders = values
                    .iter()
                    .map(|value| markers.bind(SqlValue::from(value)))
                    .collect::<Vec<_>>();
                Ok(format!("{} {} ({})", column, token, placeholders.join(",")))
            }
            Operator::Is if predicate.value.is_null() => Ok(format!("{} IS NULL", column)),
            Operator::IsNot if predicate.value.is_null() => Ok(format!("{} IS NOT NULL", column)),
            _ => Ok(format!(
                "{} {} {}",
                column,
                token,
                markers.bind(SqlValue::from(&predicate.value))
            )),
        }
    }
}

impl Translator for SqlTranslator {
    type Request = Statement;

    fn translate(&self, container: &str, spec: &QuerySpec) -> Result<Statement> {
        self.select(container, spec)
    }
}
