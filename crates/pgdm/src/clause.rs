//! Clause compiler: WHERE, JOIN and ORDER BY fragments.
//!
//! Only identifiers are interpolated into the SQL text, and only after passing
//! [`Ident::parse`]. Values always travel as named bind parameters whose names are
//! derived from table + column (+ list ordinal), e.g. `:where_users_role_0`.

use crate::error::{DmError, DmResult};
use crate::filter::{FilterSpec, FilterValue};
use crate::ident::Ident;
use crate::named::NamedParams;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A SQL fragment plus the named parameters it references.
#[derive(Debug, Clone, Default)]
pub struct CompiledClause {
    sql: String,
    params: NamedParams,
}

impl CompiledClause {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &NamedParams {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn into_parts(self) -> (String, NamedParams) {
        (self.sql, self.params)
    }
}

/// Compile a filter into ` WHERE a AND b ...` and its bindings.
///
/// An empty filter compiles to an empty fragment with no bindings.
pub fn compile_where(filter: &FilterSpec) -> DmResult<CompiledClause> {
    let mut conditions: Vec<String> = Vec::new();
    let mut params = NamedParams::new();

    for (table, column, value) in filter.entries() {
        let table = Ident::parse(table)?;
        let column = Ident::parse(column)?;
        let target = format!("{table}.{column}");
        let stem = format!(
            "where_{}_{}",
            table.placeholder_stem(),
            column.placeholder_stem()
        );

        match value {
            FilterValue::Sentinel(sentinel) => {
                conditions.push(format!("{target} {}", sentinel.predicate()));
            }
            FilterValue::Scalar(v) => {
                conditions.push(format!("{target} = :{stem}"));
                params.insert_unique(stem, v.clone())?;
            }
            // `IN ()` is a syntax error; an empty list matches nothing.
            FilterValue::List(values) if values.is_empty() => {
                conditions.push("1=0".to_string());
            }
            FilterValue::List(values) => {
                let mut placeholders = Vec::with_capacity(values.len());
                for (i, v) in values.iter().enumerate() {
                    let name = format!("{stem}_{i}");
                    placeholders.push(format!(":{name}"));
                    params.insert_unique(name, v.clone())?;
                }
                conditions.push(format!("{target} IN ({})", placeholders.join(", ")));
            }
        }
    }

    if conditions.is_empty() {
        return Ok(CompiledClause::default());
    }
    Ok(CompiledClause {
        sql: format!(" WHERE {}", conditions.join(" AND ")),
        params,
    })
}

/// One joined table: `<kind> JOIN <table> ON <from>.<foreign_key> = <table>.<primary_key>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: String,
    pub foreign_key: String,
    pub primary_key: String,
    /// Source table of the foreign key; `None` means the statement's base table.
    pub from: Option<String>,
}

impl Join {
    /// Join with a kind passed through verbatim (`"inner"`, `"left outer"`, ...).
    pub fn new(
        kind: impl Into<String>,
        foreign_key: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            foreign_key: foreign_key.into(),
            primary_key: primary_key.into(),
            from: None,
        }
    }

    pub fn inner(foreign_key: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self::new("INNER", foreign_key, primary_key)
    }

    pub fn left(foreign_key: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self::new("LEFT", foreign_key, primary_key)
    }

    pub fn right(foreign_key: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self::new("RIGHT", foreign_key, primary_key)
    }

    /// Take the foreign key from `table` instead of the base table.
    pub fn from_table(mut self, table: impl Into<String>) -> Self {
        self.from = Some(table.into());
        self
    }
}

/// Joined table name → [`Join`], in insertion order.
#[derive(Debug, Clone, Default)]
pub struct JoinSpec {
    joins: IndexMap<String, Join>,
}

impl JoinSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(mut self, table: impl Into<String>, join: Join) -> Self {
        self.joins.insert(table.into(), join);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Join)> {
        self.joins.iter().map(|(t, j)| (t.as_str(), j))
    }

    /// Build from `{"table": [kind, foreign_key, primary_key, from?]}`.
    ///
    /// An empty or `null` fourth element means the base table.
    pub fn from_json(value: &Value) -> DmResult<Self> {
        let tables = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(tables) => tables,
            other => {
                return Err(DmError::validation(format!(
                    "Join spec must be an object of tables, got {other}"
                )));
            }
        };

        let mut spec = Self::new();
        for (table, entry) in tables {
            let parts = match entry {
                Value::Array(parts) if (3..=4).contains(&parts.len()) => parts,
                _ => {
                    return Err(DmError::validation(format!(
                        "Join for '{table}' must be [kind, foreign_key, primary_key, from?]"
                    )));
                }
            };
            let required = |i: usize, what: &str| -> DmResult<String> {
                join_part(table, parts, i)?
                    .map(str::to_string)
                    .ok_or_else(|| {
                        DmError::validation(format!("Join for '{table}' is missing its {what}"))
                    })
            };

            let mut join = Join::new(
                required(0, "kind")?,
                required(1, "foreign key")?,
                required(2, "primary key")?,
            );
            join.from = join_part(table, parts, 3)?.map(str::to_string);
            spec = spec.join(table.as_str(), join);
        }
        Ok(spec)
    }
}

fn join_part<'a>(table: &str, parts: &'a [Value], i: usize) -> DmResult<Option<&'a str>> {
    match parts.get(i) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(DmError::validation(format!(
            "Join for '{table}': expected a string, got {other}"
        ))),
    }
}

impl TryFrom<&Value> for JoinSpec {
    type Error = DmError;

    fn try_from(value: &Value) -> DmResult<Self> {
        Self::from_json(value)
    }
}

/// Compile joins into ` <kind> JOIN t ON src.fk = t.pk` fragments.
///
/// The kind is not checked against a fixed vocabulary (the database rejects
/// unsupported keywords), but it may only contain ASCII letters and spaces.
pub fn compile_join(base_table: &str, joins: &JoinSpec) -> DmResult<String> {
    let base = Ident::parse(base_table)?;
    let mut out = String::new();

    for (table, join) in joins.iter() {
        let kind = join.kind.trim();
        if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
            return Err(DmError::validation(format!(
                "Invalid join kind '{}' for table '{table}'",
                join.kind
            )));
        }
        let table = Ident::parse(table)?;
        let source = match &join.from {
            Some(from) => Ident::parse(from)?,
            None => base.clone(),
        };
        let foreign_key = Ident::parse(&join.foreign_key)?;
        let primary_key = Ident::parse(&join.primary_key)?;

        out.push_str(&format!(
            " {kind} JOIN {table} ON {source}.{foreign_key} = {table}.{primary_key}"
        ));
    }
    Ok(out)
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Direction {
    type Err = DmError;

    fn from_str(s: &str) -> DmResult<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Direction::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Direction::Desc)
        } else {
            Err(DmError::validation(format!(
                "Invalid sort direction '{s}', expected ASC or DESC"
            )))
        }
    }
}

/// Ordered list of `(column, direction)`; a missing direction means ASC.
#[derive(Debug, Clone, Default)]
pub struct OrderSpec {
    items: Vec<(String, Option<Direction>)>,
}

impl OrderSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Order by `column` without an explicit direction.
    pub fn by(mut self, column: impl Into<String>) -> Self {
        self.items.push((column.into(), None));
        self
    }

    pub fn asc(mut self, column: impl Into<String>) -> Self {
        self.items.push((column.into(), Some(Direction::Asc)));
        self
    }

    pub fn desc(mut self, column: impl Into<String>) -> Self {
        self.items.push((column.into(), Some(Direction::Desc)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Build from `{"column": "ASC"|"DESC"}` or a positional `["column", ...]`.
    pub fn from_json(value: &Value) -> DmResult<Self> {
        let mut spec = Self::new();
        match value {
            Value::Null => {}
            Value::Object(columns) => {
                for (column, direction) in columns {
                    let direction = match direction {
                        Value::Null => None,
                        Value::String(s) => Some(s.parse::<Direction>()?),
                        other => {
                            return Err(DmError::validation(format!(
                                "Direction for '{column}' must be a string, got {other}"
                            )));
                        }
                    };
                    spec.items.push((column.clone(), direction));
                }
            }
            Value::Array(columns) => {
                for column in columns {
                    let Value::String(column) = column else {
                        return Err(DmError::validation(format!(
                            "Order column must be a string, got {column}"
                        )));
                    };
                    spec = spec.by(column.as_str());
                }
            }
            other => {
                return Err(DmError::validation(format!(
                    "Order spec must be an object or array, got {other}"
                )));
            }
        }
        Ok(spec)
    }
}

impl TryFrom<&Value> for OrderSpec {
    type Error = DmError;

    fn try_from(value: &Value) -> DmResult<Self> {
        Self::from_json(value)
    }
}

/// Compile an order spec into `ORDER BY a ASC, b DESC`; empty spec → empty string.
pub fn compile_order(order: &OrderSpec) -> DmResult<String> {
    if order.items.is_empty() {
        return Ok(String::new());
    }
    let mut terms = Vec::with_capacity(order.items.len());
    for (column, direction) in &order.items {
        let column = Ident::parse(column)?;
        terms.push(format!("{column} {}", direction.unwrap_or_default()));
    }
    Ok(format!("ORDER BY {}", terms.join(", ")))
}
