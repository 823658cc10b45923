//! Filter values and the table → column → value filter map.
//!
//! A filter value is resolved into a [`FilterValue`] once, when it enters the crate:
//! either through the typed builder methods on [`FilterSpec`] or through
//! [`FilterSpec::from_json`], which maps the reserved strings `NULL`, `!NULL`,
//! `TRUE` and `FALSE` to sentinels. The clause compiler only ever matches on the enum.
//!
//! # Example
//! ```ignore
//! use pgdm::FilterSpec;
//!
//! let filter = FilterSpec::new()
//!     .is_not_null("users", "age")
//!     .in_list("users", "role", ["admin", "editor"]);
//! ```

use crate::error::{DmError, DmResult};
use crate::named::Param;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// Reserved filter values rendered as `IS ...` predicates without a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// `IS NULL`
    Null,
    /// `IS NOT NULL`
    NotNull,
    /// `IS TRUE`
    True,
    /// `IS FALSE`
    False,
}

impl Sentinel {
    /// Resolve one of the reserved strings `NULL`, `!NULL`, `TRUE`, `FALSE`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NULL" => Some(Sentinel::Null),
            "!NULL" => Some(Sentinel::NotNull),
            "TRUE" => Some(Sentinel::True),
            "FALSE" => Some(Sentinel::False),
            _ => None,
        }
    }

    pub(crate) fn predicate(self) -> &'static str {
        match self {
            Sentinel::Null => "IS NULL",
            Sentinel::NotNull => "IS NOT NULL",
            Sentinel::True => "IS TRUE",
            Sentinel::False => "IS FALSE",
        }
    }
}

/// The value side of one filter entry.
#[derive(Debug, Clone)]
pub enum FilterValue {
    /// `column = :placeholder`
    Scalar(Param),
    /// `column IS ...`
    Sentinel(Sentinel),
    /// `column IN (:p0, :p1, ...)`
    List(Vec<Param>),
}

impl FilterValue {
    /// Equality against a bound value.
    pub fn eq<T>(value: T) -> Self
    where
        T: ToSql + Send + Sync + 'static,
    {
        FilterValue::Scalar(Arc::new(value))
    }

    /// Membership in a list of bound values.
    pub fn in_list<T, I>(values: I) -> Self
    where
        T: ToSql + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        FilterValue::List(
            values
                .into_iter()
                .map(|v| Arc::new(v) as Param)
                .collect(),
        )
    }

    /// Resolve a JSON value: reserved strings become sentinels, strings and numbers
    /// become scalars, arrays of strings/numbers become lists.
    pub fn from_json(table: &str, column: &str, value: &Value) -> DmResult<Self> {
        match value {
            Value::String(s) => Ok(match Sentinel::parse(s) {
                Some(sentinel) => FilterValue::Sentinel(sentinel),
                None => FilterValue::Scalar(Arc::new(s.clone())),
            }),
            Value::Number(_) => json_scalar(table, column, value).map(FilterValue::Scalar),
            Value::Array(items) => items
                .iter()
                .map(|item| json_scalar(table, column, item))
                .collect::<DmResult<Vec<_>>>()
                .map(FilterValue::List),
            Value::Null => Err(DmError::invalid_filter_value(
                table,
                column,
                "JSON null is not a filter value; use the \"NULL\" sentinel",
            )),
            Value::Bool(_) => Err(DmError::invalid_filter_value(
                table,
                column,
                "booleans are not filter values; use the \"TRUE\"/\"FALSE\" sentinels",
            )),
            Value::Object(_) => Err(DmError::invalid_filter_value(
                table,
                column,
                "objects are not filter values",
            )),
        }
    }
}

fn json_scalar(table: &str, column: &str, value: &Value) -> DmResult<Param> {
    match value {
        Value::String(s) => Ok(Arc::new(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Arc::new(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Arc::new(f))
            } else {
                Err(DmError::invalid_filter_value(
                    table,
                    column,
                    format!("number {n} does not fit a bigint or double"),
                ))
            }
        }
        other => Err(DmError::invalid_filter_value(
            table,
            column,
            format!("list items must be strings or numbers, got {other}"),
        )),
    }
}

/// Mapping from table name to column name to [`FilterValue`], in insertion order.
///
/// Setting the same table/column twice replaces the value in place.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    tables: IndexMap<String, IndexMap<String, FilterValue>>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    pub fn with(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        value: FilterValue,
    ) -> Self {
        self.tables
            .entry(table.into())
            .or_default()
            .insert(column.into(), value);
        self
    }

    /// `table.column = value`
    pub fn eq<T>(self, table: impl Into<String>, column: impl Into<String>, value: T) -> Self
    where
        T: ToSql + Send + Sync + 'static,
    {
        self.with(table, column, FilterValue::eq(value))
    }

    /// `table.column IN (values...)`
    pub fn in_list<T, I>(self, table: impl Into<String>, column: impl Into<String>, values: I) -> Self
    where
        T: ToSql + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        self.with(table, column, FilterValue::in_list(values))
    }

    /// `table.column IS NULL`
    pub fn is_null(self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.with(table, column, FilterValue::Sentinel(Sentinel::Null))
    }

    /// `table.column IS NOT NULL`
    pub fn is_not_null(self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.with(table, column, FilterValue::Sentinel(Sentinel::NotNull))
    }

    /// `table.column IS TRUE`
    pub fn is_true(self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.with(table, column, FilterValue::Sentinel(Sentinel::True))
    }

    /// `table.column IS FALSE`
    pub fn is_false(self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.with(table, column, FilterValue::Sentinel(Sentinel::False))
    }

    /// Build from a JSON object shaped `{"table": {"column": value}}`.
    ///
    /// Key order of the JSON object is kept. `null` is accepted as "no filter".
    pub fn from_json(value: &Value) -> DmResult<Self> {
        let tables = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(tables) => tables,
            other => {
                return Err(DmError::validation(format!(
                    "Filter must be an object of tables, got {other}"
                )));
            }
        };

        let mut spec = Self::new();
        for (table, columns) in tables {
            let Value::Object(columns) = columns else {
                return Err(DmError::validation(format!(
                    "Filter for table '{table}' must be an object of columns"
                )));
            };
            for (column, value) in columns {
                let value = FilterValue::from_json(table, column, value)?;
                spec = spec.with(table.as_str(), column.as_str(), value);
            }
        }
        Ok(spec)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(IndexMap::is_empty)
    }

    /// Iterate `(table, column, value)` triples in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &FilterValue)> {
        self.tables.iter().flat_map(|(table, columns)| {
            columns
                .iter()
                .map(move |(column, value)| (table.as_str(), column.as_str(), value))
        })
    }
}

impl TryFrom<&Value> for FilterSpec {
    type Error = DmError;

    fn try_from(value: &Value) -> DmResult<Self> {
        Self::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reserved_strings_resolve_to_sentinels() {
        assert_eq!(Sentinel::parse("NULL"), Some(Sentinel::Null));
        assert_eq!(Sentinel::parse("!NULL"), Some(Sentinel::NotNull));
        assert_eq!(Sentinel::parse("TRUE"), Some(Sentinel::True));
        assert_eq!(Sentinel::parse("FALSE"), Some(Sentinel::False));
        assert_eq!(Sentinel::parse("null"), None);
    }

    #[test]
    fn json_keeps_key_order() {
        let spec = FilterSpec::from_json(&json!({
            "users": {"role": "admin", "age": "!NULL"},
            "orders": {"total": 10}
        }))
        .unwrap();

        let keys: Vec<_> = spec.entries().map(|(t, c, _)| format!("{t}.{c}")).collect();
        assert_eq!(keys, vec!["users.role", "users.age", "orders.total"]);
    }

    #[test]
    fn json_values_map_to_variants() {
        let spec = FilterSpec::from_json(&json!({
            "t": {"a": "NULL", "b": "x", "c": 1.5, "d": [1, "two"]}
        }))
        .unwrap();
        let values: Vec<_> = spec.entries().map(|(_, _, v)| v.clone()).collect();

        assert!(matches!(values[0], FilterValue::Sentinel(Sentinel::Null)));
        assert!(matches!(&values[1], FilterValue::Scalar(v) if format!("{v:?}") == "\"x\""));
        assert!(matches!(&values[2], FilterValue::Scalar(v) if format!("{v:?}") == "1.5"));
        assert!(matches!(&values[3], FilterValue::List(items) if items.len() == 2));
    }

    #[test]
    fn malformed_json_values_are_rejected() {
        for bad in [json!({"k": 1}), json!(null), json!(true), json!([[1]]), json!([{}])] {
            let err = FilterSpec::from_json(&json!({"t": {"c": bad}})).unwrap_err();
            assert!(
                matches!(&err, DmError::InvalidFilterValue { table, column, .. } if table == "t" && column == "c"),
                "unexpected error: {err}"
            );
        }
    }

    #[test]
    fn malformed_json_shapes_are_rejected() {
        assert!(FilterSpec::from_json(&json!(["users"])).is_err());
        assert!(FilterSpec::from_json(&json!({"users": "admin"})).is_err());
        assert!(FilterSpec::from_json(&json!(null)).unwrap().is_empty());
    }

    #[test]
    fn repeated_column_replaces_in_place() {
        let spec = FilterSpec::new()
            .eq("t", "a", 1_i32)
            .eq("t", "b", 2_i32)
            .is_null("t", "a");
        let entries: Vec<_> = spec.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, "a");
        assert!(matches!(entries[0].2, FilterValue::Sentinel(Sentinel::Null)));
    }

    #[test]
    fn try_from_json_matches_from_json() {
        let value = json!({"users": {"active": "TRUE"}});
        let spec = FilterSpec::try_from(&value).unwrap();
        let (_, column, filter) = spec.entries().next().unwrap();
        assert_eq!(column, "active");
        assert!(matches!(filter, FilterValue::Sentinel(Sentinel::True)));
    }
}
