//! Statement assembly for the table-level operations.
//!
//! Each builder produces a [`Statement`]: its kind, SQL text with `:name`
//! placeholders and the named values. Nothing here touches the database.
//!
//! ```ignore
//! use pgdm::{FilterSpec, OrderSpec, select};
//!
//! let stmt = select("orders")
//!     .filter(FilterSpec::new().eq("orders", "status", "paid"))
//!     .order(OrderSpec::new().desc("created_at"))
//!     .limit(10)
//!     .build()?;
//! ```

use crate::clause::{JoinSpec, OrderSpec, compile_join, compile_order, compile_where};
use crate::error::{DmError, DmResult};
use crate::filter::FilterSpec;
use crate::ident::{Ident, select_column_sql};
use crate::named::{NamedParams, Param, PositionalSql};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// The operation a statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Count,
    Sum,
    /// Caller-supplied SQL
    Custom,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Count => "count",
            StatementKind::Sum => "sum",
            StatementKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// An assembled statement ready for execution.
#[derive(Debug, Clone)]
pub struct Statement {
    kind: StatementKind,
    sql: String,
    params: NamedParams,
}

impl Statement {
    /// Wrap caller-supplied SQL that uses `:name` placeholders.
    pub fn custom(sql: impl Into<String>, params: NamedParams) -> Self {
        Self {
            kind: StatementKind::Custom,
            sql: sql.into(),
            params,
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &NamedParams {
        &self.params
    }

    /// Rewrite to `$n` placeholders for the driver.
    pub fn to_positional(&self) -> DmResult<PositionalSql> {
        self.params.bind_to(&self.sql)
    }
}

/// Column name → value for INSERT and UPDATE, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Values {
    columns: IndexMap<String, Param>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value; setting the same column again replaces the value.
    pub fn set<T>(mut self, column: impl Into<String>, value: T) -> Self
    where
        T: ToSql + Send + Sync + 'static,
    {
        self.columns.insert(column.into(), Arc::new(value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Validate columns and derive one placeholder per column.
    fn placeholders(&self) -> DmResult<Vec<(Ident, String, Param)>> {
        let mut params = NamedParams::new();
        let mut out = Vec::with_capacity(self.columns.len());
        for (column, value) in &self.columns {
            let ident = Ident::parse(column)?;
            let name = ident.placeholder_stem();
            params.insert_unique(name.clone(), value.clone())?;
            out.push((ident, name, value.clone()));
        }
        Ok(out)
    }
}

/// SELECT builder.
#[derive(Debug, Clone)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    join: JoinSpec,
    filter: FilterSpec,
    order: OrderSpec,
    limit: Option<u64>,
    offset: Option<u64>,
}

/// Start a SELECT on `table`.
pub fn select(table: impl Into<String>) -> Select {
    Select::new(table)
}

impl Select {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            join: JoinSpec::new(),
            filter: FilterSpec::new(),
            order: OrderSpec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Columns to return; an empty list means `*`.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn join(mut self, join: JoinSpec) -> Self {
        self.join = join;
        self
    }

    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    pub fn order(mut self, order: OrderSpec) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn build(&self) -> DmResult<Statement> {
        let table = Ident::parse(&self.table)?;
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| select_column_sql(c))
                .collect::<DmResult<Vec<_>>>()?
                .join(", ")
        };

        let mut sql = format!("SELECT {columns} FROM {table}");
        sql.push_str(&compile_join(&self.table, &self.join)?);
        let (where_sql, params) = compile_where(&self.filter)?.into_parts();
        sql.push_str(&where_sql);

        let order = compile_order(&self.order)?;
        if !order.is_empty() {
            sql.push(' ');
            sql.push_str(&order);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql.push(';');

        Ok(Statement {
            kind: StatementKind::Select,
            sql,
            params,
        })
    }
}

/// `INSERT INTO table (a, b) VALUES (:a, :b);`
pub fn insert_statement(table: &str, values: &Values) -> DmResult<Statement> {
    let table = Ident::parse(table)?;
    if values.is_empty() {
        return Err(DmError::validation(format!(
            "INSERT into '{table}' requires at least one column"
        )));
    }

    let mut columns = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    let mut params = NamedParams::new();
    for (column, name, value) in values.placeholders()? {
        columns.push(column.to_sql());
        placeholders.push(format!(":{name}"));
        params.insert_unique(name, value)?;
    }

    Ok(Statement {
        kind: StatementKind::Insert,
        sql: format!(
            "INSERT INTO {table} ({}) VALUES ({});",
            columns.join(", "),
            placeholders.join(", ")
        ),
        params,
    })
}

/// `UPDATE table SET a = :a WHERE ...;`
///
/// Both the assignments and the filter must be non-empty.
pub fn update_statement(table: &str, values: &Values, filter: &FilterSpec) -> DmResult<Statement> {
    let table = Ident::parse(table)?;
    if values.is_empty() {
        return Err(DmError::validation(format!(
            "UPDATE of '{table}' requires at least one column to set"
        )));
    }
    if filter.is_empty() {
        return Err(DmError::validation(format!(
            "UPDATE of '{table}' requires a filter"
        )));
    }

    let mut assignments = Vec::with_capacity(values.len());
    let mut params = NamedParams::new();
    for (column, name, value) in values.placeholders()? {
        assignments.push(format!("{column} = :{name}"));
        params.insert_unique(name, value)?;
    }
    let (where_sql, where_params) = compile_where(filter)?.into_parts();
    params.merge(where_params)?;

    Ok(Statement {
        kind: StatementKind::Update,
        sql: format!("UPDATE {table} SET {}{where_sql};", assignments.join(", ")),
        params,
    })
}

/// `DELETE FROM table WHERE ...;` The filter must be non-empty.
pub fn delete_statement(table: &str, filter: &FilterSpec) -> DmResult<Statement> {
    let table = Ident::parse(table)?;
    if filter.is_empty() {
        return Err(DmError::validation(format!(
            "DELETE from '{table}' requires a filter"
        )));
    }
    let (where_sql, params) = compile_where(filter)?.into_parts();

    Ok(Statement {
        kind: StatementKind::Delete,
        sql: format!("DELETE FROM {table}{where_sql};"),
        params,
    })
}

/// `SELECT COUNT(column) FROM table [joins] [WHERE ...];` (`*` is accepted)
pub fn count_statement(
    table: &str,
    column: &str,
    filter: &FilterSpec,
    join: &JoinSpec,
) -> DmResult<Statement> {
    let column = select_column_sql(column)?;
    aggregate(StatementKind::Count, "COUNT", table, &column, filter, join)
}

/// `SELECT SUM(column) FROM table [joins] [WHERE ...];`
pub fn sum_statement(
    table: &str,
    column: &str,
    filter: &FilterSpec,
    join: &JoinSpec,
) -> DmResult<Statement> {
    let column = Ident::parse(column)?.to_sql();
    aggregate(StatementKind::Sum, "SUM", table, &column, filter, join)
}

fn aggregate(
    kind: StatementKind,
    function: &str,
    table: &str,
    column: &str,
    filter: &FilterSpec,
    join: &JoinSpec,
) -> DmResult<Statement> {
    let table_ident = Ident::parse(table)?;
    let joins = compile_join(table, join)?;
    let (where_sql, params) = compile_where(filter)?.into_parts();

    Ok(Statement {
        kind,
        sql: format!("SELECT {function}({column}) FROM {table_ident}{joins}{where_sql};"),
        params,
    })
}

#[cfg(test)]
mod tests;
