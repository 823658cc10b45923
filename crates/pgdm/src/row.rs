//! Row mapping traits and the normalized result shapes.

use crate::error::{DmError, DmResult};
use tokio_postgres::Row;

/// Trait for converting a database row into a Rust struct.
///
/// # Example
///
/// ```ignore
/// use pgdm::{FromRow, RowExt, DmResult};
///
/// struct User {
///     id: i64,
///     email: String,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &tokio_postgres::Row) -> DmResult<Self> {
///         Ok(Self {
///             id: row.try_get_column("id")?,
///             email: row.try_get_column("email")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> DmResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning DmError::Decode on failure
    fn try_get_column<T>(&self, column: &str) -> DmResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> DmResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| DmError::decode(column, e.to_string()))
    }
}

/// Result of a read: all rows plus their count.
#[derive(Debug, Default)]
pub struct SelectResult {
    /// Number of rows returned.
    pub row_count: usize,
    /// All rows, in the order the database returned them.
    pub rows: Vec<Row>,
}

impl SelectResult {
    pub(crate) fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            row_count: rows.len(),
            rows,
        }
    }

    /// The first row, if any.
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Map every row to `T`.
    pub fn rows_as<T: FromRow>(&self) -> DmResult<Vec<T>> {
        self.rows.iter().map(T::from_row).collect()
    }

    /// Map the first row to `T`, if any.
    pub fn first_as<T: FromRow>(&self) -> DmResult<Option<T>> {
        self.first().map(T::from_row).transpose()
    }
}

/// Result of an INSERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertResult {
    /// Whether the statement inserted at least one row.
    pub raw: bool,
    /// Rows reported as affected by the driver.
    pub rows_affected: u64,
    /// `lastval()` of the session after the insert; `None` when no sequence has been
    /// used on this connection.
    pub last_insert_id: Option<i64>,
}

impl InsertResult {
    pub(crate) fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            raw: rows_affected > 0,
            rows_affected,
            last_insert_id,
        }
    }
}
