//! Error types for pgdm

use thiserror::Error;

/// Result type alias for pgdm operations
pub type DmResult<T> = Result<T, DmError>;

/// SQLSTATE raised by `lastval()` when no sequence was used in the session.
pub(crate) const SQLSTATE_OBJECT_NOT_IN_PREREQUISITE_STATE: &str = "55000";

/// Error types for data management operations
#[derive(Debug, Error)]
pub enum DmError {
    /// Unsupported database kind or unusable connection settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed identifier, join, order or statement input
    #[error("Validation error: {0}")]
    Validation(String),

    /// A filter value that cannot be rendered as a condition
    #[error("Invalid filter value for '{table}.{column}': {reason}")]
    InvalidFilterValue {
        table: String,
        column: String,
        reason: String,
    },

    /// Error reported by the driver while executing a statement
    #[error("Driver error: {0}")]
    Driver(#[from] tokio_postgres::Error),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A statement that must return a row returned none
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transaction control used in the wrong state
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl DmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid filter value error
    pub fn invalid_filter_value(
        table: impl Into<String>,
        column: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidFilterValue {
            table: table.into(),
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a driver error.
    ///
    /// Kept as a function so it can be passed to `map_err` at every driver call.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        Self::Driver(err)
    }

    /// SQLSTATE code of the underlying database error, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Driver(err) => err.as_db_error().map(|db| db.code().code()),
            _ => None,
        }
    }

    /// Check if this is a validation error (including invalid filter values)
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidFilterValue { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate() == Some("23505")
    }

    /// Check if this is a foreign key violation error
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate() == Some("23503")
    }

    /// Check if this is a check constraint violation error
    pub fn is_check_violation(&self) -> bool {
        self.sqlstate() == Some("23514")
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for DmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
