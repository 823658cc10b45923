//! # pgdm
//!
//! Compact table-level data management for PostgreSQL.
//!
//! ## Features
//!
//! - **Declarative filters**: `{table: {column: value}}` maps compile to a WHERE clause
//!   with named, bound parameters (`NULL`, `!NULL`, `TRUE`, `FALSE` and lists included)
//! - **Joins and ordering** from small declarative specs
//! - **Safe defaults**: identifiers are validated, UPDATE and DELETE require a filter
//! - **Normalized results**: `SelectResult { row_count, rows }`, affected-row counts for writes
//! - **Custom SQL** with `:name` placeholders when the table helpers are not enough
//! - **Transactions** through `begin_transaction` / `commit` / `rollback`
//!
//! ## Example
//!
//! ```ignore
//! use pgdm::prelude::*;
//!
//! let dm = DataManager::connect(&ConnectOptions::from_env()?).await?;
//!
//! let admins = dm
//!     .select(
//!         &select("users")
//!             .filter(FilterSpec::new().in_list("users", "role", ["admin", "owner"]))
//!             .order(OrderSpec::new().asc("email")),
//!     )
//!     .await?;
//! println!("{} admins", admins.row_count);
//!
//! let active = dm
//!     .count("users", "*", &FilterSpec::new().is_true("users", "active"), &JoinSpec::new())
//!     .await?;
//! ```

pub mod clause;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod ident;
mod log;
pub mod manager;
pub mod named;
pub mod prelude;
pub mod row;
pub mod statement;

pub use clause::{
    CompiledClause, Direction, Join, JoinSpec, OrderSpec, compile_join, compile_order,
    compile_where,
};
pub use client::GenericClient;
pub use config::{ConnectOptions, DatabaseKind, LogConfig, ManagerConfig};
pub use error::{DmError, DmResult};
pub use filter::{FilterSpec, FilterValue, Sentinel};
pub use ident::{Ident, IdentPart};
pub use manager::DataManager;
pub use named::{NamedParams, Param, PositionalSql};
pub use row::{FromRow, InsertResult, RowExt, SelectResult};
pub use statement::{
    Select, Statement, StatementKind, Values, count_statement, delete_statement,
    insert_statement, select, sum_statement, update_statement,
};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{PooledClient, create_pool, create_pool_with_config};

#[cfg(feature = "decimal")]
pub use rust_decimal;

// Re-exported so callers can name row and value types without a direct dependency.
pub use tokio_postgres;
