//! Convenient imports for typical `pgdm` usage.
//!
//! ```ignore
//! use pgdm::prelude::*;
//! ```

pub use crate::{
    ConnectOptions, DataManager, DmError, DmResult, FilterSpec, FromRow, GenericClient, Join,
    JoinSpec, NamedParams, OrderSpec, RowExt, SelectResult, Values, select,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
