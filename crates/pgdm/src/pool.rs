//! Connection pool utilities

use crate::client::GenericClient;
use crate::config::{ConnectOptions, ManagerConfig as DmConfig};
use crate::error::{DmError, DmResult};
use crate::manager::DataManager;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_postgres::NoTls;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// Create a connection pool for `options` with the default size of 16.
///
/// # Example
///
/// ```ignore
/// let pool = pgdm::create_pool(&ConnectOptions::from_env()?)?;
/// let dm = DataManager::from_pool(&pool).await?;
/// ```
pub fn create_pool(options: &ConnectOptions) -> DmResult<Pool> {
    create_pool_with_config(options, 16)
}

/// Create a connection pool holding at most `max_size` connections.
pub fn create_pool_with_config(options: &ConnectOptions, max_size: usize) -> DmResult<Pool> {
    let pg_config = options.to_pg_config()?;
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, manager_config);
    Pool::builder(mgr)
        .max_size(max_size)
        .build()
        .map_err(|e| DmError::Pool(e.to_string()))
}

/// A pooled connection checked out by [`DataManager::from_pool`].
///
/// Fast recycling does not reset session state, so a connection dropped while a
/// transaction begun through the manager is still open is removed from the pool
/// and closed (the server rolls the transaction back) instead of being reused.
pub struct PooledClient {
    client: Option<Object>,
    transaction_open: AtomicBool,
}

impl PooledClient {
    pub fn new(client: deadpool_postgres::Client) -> Self {
        Self {
            client: Some(client),
            transaction_open: AtomicBool::new(false),
        }
    }

    /// The checked-out pool object.
    pub fn get_ref(&self) -> DmResult<&deadpool_postgres::Client> {
        self.client
            .as_ref()
            .ok_or_else(|| DmError::Pool("pooled connection was already released".into()))
    }

    pub fn transaction_open(&self) -> bool {
        self.transaction_open.load(Ordering::Acquire)
    }
}

impl GenericClient for PooledClient {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DmResult<Vec<Row>> {
        GenericClient::query(self.get_ref()?, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DmResult<u64> {
        GenericClient::execute(self.get_ref()?, sql, params).await
    }

    fn set_transaction_open(&self, open: bool) {
        self.transaction_open.store(open, Ordering::Release);
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if !self.transaction_open() {
            return;
        }
        if let Some(client) = self.client.take() {
            tracing::warn!(
                target: "pgdm",
                "pooled connection dropped inside a transaction; discarding it"
            );
            drop(Object::take(client));
        }
    }
}

impl DataManager<PooledClient> {
    /// Check a connection out of `pool`; it returns to the pool when the manager drops.
    pub async fn from_pool(pool: &Pool) -> DmResult<Self> {
        Ok(Self::new(PooledClient::new(pool.get().await?)))
    }

    pub async fn from_pool_with_config(pool: &Pool, config: DmConfig) -> DmResult<Self> {
        Ok(Self::with_config(PooledClient::new(pool.get().await?), config))
    }
}
