//! Backend chosen at startup from configuration.

use std::time::Duration;

use inventory_lock_core::capacity::CapacityTable;
use inventory_lock_core::error::LockResult;
use inventory_lock_core::lock::{InventoryLock, ResourceType};
use inventory_lock_core::request::LockRequest;
use inventory_lock_core::stats::LockStatistics;
use inventory_lock_core::traits::LockBackend;
use inventory_lock_postgres::PostgresLockBackend;
use inventory_lock_redis::RedisLockBackend;
use tracing::info;

use crate::config::{ManagerConfig, Provider};

/// Either shipped backend behind one concrete type.
pub enum AnyLockBackend {
    Redis(RedisLockBackend),
    Postgres(PostgresLockBackend),
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            AnyLockBackend::Redis($backend) => $call,
            AnyLockBackend::Postgres($backend) => $call,
        }
    };
}

impl AnyLockBackend {
    /// Connects the backend named by `config.provider`. The store backend
    /// creates its table if it is missing.
    pub async fn from_config(config: &ManagerConfig) -> LockResult<Self> {
        config.validate()?;
        let capacities = config.capacity_table();
        let backend = match config.provider {
            Provider::Cache => {
                let mut builder = RedisLockBackend::builder().capacities(capacities);
                if let Some(url) = &config.redis_url {
                    builder = builder.url(url.clone());
                }
                if let Some(prefix) = &config.key_prefix {
                    builder = builder.key_prefix(prefix.clone());
                }
                Self::Redis(builder.build().await?)
            }
            Provider::Store => {
                let mut builder = PostgresLockBackend::builder()
                    .capacities(capacities)
                    .max_connections(config.max_connections)
                    .create_schema(true);
                if let Some(url) = &config.postgres_url {
                    builder = builder.connection_string(url.clone());
                }
                Self::Postgres(builder.build().await?)
            }
        };
        info!(provider = %config.provider, backend = backend.name(), "lock backend ready");
        Ok(backend)
    }
}

impl From<RedisLockBackend> for AnyLockBackend {
    fn from(backend: RedisLockBackend) -> Self {
        Self::Redis(backend)
    }
}

impl From<PostgresLockBackend> for AnyLockBackend {
    fn from(backend: PostgresLockBackend) -> Self {
        Self::Postgres(backend)
    }
}

impl LockBackend for AnyLockBackend {
    fn name(&self) -> &'static str {
        dispatch!(self, b => b.name())
    }

    fn capacities(&self) -> &CapacityTable {
        dispatch!(self, b => b.capacities())
    }

    async fn acquire(&self, request: &LockRequest) -> LockResult<Option<InventoryLock>> {
        dispatch!(self, b => b.acquire(request).await)
    }

    async fn release(&self, lock_id: &str, owner: &str) -> LockResult<bool> {
        dispatch!(self, b => b.release(lock_id, owner).await)
    }

    async fn extend(&self, lock_id: &str, owner: &str, additional: Duration) -> LockResult<bool> {
        dispatch!(self, b => b.extend(lock_id, owner, additional).await)
    }

    async fn get(&self, lock_id: &str) -> LockResult<Option<InventoryLock>> {
        dispatch!(self, b => b.get(lock_id).await)
    }

    async fn locks_for_resource(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> LockResult<Vec<InventoryLock>> {
        dispatch!(self, b => b.locks_for_resource(resource, resource_type).await)
    }

    async fn locks_by_owner(&self, owner: &str) -> LockResult<Vec<InventoryLock>> {
        dispatch!(self, b => b.locks_by_owner(owner).await)
    }

    async fn reserved_quantity(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> LockResult<u64> {
        dispatch!(self, b => b.reserved_quantity(resource, resource_type).await)
    }

    async fn cleanup_expired(&self) -> LockResult<u64> {
        dispatch!(self, b => b.cleanup_expired().await)
    }

    async fn release_all_by_owner(&self, owner: &str) -> LockResult<u64> {
        dispatch!(self, b => b.release_all_by_owner(owner).await)
    }

    async fn statistics(&self) -> LockResult<LockStatistics> {
        dispatch!(self, b => b.statistics().await)
    }
}
