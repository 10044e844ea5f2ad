//! Redis implementation of [`LockBackend`].

use std::time::Duration;

use chrono::Utc;
use fred::prelude::*;
use fred::types::CustomCommand;
use tracing::{debug, info, instrument, warn};

use inventory_lock_core::capacity::CapacityTable;
use inventory_lock_core::error::{LockError, LockResult};
use inventory_lock_core::lock::{InventoryLock, LockStatus, ResourceType};
use inventory_lock_core::request::LockRequest;
use inventory_lock_core::stats::LockStatistics;
use inventory_lock_core::traits::LockBackend;

use crate::keys::RedisKeys;
use crate::provider::RedisLockBackendBuilder;
use crate::record::{LockRecord, decode_pairs, duration_millis};
use crate::scripts;

/// Cache-backed lock backend.
///
/// Lock keys carry a TTL equal to the lease, so expiry needs no sweep and
/// [`cleanup_expired`](LockBackend::cleanup_expired) always returns 0. Owner
/// sets may keep members whose lock key already expired; every read and
/// release skips them.
pub struct RedisLockBackend {
    client: RedisClient,
    keys: RedisKeys,
    capacities: CapacityTable,
}

impl RedisLockBackend {
    pub(crate) fn new(client: RedisClient, keys: RedisKeys, capacities: CapacityTable) -> Self {
        Self {
            client,
            keys,
            capacities,
        }
    }

    /// Returns a new builder for configuring the backend.
    pub fn builder() -> RedisLockBackendBuilder {
        RedisLockBackendBuilder::new()
    }

    /// Creates a backend for the given Redis URL with default capacities.
    pub async fn connect(url: impl Into<String>) -> LockResult<Self> {
        Self::builder().url(url).build().await
    }

    /// Key layout used by this backend.
    pub fn keys(&self) -> &RedisKeys {
        &self.keys
    }

    /// Runs one script as a single `EVAL`.
    async fn eval(
        &self,
        operation: &'static str,
        script: &'static str,
        keys: &[&str],
        argv: Vec<RedisValue>,
    ) -> LockResult<RedisValue> {
        let mut args: Vec<RedisValue> = Vec::with_capacity(2 + keys.len() + argv.len());
        args.push(script.into());
        args.push((keys.len() as i64).into());
        args.extend(keys.iter().map(|key| RedisValue::from(*key)));
        args.extend(argv);

        let cmd = CustomCommand::new_static("EVAL", None, false);
        self.client.custom(cmd, args).await.map_err(|e| {
            LockError::Backend(Box::new(std::io::Error::other(format!(
                "Redis EVAL ({}) failed: {}",
                operation, e
            ))))
        })
    }

    async fn eval_integer(
        &self,
        operation: &'static str,
        script: &'static str,
        keys: &[&str],
        argv: Vec<RedisValue>,
    ) -> LockResult<i64> {
        let reply = self.eval(operation, script, keys, argv).await?;
        reply.as_i64().ok_or_else(|| {
            LockError::Backend(Box::new(std::io::Error::other(format!(
                "Redis EVAL ({}) returned a non-integer reply: {:?}",
                operation, reply
            ))))
        })
    }

    async fn fetch_by_pattern(&self, pattern: String) -> LockResult<Vec<InventoryLock>> {
        let reply = self
            .eval(
                "fetch_by_pattern",
                scripts::FETCH_BY_PATTERN,
                &[],
                vec![pattern.into()],
            )
            .await?;
        decode_pairs(reply, Utc::now())
    }
}

impl LockBackend for RedisLockBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn capacities(&self) -> &CapacityTable {
        &self.capacities
    }

    #[instrument(skip(self, request), fields(backend = "redis", resource = %request.resource, resource_type = %request.resource_type, owner = %request.owner, quantity = request.quantity))]
    async fn acquire(&self, request: &LockRequest) -> LockResult<Option<InventoryLock>> {
        let mut lock = InventoryLock::pending(request, Utc::now());
        let record = LockRecord::from_lock(&lock).to_json()?;

        let lock_key = self
            .keys
            .lock_key(&lock.resource_type, &lock.resource, &lock.lock_id);
        let owner_key = self.keys.owner_key(&lock.owner);
        let ledger_key = self.keys.ledger_key(&lock.resource_type, &lock.resource);
        let capacity = self.capacities.capacity_for(&lock.resource_type);

        let outcome = self
            .eval_integer(
                "acquire",
                scripts::ACQUIRE,
                &[lock_key.as_str(), owner_key.as_str(), ledger_key.as_str()],
                vec![
                    record.into(),
                    duration_millis(request.timeout).into(),
                    i64::from(request.quantity).into(),
                    i64::from(capacity).into(),
                    RedisKeys::ledger_member(request.quantity, &lock.lock_id).into(),
                ],
            )
            .await?;

        match outcome {
            1 => {
                lock.transition(LockStatus::Acquired);
                info!(lock_id = %lock.lock_id, "acquired Redis lock");
                Ok(Some(lock))
            }
            0 => {
                debug!(capacity, "resource not available");
                Ok(None)
            }
            _ => {
                warn!(lock_id = %lock.lock_id, "lock key already present, refusing acquisition");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn release(&self, lock_id: &str, owner: &str) -> LockResult<bool> {
        let owner_key = self.keys.owner_key(owner);
        let released = self
            .eval_integer(
                "release",
                scripts::RELEASE,
                &[owner_key.as_str()],
                vec![
                    lock_id.into(),
                    owner.into(),
                    self.keys.lock_prefix().into(),
                    self.keys.ledger_prefix().into(),
                ],
            )
            .await?
            == 1;

        if released {
            info!("released Redis lock");
        } else {
            warn!("lock not found, expired or not owned by caller");
        }
        Ok(released)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn extend(&self, lock_id: &str, owner: &str, additional: Duration) -> LockResult<bool> {
        let owner_key = self.keys.owner_key(owner);
        let new_ttl_ms = self
            .eval_integer(
                "extend",
                scripts::EXTEND,
                &[owner_key.as_str()],
                vec![
                    lock_id.into(),
                    owner.into(),
                    duration_millis(additional).into(),
                    self.keys.lock_prefix().into(),
                    self.keys.ledger_prefix().into(),
                ],
            )
            .await?;

        if new_ttl_ms > 0 {
            info!(new_ttl_ms, "extended Redis lock");
            Ok(true)
        } else {
            warn!("lock not found, expired or not owned by caller");
            Ok(false)
        }
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn get(&self, lock_id: &str) -> LockResult<Option<InventoryLock>> {
        let mut locks = self.fetch_by_pattern(self.keys.lock_id_pattern(lock_id)).await?;
        locks.retain(|lock| lock.lock_id == lock_id);
        Ok(locks.pop())
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn locks_for_resource(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> LockResult<Vec<InventoryLock>> {
        let mut locks = self
            .fetch_by_pattern(self.keys.resource_pattern(resource_type, resource))
            .await?;
        locks.retain(|lock| lock.resource == resource && &lock.resource_type == resource_type);
        Ok(locks)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn locks_by_owner(&self, owner: &str) -> LockResult<Vec<InventoryLock>> {
        let owner_key = self.keys.owner_key(owner);
        let reply = self
            .eval("fetch_by_owner", scripts::FETCH_BY_OWNER, &[owner_key.as_str()], vec![])
            .await?;
        let mut locks = decode_pairs(reply, Utc::now())?;
        locks.retain(|lock| lock.owner == owner);
        Ok(locks)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn reserved_quantity(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> LockResult<u64> {
        let ledger_key = self.keys.ledger_key(resource_type, resource);
        let reserved = self
            .eval_integer("reserved", scripts::RESERVED, &[ledger_key.as_str()], vec![])
            .await?;
        Ok(reserved.max(0) as u64)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn cleanup_expired(&self) -> LockResult<u64> {
        debug!("Redis TTL expires locks natively, nothing to sweep");
        Ok(0)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn release_all_by_owner(&self, owner: &str) -> LockResult<u64> {
        let owner_key = self.keys.owner_key(owner);
        let released = self
            .eval_integer(
                "release_all",
                scripts::RELEASE_ALL,
                &[owner_key.as_str()],
                vec![
                    owner.into(),
                    self.keys.lock_prefix().into(),
                    self.keys.ledger_prefix().into(),
                ],
            )
            .await?
            .max(0) as u64;

        if released > 0 {
            info!(released, "released Redis locks for owner");
        }
        Ok(released)
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn statistics(&self) -> LockResult<LockStatistics> {
        let locks = self.fetch_by_pattern(self.keys.all_locks_pattern()).await?;
        // Expired keys are gone from Redis, so there is nothing to count.
        Ok(LockStatistics::from_locks(&locks, 0, Utc::now()))
    }
}
