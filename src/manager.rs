//! Lock manager façade.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, instrument};

use inventory_lock_core::error::{LockError, LockResult};
use inventory_lock_core::lock::{InventoryLock, ResourceType};
use inventory_lock_core::request::LockRequest;
use inventory_lock_core::stats::LockStatistics;
use inventory_lock_core::traits::LockBackend;

use crate::any_backend::AnyLockBackend;
use crate::config::ManagerConfig;
use crate::saga::DEFAULT_LOCK_TIMEOUT;

/// Distributed inventory lock manager.
///
/// Validates arguments, delegates to one backend chosen at construction and
/// applies the active-lock filters shared by all backends. It keeps no
/// state of its own, so one instance can be shared behind an `Arc`.
///
/// Refusals are values (`None`, `false`, `0`). Backend faults are logged
/// here with the operation context and returned unchanged.
pub struct LockManager<B: LockBackend> {
    backend: B,
    default_timeout: Duration,
    owner_service: Option<String>,
}

impl<B: LockBackend> LockManager<B> {
    /// Lease used by [`acquire_one`](Self::acquire_one) unless configured.
    pub const DEFAULT_TIMEOUT: Duration = DEFAULT_LOCK_TIMEOUT;

    pub fn new(backend: B) -> Self {
        Self {
            backend,
            default_timeout: Self::DEFAULT_TIMEOUT,
            owner_service: None,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Service name stamped on requests that do not carry one.
    pub fn with_owner_service(mut self, service: impl Into<String>) -> Self {
        self.owner_service = Some(service.into());
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn capacity_for(&self, resource_type: &ResourceType) -> u32 {
        self.backend.capacities().capacity_for(resource_type)
    }

    /// Reserves `quantity` units of a resource for `owner`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(lock))` - ACQUIRED lock expiring `timeout` from now
    /// * `Ok(None)` - Not enough capacity left
    /// * `Err(LockError::InvalidArgument)` - `quantity == 0`, zero timeout or empty names
    /// * `Err(...)` - Backend fault; retry with a fresh request
    pub async fn acquire_lock(
        &self,
        resource: &str,
        resource_type: ResourceType,
        owner: &str,
        timeout: Duration,
        quantity: u32,
    ) -> LockResult<Option<InventoryLock>> {
        self.acquire(LockRequest::new(resource, resource_type, owner, timeout).quantity(quantity))
            .await
    }

    /// Reserves a single unit with the default timeout.
    pub async fn acquire_one(
        &self,
        resource: &str,
        resource_type: ResourceType,
        owner: &str,
    ) -> LockResult<Option<InventoryLock>> {
        self.acquire_lock(resource, resource_type, owner, self.default_timeout, 1)
            .await
    }

    /// Acquires with a fully specified request.
    #[instrument(skip(self, request), fields(backend = self.backend.name(), resource = %request.resource, resource_type = %request.resource_type, owner = %request.owner, quantity = request.quantity))]
    pub async fn acquire(&self, mut request: LockRequest) -> LockResult<Option<InventoryLock>> {
        request.validate()?;
        if request.owner_service.is_none() {
            request.owner_service = self.owner_service.clone();
        }

        let acquired = self.backend.acquire(&request).await.inspect_err(|e| {
            error!(
                operation = "acquire_lock",
                resource = %request.resource,
                resource_type = %request.resource_type,
                owner = %request.owner,
                error = %e,
                "lock backend fault"
            )
        })?;
        if acquired.is_none() {
            debug!("capacity exhausted");
        }
        Ok(acquired)
    }

    /// Releases a lock held by `owner`. `false` if it is missing, expired,
    /// already released or held by someone else.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn release_lock(&self, lock_id: &str, owner: &str) -> LockResult<bool> {
        require_non_empty("lock_id", lock_id)?;
        require_non_empty("owner", owner)?;
        self.backend.release(lock_id, owner).await.inspect_err(|e| {
            error!(operation = "release_lock", lock_id, owner, error = %e, "lock backend fault")
        })
    }

    /// Pushes the expiry of an ACQUIRED lock forward by `additional`.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn extend_lock(
        &self,
        lock_id: &str,
        owner: &str,
        additional: Duration,
    ) -> LockResult<bool> {
        require_non_empty("lock_id", lock_id)?;
        require_non_empty("owner", owner)?;
        if additional.is_zero() {
            return Err(LockError::InvalidArgument(
                "additional time must be greater than zero".to_string(),
            ));
        }
        self.backend
            .extend(lock_id, owner, additional)
            .await
            .inspect_err(|e| {
                error!(operation = "extend_lock", lock_id, owner, error = %e, "lock backend fault")
            })
    }

    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn get_lock(&self, lock_id: &str) -> LockResult<Option<InventoryLock>> {
        require_non_empty("lock_id", lock_id)?;
        self.backend.get(lock_id).await.inspect_err(|e| {
            error!(operation = "get_lock", lock_id, error = %e, "lock backend fault")
        })
    }

    /// ACQUIRED, unexpired locks on one resource.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn get_locks_for_resource(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> LockResult<Vec<InventoryLock>> {
        require_non_empty("resource", resource)?;
        let mut locks = self
            .backend
            .locks_for_resource(resource, resource_type)
            .await
            .inspect_err(|e| {
                error!(operation = "get_locks_for_resource", resource, resource_type = %resource_type, error = %e, "lock backend fault")
            })?;
        let now = Utc::now();
        locks.retain(|lock| lock.is_active(now));
        Ok(locks)
    }

    /// ACQUIRED, unexpired locks held by `owner`.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn get_locks_by_owner(&self, owner: &str) -> LockResult<Vec<InventoryLock>> {
        require_non_empty("owner", owner)?;
        let mut locks = self.backend.locks_by_owner(owner).await.inspect_err(|e| {
            error!(operation = "get_locks_by_owner", owner, error = %e, "lock backend fault")
        })?;
        let now = Utc::now();
        locks.retain(|lock| lock.is_active(now));
        Ok(locks)
    }

    /// Whether at least `quantity` units are currently reserved. Advisory.
    /// `quantity == 0` always holds.
    pub async fn is_resource_locked(
        &self,
        resource: &str,
        resource_type: &ResourceType,
        quantity: u32,
    ) -> LockResult<bool> {
        let reserved = self.reserved(resource, resource_type).await?;
        Ok(reserved >= u64::from(quantity))
    }

    /// Whether `required` more units would fit right now. Advisory; only
    /// acquisition decides.
    pub async fn is_resource_available(
        &self,
        resource: &str,
        resource_type: &ResourceType,
        required: u32,
    ) -> LockResult<bool> {
        require_positive(required)?;
        let reserved = self.reserved(resource, resource_type).await?;
        let capacity = u64::from(self.capacity_for(resource_type));
        Ok(reserved + u64::from(required) <= capacity)
    }

    /// Quantity held by ACQUIRED, unexpired locks on one resource.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn reserved(&self, resource: &str, resource_type: &ResourceType) -> LockResult<u64> {
        require_non_empty("resource", resource)?;
        self.backend
            .reserved_quantity(resource, resource_type)
            .await
            .inspect_err(|e| {
                error!(operation = "reserved_quantity", resource, resource_type = %resource_type, error = %e, "lock backend fault")
            })
    }

    /// Marks lapsed locks EXPIRED. Always 0 for backends with native expiry.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn cleanup_expired_locks(&self) -> LockResult<u64> {
        self.backend.cleanup_expired().await.inspect_err(|e| {
            error!(operation = "cleanup_expired_locks", error = %e, "lock backend fault")
        })
    }

    /// Releases every ACQUIRED lock of `owner`. A second call returns 0.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn release_all_locks_by_owner(&self, owner: &str) -> LockResult<u64> {
        require_non_empty("owner", owner)?;
        self.backend
            .release_all_by_owner(owner)
            .await
            .inspect_err(|e| {
                error!(operation = "release_all_locks_by_owner", owner, error = %e, "lock backend fault")
            })
    }

    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn get_lock_statistics(&self) -> LockResult<LockStatistics> {
        self.backend.statistics().await.inspect_err(|e| {
            error!(operation = "get_lock_statistics", error = %e, "lock backend fault")
        })
    }
}

impl LockManager<AnyLockBackend> {
    /// Connects the configured backend and applies the configured defaults.
    pub async fn from_config(config: &ManagerConfig) -> LockResult<Self> {
        let backend = AnyLockBackend::from_config(config).await?;
        let mut manager = Self::new(backend).with_default_timeout(config.default_timeout());
        if let Some(service) = &config.owner_service {
            manager = manager.with_owner_service(service.clone());
        }
        Ok(manager)
    }
}

fn require_non_empty(name: &str, value: &str) -> LockResult<()> {
    if value.is_empty() {
        return Err(LockError::InvalidArgument(format!("{name} cannot be empty")));
    }
    Ok(())
}

fn require_positive(quantity: u32) -> LockResult<()> {
    if quantity == 0 {
        return Err(LockError::InvalidArgument(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}
