//! Core trait for inventory lock backends.

use std::future::Future;
use std::time::Duration;

use crate::capacity::CapacityTable;
use crate::error::LockResult;
use crate::lock::{InventoryLock, ResourceType};
use crate::request::LockRequest;
use crate::stats::LockStatistics;

// ============================================================================
// Lock Backend Trait
// ============================================================================

/// Storage strategy behind the lock manager.
///
/// Each backend must keep, for every `(resource, resource_type)`, the sum of
/// `quantity` over ACQUIRED, unexpired locks at or below the capacity from
/// its [`CapacityTable`], even under concurrent acquisition from many
/// processes. The check and the write of an acquisition therefore happen in
/// one atomic unit of the backing store (a script, a transaction).
///
/// Expected refusals are values: `Ok(None)`, `Ok(false)`, `Ok(0)`. `Err` is
/// reserved for faults of the backing store.
///
/// # Example
///
/// ```rust,ignore
/// async fn hold_two_seats(backend: &impl LockBackend) -> LockResult<()> {
///     let request = LockRequest::new("VN123", ResourceType::Flight, "saga-7", Duration::from_secs(900))
///         .quantity(2);
///     match backend.acquire(&request).await? {
///         Some(lock) => println!("holding {}", lock.lock_id),
///         None => println!("sold out"),
///     }
///     Ok(())
/// }
/// ```
pub trait LockBackend: Send + Sync {
    /// Short backend name used in logs ("redis", "postgres", ...).
    fn name(&self) -> &'static str;

    /// Capacity ceilings this backend enforces.
    fn capacities(&self) -> &CapacityTable;

    /// Atomically checks remaining capacity and, if enough is left, stores an
    /// ACQUIRED lock expiring `request.timeout` from now.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(lock))` - Reservation committed
    /// * `Ok(None)` - Not enough capacity left
    /// * `Err(...)` - Backend fault; the reservation may or may not exist
    fn acquire(
        &self,
        request: &LockRequest,
    ) -> impl Future<Output = LockResult<Option<InventoryLock>>> + Send;

    /// Marks the lock RELEASED if it is ACQUIRED, unexpired and owned by
    /// `owner`. Returns `Ok(false)` otherwise.
    fn release(&self, lock_id: &str, owner: &str) -> impl Future<Output = LockResult<bool>> + Send;

    /// Moves `expires_at` forward by `additional` on an ACQUIRED, unexpired
    /// lock owned by `owner`.
    fn extend(
        &self,
        lock_id: &str,
        owner: &str,
        additional: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Looks a lock up by id.
    fn get(&self, lock_id: &str) -> impl Future<Output = LockResult<Option<InventoryLock>>> + Send;

    /// Active locks on one resource.
    fn locks_for_resource(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> impl Future<Output = LockResult<Vec<InventoryLock>>> + Send;

    /// Active locks held by one owner.
    fn locks_by_owner(&self, owner: &str) -> impl Future<Output = LockResult<Vec<InventoryLock>>> + Send;

    /// Quantity currently held by active locks on one resource.
    fn reserved_quantity(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> impl Future<Output = LockResult<u64>> + Send;

    /// Marks ACQUIRED locks past their expiry as EXPIRED and returns how many
    /// changed. Backends whose storage expires entries natively return 0.
    fn cleanup_expired(&self) -> impl Future<Output = LockResult<u64>> + Send;

    /// Releases every active lock of `owner`, returning the count released.
    fn release_all_by_owner(&self, owner: &str) -> impl Future<Output = LockResult<u64>> + Send;

    /// Monitoring snapshot.
    fn statistics(&self) -> impl Future<Output = LockResult<LockStatistics>> + Send;
}
