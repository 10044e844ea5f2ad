//! Lock sets held by one saga.
//!
//! A booking step usually needs more than one reservation (a flight and a
//! seat class, a hotel and a room type). [`SagaLocks`] takes them all or
//! none and gives the saga's compensation path a single call to drop them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use inventory_lock_core::error::LockResult;
use inventory_lock_core::lock::{InventoryLock, ResourceType};
use inventory_lock_core::request::LockRequest;
use inventory_lock_core::traits::LockBackend;

use crate::manager::LockManager;

/// Lease for ordinary reservations.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Lease for reservations held across a saga.
pub const SAGA_LOCK_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Lease for reservations held while a payment completes.
pub const PAYMENT_LOCK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// One reservation within a saga's lock set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSpec {
    pub resource: String,
    pub resource_type: ResourceType,
    pub quantity: u32,
}

impl LockSpec {
    pub fn new(resource: impl Into<String>, resource_type: ResourceType, quantity: u32) -> Self {
        Self {
            resource: resource.into(),
            resource_type,
            quantity,
        }
    }

    /// Seats on a flight as a whole: `flight:{id}`.
    pub fn flight(flight_id: &str, passengers: u32) -> Self {
        Self::new(format!("flight:{flight_id}"), ResourceType::Flight, passengers)
    }

    /// Seats of one class: `flight:{id}:seats:{class}`.
    pub fn flight_seats(flight_id: &str, seat_class: &str, passengers: u32) -> Self {
        Self::new(
            format!("flight:{flight_id}:seats:{seat_class}"),
            ResourceType::Seat,
            passengers,
        )
    }

    /// Rooms of a hotel as a whole: `hotel:{id}`.
    pub fn hotel(hotel_id: &str, rooms: u32) -> Self {
        Self::new(format!("hotel:{hotel_id}"), ResourceType::Hotel, rooms)
    }

    /// Rooms of one type: `hotel:{id}:rooms:{type}`.
    pub fn hotel_rooms(hotel_id: &str, room_type: &str, rooms: u32) -> Self {
        Self::new(
            format!("hotel:{hotel_id}:rooms:{room_type}"),
            ResourceType::Room,
            rooms,
        )
    }
}

/// Saga-scoped operations over a shared [`LockManager`]. The saga id is the
/// lock owner.
pub struct SagaLocks<B: LockBackend> {
    manager: Arc<LockManager<B>>,
    timeout: Duration,
}

impl<B: LockBackend> SagaLocks<B> {
    pub fn new(manager: Arc<LockManager<B>>) -> Self {
        Self {
            manager,
            timeout: SAGA_LOCK_TIMEOUT,
        }
    }

    /// Lease used for every lock taken by [`acquire_all`](Self::acquire_all).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn manager(&self) -> &Arc<LockManager<B>> {
        &self.manager
    }

    /// Acquires every [`LockSpec`] in order, or none of them.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(locks))` - All reservations held, in the order given
    /// * `Ok(None)` - Some resource lacked capacity; earlier locks were released
    /// * `Err(...)` - Backend fault; earlier locks were released where possible
    #[instrument(skip(self, specs), fields(backend = self.manager.backend().name(), locks = specs.len()))]
    pub async fn acquire_all(
        &self,
        saga_id: &str,
        specs: &[LockSpec],
    ) -> LockResult<Option<Vec<InventoryLock>>> {
        let mut held: Vec<InventoryLock> = Vec::with_capacity(specs.len());

        for spec in specs {
            let request = LockRequest::new(
                spec.resource.clone(),
                spec.resource_type.clone(),
                saga_id,
                self.timeout,
            )
            .quantity(spec.quantity);

            match self.manager.acquire(request).await {
                Ok(Some(lock)) => held.push(lock),
                Ok(None) => {
                    warn!(resource = %spec.resource, resource_type = %spec.resource_type, "reservation refused, rolling back saga locks");
                    self.roll_back(saga_id, &held).await;
                    return Ok(None);
                }
                Err(e) => {
                    self.roll_back(saga_id, &held).await;
                    return Err(e);
                }
            }
        }

        info!(acquired = held.len(), "saga locks acquired");
        Ok(Some(held))
    }

    /// Extends every active lock of the saga. `true` only if all of them
    /// were extended.
    #[instrument(skip(self), fields(backend = self.manager.backend().name()))]
    pub async fn extend_all(&self, saga_id: &str, additional: Duration) -> LockResult<bool> {
        let locks = self.manager.get_locks_by_owner(saga_id).await?;
        let mut extended = 0usize;
        for lock in &locks {
            if self
                .manager
                .extend_lock(&lock.lock_id, saga_id, additional)
                .await?
            {
                extended += 1;
            } else {
                warn!(lock_id = %lock.lock_id, "saga lock could not be extended");
            }
        }
        info!(extended, total = locks.len(), "extended saga locks");
        Ok(extended == locks.len())
    }

    /// Whether the saga still holds at least one active lock.
    pub async fn validate_active(&self, saga_id: &str) -> LockResult<bool> {
        Ok(!self.manager.get_locks_by_owner(saga_id).await?.is_empty())
    }

    /// Releases everything the saga holds. Safe to repeat; later calls
    /// return 0.
    pub async fn compensate(&self, saga_id: &str) -> LockResult<u64> {
        let released = self.manager.release_all_locks_by_owner(saga_id).await?;
        info!(saga_id, released, "compensated saga locks");
        Ok(released)
    }

    async fn roll_back(&self, saga_id: &str, held: &[InventoryLock]) {
        for lock in held.iter().rev() {
            match self.manager.release_lock(&lock.lock_id, saga_id).await {
                Ok(true) => {}
                Ok(false) => warn!(lock_id = %lock.lock_id, "saga lock already gone during rollback"),
                Err(e) => {
                    warn!(lock_id = %lock.lock_id, error = %e, "rollback release failed, lock will lapse at expiry")
                }
            }
        }
    }
}
