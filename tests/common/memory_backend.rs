//! In-memory backend for exercising the manager without a server.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use inventory_lock::lock::expiry_after;
use inventory_lock::{
    CapacityTable, InventoryLock, LockBackend, LockError, LockRequest, LockResult, LockStatistics,
    LockStatus, ResourceType,
};

/// Mock backend holding locks in a map behind one mutex, which makes every
/// operation atomic. Faults can be injected for all calls or for
/// acquisitions of one resource.
pub struct MemoryLockBackend {
    capacities: CapacityTable,
    locks: Mutex<HashMap<String, InventoryLock>>,
    failing: AtomicBool,
    failing_resource: Mutex<Option<String>>,
}

impl MemoryLockBackend {
    pub fn new(capacities: CapacityTable) -> Self {
        Self {
            capacities,
            locks: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            failing_resource: Mutex::new(None),
        }
    }

    /// Makes every call fail with a backend fault.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes acquisitions of `resource` fail with a backend fault.
    pub fn fail_acquisitions_of(&self, resource: &str) {
        *self.failing_resource.lock().unwrap() = Some(resource.to_string());
    }

    /// Stored status of a lock, including terminal ones.
    pub fn status_of(&self, lock_id: &str) -> Option<LockStatus> {
        self.locks.lock().unwrap().get(lock_id).map(|lock| lock.status)
    }

    fn check(&self) -> LockResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LockError::backend(std::io::Error::other("injected fault")));
        }
        Ok(())
    }

    fn held(locks: &HashMap<String, InventoryLock>, resource: &str, resource_type: &ResourceType) -> u64 {
        let now = Utc::now();
        locks
            .values()
            .filter(|lock| {
                lock.resource == resource && &lock.resource_type == resource_type && lock.is_active(now)
            })
            .map(|lock| u64::from(lock.quantity))
            .sum()
    }
}

impl Default for MemoryLockBackend {
    fn default() -> Self {
        Self::new(CapacityTable::default())
    }
}

impl LockBackend for MemoryLockBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capacities(&self) -> &CapacityTable {
        &self.capacities
    }

    async fn acquire(&self, request: &LockRequest) -> LockResult<Option<InventoryLock>> {
        self.check()?;
        if self.failing_resource.lock().unwrap().as_deref() == Some(request.resource.as_str()) {
            return Err(LockError::connection(std::io::Error::other(
                "injected acquisition fault",
            )));
        }

        let mut locks = self.locks.lock().unwrap();
        let held = Self::held(&locks, &request.resource, &request.resource_type);
        let capacity = u64::from(self.capacities.capacity_for(&request.resource_type));
        if held + u64::from(request.quantity) > capacity {
            return Ok(None);
        }

        let mut lock = InventoryLock::pending(request, Utc::now());
        lock.transition(LockStatus::Acquired);
        locks.insert(lock.lock_id.clone(), lock.clone());
        Ok(Some(lock))
    }

    async fn release(&self, lock_id: &str, owner: &str) -> LockResult<bool> {
        self.check()?;
        let now = Utc::now();
        let mut locks = self.locks.lock().unwrap();
        match locks.get_mut(lock_id) {
            Some(lock) if lock.owner == owner && lock.is_active(now) => {
                Ok(lock.transition(LockStatus::Released))
            }
            _ => Ok(false),
        }
    }

    async fn extend(&self, lock_id: &str, owner: &str, additional: Duration) -> LockResult<bool> {
        self.check()?;
        let now = Utc::now();
        let mut locks = self.locks.lock().unwrap();
        match locks.get_mut(lock_id) {
            Some(lock) if lock.owner == owner && lock.is_active(now) => {
                lock.expires_at = expiry_after(lock.expires_at, additional);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, lock_id: &str) -> LockResult<Option<InventoryLock>> {
        self.check()?;
        Ok(self.locks.lock().unwrap().get(lock_id).cloned())
    }

    async fn locks_for_resource(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> LockResult<Vec<InventoryLock>> {
        self.check()?;
        // Returns stale entries too; the manager filters them.
        Ok(self
            .locks
            .lock()
            .unwrap()
            .values()
            .filter(|lock| lock.resource == resource && &lock.resource_type == resource_type)
            .cloned()
            .collect())
    }

    async fn locks_by_owner(&self, owner: &str) -> LockResult<Vec<InventoryLock>> {
        self.check()?;
        Ok(self
            .locks
            .lock()
            .unwrap()
            .values()
            .filter(|lock| lock.owner == owner)
            .cloned()
            .collect())
    }

    async fn reserved_quantity(
        &self,
        resource: &str,
        resource_type: &ResourceType,
    ) -> LockResult<u64> {
        self.check()?;
        Ok(Self::held(&self.locks.lock().unwrap(), resource, resource_type))
    }

    async fn cleanup_expired(&self) -> LockResult<u64> {
        self.check()?;
        let now = Utc::now();
        let mut expired = 0;
        for lock in self.locks.lock().unwrap().values_mut() {
            if lock.status == LockStatus::Acquired
                && lock.expires_at <= now
                && lock.transition(LockStatus::Expired)
            {
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn release_all_by_owner(&self, owner: &str) -> LockResult<u64> {
        self.check()?;
        let now = Utc::now();
        let mut released = 0;
        for lock in self.locks.lock().unwrap().values_mut() {
            if lock.owner == owner && lock.is_active(now) && lock.transition(LockStatus::Released) {
                released += 1;
            }
        }
        Ok(released)
    }

    async fn statistics(&self) -> LockResult<LockStatistics> {
        self.check()?;
        let now = Utc::now();
        let locks = self.locks.lock().unwrap();
        let expired = locks.values().filter(|lock| lock.is_expired(now)).count() as u64;
        Ok(LockStatistics::from_locks(locks.values(), expired, now))
    }
}
