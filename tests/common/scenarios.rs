//! Backend-agnostic manager scenarios.
//!
//! Each scenario takes a `tag` that is mixed into resource and owner names so
//! runs against a shared server do not see each other's locks. Managers are
//! expected to use [`super::test_capacities`].

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use inventory_lock::{LockBackend, LockError, LockManager, LockStatus, ResourceType};

/// Unique tag for one scenario run.
pub fn unique_tag() -> String {
    inventory_lock::InventoryLock::generate_lock_id()
}

/// Hotel capacity 100: 60 held, 50 refused, release, 50 granted.
pub async fn hotel_capacity_scenario<B: LockBackend>(manager: &LockManager<B>, tag: &str) {
    let hotel = format!("HTL-42-{tag}");
    let saga_1 = format!("saga-1-{tag}");
    let saga_2 = format!("saga-2-{tag}");
    let timeout = Duration::from_secs(60);

    let first = manager
        .acquire_lock(&hotel, ResourceType::Hotel, &saga_1, timeout, 60)
        .await
        .unwrap()
        .expect("60 of 100 should fit");
    assert_eq!(first.status, LockStatus::Acquired);
    assert_eq!(first.quantity, 60);

    let refused = manager
        .acquire_lock(&hotel, ResourceType::Hotel, &saga_2, timeout, 50)
        .await
        .unwrap();
    assert!(refused.is_none(), "only 40 remain");
    assert!(
        !manager
            .is_resource_available(&hotel, &ResourceType::Hotel, 50)
            .await
            .unwrap()
    );
    assert!(
        manager
            .is_resource_locked(&hotel, &ResourceType::Hotel, 60)
            .await
            .unwrap()
    );

    assert!(manager.release_lock(&first.lock_id, &saga_1).await.unwrap());

    let second = manager
        .acquire_lock(&hotel, ResourceType::Hotel, &saga_2, timeout, 50)
        .await
        .unwrap();
    assert!(second.is_some(), "50 of 100 should fit after release");
    assert_eq!(
        manager.reserved(&hotel, &ResourceType::Hotel).await.unwrap(),
        50
    );
    assert!(
        manager
            .is_resource_available(&hotel, &ResourceType::Hotel, 50)
            .await
            .unwrap()
    );
    assert!(manager.get_locks_by_owner(&saga_1).await.unwrap().is_empty());
    assert_eq!(manager.get_locks_by_owner(&saga_2).await.unwrap().len(), 1);
}

/// Flight capacity 2: a 1-second lease frees its seats without any sweep.
pub async fn lease_expiry_scenario<B: LockBackend>(manager: &LockManager<B>, tag: &str) {
    let flight = format!("VN123-{tag}");
    let saga_3 = format!("saga-3-{tag}");

    let lock = manager
        .acquire_lock(&flight, ResourceType::Flight, &saga_3, Duration::from_secs(1), 2)
        .await
        .unwrap();
    assert!(lock.is_some());
    assert!(
        !manager
            .is_resource_available(&flight, &ResourceType::Flight, 2)
            .await
            .unwrap()
    );
    assert!(
        manager
            .acquire_lock(&flight, ResourceType::Flight, "other", Duration::from_secs(60), 1)
            .await
            .unwrap()
            .is_none()
    );

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(
        manager
            .is_resource_available(&flight, &ResourceType::Flight, 2)
            .await
            .unwrap()
    );
    assert!(manager.get_locks_by_owner(&saga_3).await.unwrap().is_empty());
    assert!(
        manager
            .get_locks_for_resource(&flight, &ResourceType::Flight)
            .await
            .unwrap()
            .is_empty()
    );
    let again = manager
        .acquire_lock(&flight, ResourceType::Flight, &saga_3, Duration::from_secs(60), 2)
        .await
        .unwrap();
    assert!(again.is_some(), "expired seats should be acquirable again");
}

/// Another owner can neither release nor extend a lock.
pub async fn owner_isolation_scenario<B: LockBackend>(manager: &LockManager<B>, tag: &str) {
    let room = format!("hotel:9:rooms:DLX-{tag}");
    let owner_a = format!("saga-a-{tag}");
    let owner_b = format!("saga-b-{tag}");

    let lock = manager
        .acquire_lock(&room, ResourceType::Room, &owner_a, Duration::from_secs(60), 2)
        .await
        .unwrap()
        .unwrap();

    assert!(!manager.release_lock(&lock.lock_id, &owner_b).await.unwrap());
    assert!(
        !manager
            .extend_lock(&lock.lock_id, &owner_b, Duration::from_secs(30))
            .await
            .unwrap()
    );
    assert_eq!(manager.release_all_locks_by_owner(&owner_b).await.unwrap(), 0);

    let still_held = manager.get_locks_by_owner(&owner_a).await.unwrap();
    assert_eq!(still_held.len(), 1);
    assert_eq!(still_held[0].lock_id, lock.lock_id);
    assert_eq!(still_held[0].owner, owner_a);
    assert!(still_held[0].expires_at <= lock.expires_at + TimeDelta::seconds(1));
    assert_eq!(
        manager.reserved(&room, &ResourceType::Room).await.unwrap(),
        2
    );
}

/// Releasing all of an owner's locks twice returns the count, then 0.
pub async fn compensation_scenario<B: LockBackend>(manager: &LockManager<B>, tag: &str) {
    let saga = format!("saga-comp-{tag}");
    let bystander = format!("saga-bystander-{tag}");
    let timeout = Duration::from_secs(60);

    for (resource, resource_type) in [
        (format!("flight:F1-{tag}"), ResourceType::Flight),
        (format!("flight:F1:seats:ECONOMY-{tag}"), ResourceType::Seat),
        (format!("hotel:H1-{tag}"), ResourceType::Hotel),
    ] {
        assert!(
            manager
                .acquire_lock(&resource, resource_type, &saga, timeout, 1)
                .await
                .unwrap()
                .is_some()
        );
    }
    let other = manager
        .acquire_lock(&format!("hotel:H1-{tag}"), ResourceType::Hotel, &bystander, timeout, 1)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(manager.release_all_locks_by_owner(&saga).await.unwrap(), 3);
    assert_eq!(manager.release_all_locks_by_owner(&saga).await.unwrap(), 0);
    assert!(manager.get_locks_by_owner(&saga).await.unwrap().is_empty());

    let remaining = manager.get_locks_by_owner(&bystander).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].lock_id, other.lock_id);
}

/// Extension moves expiry by `additional` (within `tolerance`) and fails
/// once the lock is released.
pub async fn extension_scenario<B: LockBackend>(
    manager: &LockManager<B>,
    tag: &str,
    tolerance: Duration,
) {
    let seat = format!("flight:VN9:seats:BUSINESS-{tag}");
    let saga = format!("saga-ext-{tag}");
    let additional = Duration::from_secs(30);

    let lock = manager
        .acquire_lock(&seat, ResourceType::Seat, &saga, Duration::from_secs(20), 1)
        .await
        .unwrap()
        .unwrap();
    let before = manager.get_lock(&lock.lock_id).await.unwrap().unwrap();

    assert!(manager.extend_lock(&lock.lock_id, &saga, additional).await.unwrap());

    let after = manager.get_lock(&lock.lock_id).await.unwrap().unwrap();
    let moved = after.expires_at - before.expires_at;
    let expected = TimeDelta::from_std(additional).unwrap();
    let slack = TimeDelta::from_std(tolerance).unwrap();
    assert!(
        (moved - expected).abs() <= slack,
        "expiry moved by {moved}, expected {expected}"
    );
    assert_eq!(after.status, LockStatus::Acquired);

    assert!(manager.release_lock(&lock.lock_id, &saga).await.unwrap());
    assert!(!manager.release_lock(&lock.lock_id, &saga).await.unwrap());
    assert!(
        !manager
            .extend_lock(&lock.lock_id, &saga, additional)
            .await
            .unwrap()
    );
}

/// `attempts` concurrent single-unit acquisitions of a room with capacity 5.
pub async fn concurrent_capacity_scenario<B: LockBackend + 'static>(
    manager: Arc<LockManager<B>>,
    tag: &str,
    attempts: usize,
) {
    let room = format!("hotel:7:rooms:STD-{tag}");
    let capacity = manager.capacity_for(&ResourceType::Room) as usize;
    assert!(attempts > capacity);

    let mut tasks = Vec::with_capacity(attempts);
    for i in 0..attempts {
        let manager = manager.clone();
        let room = room.clone();
        let owner = format!("saga-{i}-{tag}");
        tasks.push(tokio::spawn(async move {
            manager
                .acquire_lock(&room, ResourceType::Room, &owner, Duration::from_secs(60), 1)
                .await
        }));
    }

    let mut granted = 0;
    let mut refused = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            Some(_) => granted += 1,
            None => refused += 1,
        }
    }

    assert_eq!(granted, capacity);
    assert_eq!(refused, attempts - capacity);
    assert_eq!(
        manager.reserved(&room, &ResourceType::Room).await.unwrap(),
        capacity as u64
    );
    assert_eq!(
        manager
            .get_locks_for_resource(&room, &ResourceType::Room)
            .await
            .unwrap()
            .len(),
        capacity
    );
}

/// Unknown ids are ordinary misses; malformed arguments are rejected
/// before reaching the backend.
pub async fn argument_scenario<B: LockBackend>(manager: &LockManager<B>, tag: &str) {
    let missing = format!("lock_missing_{tag}");
    assert!(!manager.release_lock(&missing, "nobody").await.unwrap());
    assert!(
        !manager
            .extend_lock(&missing, "nobody", Duration::from_secs(1))
            .await
            .unwrap()
    );
    assert!(manager.get_lock(&missing).await.unwrap().is_none());

    let resource = format!("HTL-{tag}");
    let zero_quantity = manager
        .acquire_lock(&resource, ResourceType::Hotel, "saga", Duration::from_secs(1), 0)
        .await;
    assert!(matches!(zero_quantity, Err(LockError::InvalidArgument(_))));

    let zero_timeout = manager
        .acquire_lock(&resource, ResourceType::Hotel, "saga", Duration::ZERO, 1)
        .await;
    assert!(matches!(zero_timeout, Err(LockError::InvalidArgument(_))));

    assert!(matches!(
        manager.release_lock("", "saga").await,
        Err(LockError::InvalidArgument(_))
    ));
    assert!(matches!(
        manager.extend_lock(&missing, "saga", Duration::ZERO).await,
        Err(LockError::InvalidArgument(_))
    ));
    assert!(matches!(
        manager
            .is_resource_available(&resource, &ResourceType::Hotel, 0)
            .await,
        Err(LockError::InvalidArgument(_))
    ));
    assert!(
        manager
            .is_resource_locked(&resource, &ResourceType::Hotel, 0)
            .await
            .unwrap(),
        "zero units are always reserved"
    );
}

/// Statistics count this run's active locks by type.
pub async fn statistics_scenario<B: LockBackend>(manager: &LockManager<B>, tag: &str) {
    let saga = format!("saga-stats-{tag}");
    let timeout = Duration::from_secs(120);
    manager
        .acquire_lock(&format!("hotel:S-{tag}"), ResourceType::Hotel, &saga, timeout, 3)
        .await
        .unwrap()
        .unwrap();
    manager
        .acquire_lock(&format!("hotel:9:rooms:S-{tag}"), ResourceType::Room, &saga, timeout, 1)
        .await
        .unwrap()
        .unwrap();

    let stats = manager.get_lock_statistics().await.unwrap();
    assert!(stats.active_count >= 2);
    assert!(stats.by_type.get(&ResourceType::Hotel).copied().unwrap_or(0) >= 1);
    assert!(stats.by_type.get(&ResourceType::Room).copied().unwrap_or(0) >= 1);
    assert!(stats.average_duration > Duration::ZERO);

    manager.release_all_locks_by_owner(&saga).await.unwrap();
}

/// Flight capacity 2: `Other` spellings of a built-in type share its
/// capacity and its locks.
pub async fn type_alias_scenario<B: LockBackend>(manager: &LockManager<B>, tag: &str) {
    let flight = format!("VN777-{tag}");
    let saga = format!("saga-alias-{tag}");
    let timeout = Duration::from_secs(60);
    let upper = ResourceType::Other("FLIGHT".to_string());
    let lower = ResourceType::Other("flight".to_string());

    assert_eq!(manager.capacity_for(&upper), manager.capacity_for(&ResourceType::Flight));

    let lock = manager
        .acquire_lock(&flight, ResourceType::Flight, &saga, timeout, 2)
        .await
        .unwrap()
        .expect("2 of 2 should fit");

    for alias in [&upper, &lower] {
        assert!(
            manager
                .acquire_lock(&flight, alias.clone(), &saga, timeout, 1)
                .await
                .unwrap()
                .is_none(),
            "{alias:?} must not exceed the FLIGHT ceiling"
        );
        assert_eq!(manager.reserved(&flight, alias).await.unwrap(), 2);
        let held = manager.get_locks_for_resource(&flight, alias).await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].lock_id, lock.lock_id);
        assert_eq!(&held[0].resource_type, alias);
    }

    assert!(manager.release_lock(&lock.lock_id, &saga).await.unwrap());
    let custom = ResourceType::Other(format!("car{}", tag.len()));
    let rental = manager
        .acquire_lock(&flight, custom.clone(), &saga, timeout, 1)
        .await
        .unwrap()
        .unwrap();
    let stored = manager.get_lock(&rental.lock_id).await.unwrap().unwrap();
    assert_eq!(stored.resource_type, custom);
    assert_eq!(
        manager.get_locks_for_resource(&flight, &custom).await.unwrap().len(),
        1
    );
    manager.release_all_locks_by_owner(&saga).await.unwrap();
}
