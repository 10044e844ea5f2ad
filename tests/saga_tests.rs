//! Saga lock sets against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use inventory_lock::{LockManager, LockSpec, LockStatus, ResourceType, SAGA_LOCK_TIMEOUT, SagaLocks};

mod common;
use common::memory_backend::MemoryLockBackend;

fn saga_locks() -> SagaLocks<MemoryLockBackend> {
    common::init_tracing();
    SagaLocks::new(Arc::new(LockManager::new(MemoryLockBackend::new(
        common::test_capacities(),
    ))))
}

#[tokio::test]
async fn test_acquire_all_holds_every_lock() {
    let saga = saga_locks();
    let locks = saga
        .acquire_all(
            "saga-1",
            &[
                LockSpec::hotel("HTL-42", 2),
                LockSpec::hotel_rooms("HTL-42", "DELUXE", 2),
            ],
        )
        .await
        .unwrap()
        .expect("both reservations fit");

    assert_eq!(locks.len(), 2);
    assert_eq!(locks[0].resource, "hotel:HTL-42");
    assert_eq!(locks[1].resource, "hotel:HTL-42:rooms:DELUXE");
    assert_eq!(locks[1].resource_type, ResourceType::Room);
    assert_eq!(locks[0].timeout, SAGA_LOCK_TIMEOUT);
    assert!(saga.validate_active("saga-1").await.unwrap());
}

#[tokio::test]
async fn test_refusal_rolls_back_earlier_locks() {
    let saga = saga_locks();
    // Flight capacity is 2 in tests, so three passengers are refused on the
    // flight after the seat class succeeded.
    let outcome = saga
        .acquire_all(
            "saga-2",
            &[
                LockSpec::flight_seats("VN123", "ECONOMY", 3),
                LockSpec::flight("VN123", 3),
            ],
        )
        .await
        .unwrap();
    assert!(outcome.is_none());

    let manager = saga.manager();
    assert_eq!(
        manager
            .reserved("flight:VN123:seats:ECONOMY", &ResourceType::Seat)
            .await
            .unwrap(),
        0
    );
    assert!(!saga.validate_active("saga-2").await.unwrap());
}

#[tokio::test]
async fn test_fault_rolls_back_and_propagates() {
    let saga = saga_locks();
    saga.manager().backend().fail_acquisitions_of("hotel:H9:rooms:SUITE");

    let err = saga
        .acquire_all(
            "saga-3",
            &[
                LockSpec::hotel("H9", 1),
                LockSpec::hotel_rooms("H9", "SUITE", 1),
            ],
        )
        .await
        .unwrap_err();
    assert!(err.is_infrastructure());
    assert_eq!(
        saga.manager()
            .reserved("hotel:H9", &ResourceType::Hotel)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_extend_all_and_compensate() {
    let saga = saga_locks().with_timeout(Duration::from_secs(60));
    let locks = saga
        .acquire_all(
            "saga-4",
            &[LockSpec::flight("VN1", 1), LockSpec::hotel("H1", 1)],
        )
        .await
        .unwrap()
        .unwrap();

    assert!(saga.extend_all("saga-4", Duration::from_secs(30)).await.unwrap());
    for lock in &locks {
        let current = saga.manager().get_lock(&lock.lock_id).await.unwrap().unwrap();
        assert_eq!(
            current.expires_at - lock.expires_at,
            chrono::TimeDelta::seconds(30)
        );
    }

    assert_eq!(saga.compensate("saga-4").await.unwrap(), 2);
    assert_eq!(saga.compensate("saga-4").await.unwrap(), 0);
    assert!(!saga.validate_active("saga-4").await.unwrap());
    for lock in &locks {
        assert_eq!(
            saga.manager().backend().status_of(&lock.lock_id),
            Some(LockStatus::Released)
        );
    }
}

#[tokio::test]
async fn test_extend_all_without_locks_is_vacuous() {
    let saga = saga_locks();
    assert!(saga.extend_all("saga-none", Duration::from_secs(5)).await.unwrap());
}
