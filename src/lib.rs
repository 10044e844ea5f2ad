//! Quantity-bounded distributed inventory locks for booking sagas.
//!
//! A lock reserves `quantity` units of a shared resource (a flight, a hotel,
//! a seat class, a room type) for one owner, usually a saga id, until its
//! lease runs out. For every resource the quantity held by ACQUIRED,
//! unexpired locks never exceeds the capacity configured for its type, no
//! matter how many processes acquire at once.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use inventory_lock::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = RedisLockBackend::connect("redis://localhost:6379").await?;
//!     let manager = LockManager::new(backend);
//!
//!     match manager
//!         .acquire_lock("HTL-42", ResourceType::Hotel, "saga-1", Duration::from_secs(900), 60)
//!         .await?
//!     {
//!         Some(lock) => {
//!             // Reservation held until released or expired.
//!             manager.release_lock(&lock.lock_id, "saga-1").await?;
//!         }
//!         None => println!("sold out"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! ## Cache (Redis)
//!
//! Every operation is one Lua script. Leases are key TTLs, so expired locks
//! disappear without sweeping.
//!
//! ## Store (PostgreSQL)
//!
//! One row per lock. Acquisitions of the same resource are serialized by a
//! transaction-scoped advisory lock; expired rows are ignored by every query
//! and relabelled EXPIRED by [`LockManager::cleanup_expired_locks`], which
//! [`LockSweeper`] runs periodically.
//!
//! # Crate Organization
//!
//! This crate re-exports:
//! - `inventory-lock-core`: lock entity, capacity table, `LockBackend` trait
//! - `inventory-lock-redis`: cache backend
//! - `inventory-lock-postgres`: store backend

pub mod any_backend;
pub mod config;
pub mod manager;
pub mod saga;
pub mod sweeper;

pub use any_backend::AnyLockBackend;
pub use config::{ManagerConfig, Provider};
pub use manager::LockManager;
pub use saga::{
    DEFAULT_LOCK_TIMEOUT, LockSpec, PAYMENT_LOCK_TIMEOUT, SAGA_LOCK_TIMEOUT, SagaLocks,
};
pub use sweeper::LockSweeper;

// Re-export core types and traits
pub use inventory_lock_core::*;

// Re-export backends
pub use inventory_lock_postgres::{PostgresLockBackend, PostgresLockBackendBuilder};
pub use inventory_lock_redis::{RedisLockBackend, RedisLockBackendBuilder};
