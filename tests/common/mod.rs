//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod memory_backend;
pub mod scenarios;

use inventory_lock::{CapacityTable, ResourceType};

/// Capacities small enough to exhaust in a test.
pub fn test_capacities() -> CapacityTable {
    CapacityTable::default()
        .with_capacity(ResourceType::Flight, 2)
        .with_capacity(ResourceType::Room, 5)
}

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
