//! Lock statistics for monitoring.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::lock::{InventoryLock, ResourceType};

/// Snapshot of the lock population. May be stale by the time it is read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockStatistics {
    pub active_count: u64,
    pub expired_count: u64,
    /// Active locks per resource type.
    pub by_type: BTreeMap<ResourceType, u64>,
    /// Mean lease length of active locks.
    pub average_duration: Duration,
}

impl LockStatistics {
    /// Summarises the active locks among `locks`; `expired_count` is taken
    /// as given since backends track it differently.
    pub fn from_locks<'a>(
        locks: impl IntoIterator<Item = &'a InventoryLock>,
        expired_count: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let mut stats = Self {
            expired_count,
            ..Self::default()
        };
        let mut total_millis: u128 = 0;
        for lock in locks.into_iter().filter(|lock| lock.is_active(now)) {
            stats.active_count += 1;
            *stats.by_type.entry(lock.resource_type.clone()).or_default() += 1;
            total_millis += lock.lease_length().as_millis();
        }
        if stats.active_count > 0 {
            let mean = total_millis / u128::from(stats.active_count);
            stats.average_duration = Duration::from_millis(u64::try_from(mean).unwrap_or(u64::MAX));
        }
        stats
    }
}
