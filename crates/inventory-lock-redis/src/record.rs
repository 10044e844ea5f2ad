//! Stored lock records and script reply decoding.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use fred::prelude::*;
use serde::{Deserialize, Serialize};

use inventory_lock_core::error::{LockError, LockResult};
use inventory_lock_core::lock::{InventoryLock, LockStatus, ResourceType};

/// JSON value stored under a lock key.
///
/// Expiry is not stored: the key's own TTL is authoritative and `expires_at`
/// is rebuilt from `PTTL` on every read. The scripts read `lock_id`, `owner`
/// and `quantity` from this document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub lock_id: String,
    pub resource: String,
    pub resource_type: String,
    pub owner: String,
    pub quantity: u32,
    pub acquired_at_ms: i64,
    pub timeout_ms: u64,
    pub priority: i32,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub owner_service: Option<String>,
}

impl LockRecord {
    pub fn from_lock(lock: &InventoryLock) -> Self {
        Self {
            lock_id: lock.lock_id.clone(),
            resource: lock.resource.clone(),
            resource_type: lock.resource_type.to_string(),
            owner: lock.owner.clone(),
            quantity: lock.quantity,
            acquired_at_ms: lock.acquired_at.timestamp_millis(),
            timeout_ms: duration_millis(lock.timeout) as u64,
            priority: lock.priority,
            metadata: lock.metadata.clone(),
            owner_service: lock.owner_service.clone(),
        }
    }

    /// Rebuilds the lock with `pttl_ms` of lease left as of `now`.
    pub fn into_lock(self, pttl_ms: i64, now: DateTime<Utc>) -> LockResult<InventoryLock> {
        let acquired_at = DateTime::<Utc>::from_timestamp_millis(self.acquired_at_ms).ok_or_else(
            || LockError::CorruptRecord {
                key: self.lock_id.clone(),
                reason: format!("acquired_at out of range: {}", self.acquired_at_ms),
            },
        )?;
        Ok(InventoryLock {
            lock_id: self.lock_id,
            resource: self.resource,
            resource_type: ResourceType::from(self.resource_type),
            owner: self.owner,
            quantity: self.quantity,
            status: LockStatus::Acquired,
            acquired_at,
            expires_at: now + TimeDelta::milliseconds(pttl_ms),
            timeout: Duration::from_millis(self.timeout_ms),
            priority: self.priority,
            metadata: self.metadata,
            owner_service: self.owner_service,
        })
    }

    pub fn to_json(&self) -> LockResult<String> {
        serde_json::to_string(self).map_err(|e| LockError::CorruptRecord {
            key: self.lock_id.clone(),
            reason: format!("failed to encode lock record: {e}"),
        })
    }
}

/// Milliseconds in `duration`, at least 1 so `PX` is never zero.
pub(crate) fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX).max(1)
}

/// Decodes a `[record, pttl, record, pttl, ...]` script reply.
pub(crate) fn decode_pairs(reply: RedisValue, now: DateTime<Utc>) -> LockResult<Vec<InventoryLock>> {
    let items = reply.into_array();
    if items.len() % 2 != 0 {
        return Err(LockError::CorruptRecord {
            key: "<reply>".to_string(),
            reason: format!("expected record/ttl pairs, got {} items", items.len()),
        });
    }

    let mut locks = Vec::with_capacity(items.len() / 2);
    for pair in items.chunks(2) {
        let raw = pair[0].as_string().ok_or_else(|| LockError::CorruptRecord {
            key: "<reply>".to_string(),
            reason: "lock record is not a string".to_string(),
        })?;
        let pttl = pair[1].as_i64().ok_or_else(|| LockError::CorruptRecord {
            key: "<reply>".to_string(),
            reason: "lock ttl is not an integer".to_string(),
        })?;
        let record: LockRecord = serde_json::from_str(&raw).map_err(|e| LockError::CorruptRecord {
            key: "<reply>".to_string(),
            reason: format!("invalid lock record {raw:?}: {e}"),
        })?;
        locks.push(record.into_lock(pttl, now)?);
    }
    Ok(locks)
}
