//! Row decoding for the lock table.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;

use inventory_lock_core::error::{LockError, LockResult};
use inventory_lock_core::lock::{InventoryLock, LockStatus, ResourceType};

/// Column list shared by every query that returns whole locks.
pub(crate) const LOCK_COLUMNS: &str = "lock_id, resource, resource_type, owner, quantity, status, \
     acquired_at, expires_at, timeout_ms, priority, metadata, owner_service";

fn corrupt(lock_id: &str, column: &str, error: impl std::fmt::Display) -> LockError {
    LockError::CorruptRecord {
        key: lock_id.to_string(),
        reason: format!("column {}: {}", column, error),
    }
}

/// Decodes one row selected with [`LOCK_COLUMNS`].
pub(crate) fn lock_from_row(row: &PgRow) -> LockResult<InventoryLock> {
    let lock_id: String = row
        .try_get("lock_id")
        .map_err(|e| corrupt("<row>", "lock_id", e))?;
    let get_err = |column: &'static str| {
        let lock_id = lock_id.clone();
        move |e: sqlx::Error| corrupt(&lock_id, column, e)
    };

    let resource: String = row.try_get("resource").map_err(get_err("resource"))?;
    let resource_type: String = row
        .try_get("resource_type")
        .map_err(get_err("resource_type"))?;
    let owner: String = row.try_get("owner").map_err(get_err("owner"))?;
    let quantity: i32 = row.try_get("quantity").map_err(get_err("quantity"))?;
    let status: String = row.try_get("status").map_err(get_err("status"))?;
    let acquired_at: DateTime<Utc> = row.try_get("acquired_at").map_err(get_err("acquired_at"))?;
    let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(get_err("expires_at"))?;
    let timeout_ms: i64 = row.try_get("timeout_ms").map_err(get_err("timeout_ms"))?;
    let priority: i32 = row.try_get("priority").map_err(get_err("priority"))?;
    let metadata: Option<String> = row.try_get("metadata").map_err(get_err("metadata"))?;
    let owner_service: Option<String> = row
        .try_get("owner_service")
        .map_err(get_err("owner_service"))?;

    let quantity = u32::try_from(quantity).map_err(|e| corrupt(&lock_id, "quantity", e))?;
    let status: LockStatus = status.parse()?;

    Ok(InventoryLock {
        lock_id,
        resource,
        resource_type: ResourceType::from(resource_type),
        owner,
        quantity,
        status,
        acquired_at,
        expires_at,
        timeout: Duration::from_millis(timeout_ms.max(0) as u64),
        priority,
        metadata,
        owner_service,
    })
}

/// Longest interval bound into SQL. Larger values overflow PostgreSQL
/// `interval` and `timestamptz` arithmetic.
pub(crate) const MAX_INTERVAL: Duration = Duration::from_secs(1000 * 365 * 24 * 60 * 60);

/// Whole microseconds in `duration`, capped at [`MAX_INTERVAL`].
pub(crate) fn duration_micros(duration: Duration) -> i64 {
    i64::try_from(duration.min(MAX_INTERVAL).as_micros()).unwrap_or(i64::MAX)
}

/// Whole milliseconds in `duration`, saturating.
pub(crate) fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
