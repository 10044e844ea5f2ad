//! The lock entity and its status machine.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LockError;
use crate::request::LockRequest;

// ============================================================================
// Resource Type
// ============================================================================

/// Category of lockable inventory.
///
/// Each category has its own capacity ceiling in the
/// [`CapacityTable`](crate::capacity::CapacityTable). Equality, ordering and
/// hashing use the canonical upper-case name, so `Other("flight")` is the
/// same type as [`ResourceType::Flight`] everywhere, including capacity
/// lookups and storage keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    Flight,
    Hotel,
    Room,
    Seat,
    /// Deployment-specific category, compared by its upper-case name.
    Other(String),
}

impl ResourceType {
    /// Canonical upper-case name, as stored in the lock table.
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Self::Flight => Cow::Borrowed("FLIGHT"),
            Self::Hotel => Cow::Borrowed("HOTEL"),
            Self::Room => Cow::Borrowed("ROOM"),
            Self::Seat => Cow::Borrowed("SEAT"),
            Self::Other(name) if name.bytes().any(|b| b.is_ascii_lowercase()) => {
                Cow::Owned(name.to_ascii_uppercase())
            }
            Self::Other(name) => Cow::Borrowed(name),
        }
    }

    /// Lower-case name used inside cache keys.
    pub fn key_segment(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ResourceType {}

impl Hash for ResourceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for ResourceType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(&other.as_str())
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl From<&str> for ResourceType {
    fn from(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "FLIGHT" => Self::Flight,
            "HOTEL" => Self::Hotel,
            "ROOM" => Self::Room,
            "SEAT" => Self::Seat,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ResourceType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<ResourceType> for String {
    fn from(resource_type: ResourceType) -> Self {
        resource_type.as_str().into_owned()
    }
}

// ============================================================================
// Lock Status
// ============================================================================

/// Lifecycle of a lock.
///
/// ```text
/// PENDING -> ACQUIRED -> RELEASED | EXPIRED | REVOKED
/// PENDING -> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    Pending,
    Acquired,
    Released,
    Expired,
    Revoked,
    Failed,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Acquired => "ACQUIRED",
            Self::Released => "RELEASED",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
            Self::Failed => "FAILED",
        }
    }

    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Released | Self::Expired | Self::Revoked | Self::Failed
        )
    }

    /// Returns true if `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: LockStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Acquired)
                | (Self::Pending, Self::Failed)
                | (Self::Acquired, Self::Released)
                | (Self::Acquired, Self::Expired)
                | (Self::Acquired, Self::Revoked)
        )
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockStatus {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACQUIRED" => Ok(Self::Acquired),
            "RELEASED" => Ok(Self::Released),
            "EXPIRED" => Ok(Self::Expired),
            "REVOKED" => Ok(Self::Revoked),
            "FAILED" => Ok(Self::Failed),
            other => Err(LockError::CorruptRecord {
                key: "status".to_string(),
                reason: format!("unknown lock status '{other}'"),
            }),
        }
    }
}

// ============================================================================
// Inventory Lock
// ============================================================================

/// A time-bounded reservation of `quantity` units of a resource, held on
/// behalf of a saga (`owner`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLock {
    pub lock_id: String,
    pub resource: String,
    pub resource_type: ResourceType,
    /// Saga id holding the lock. Any process may act for this owner.
    pub owner: String,
    /// Fixed at creation.
    pub quantity: u32,
    pub status: LockStatus,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Lease length requested at acquisition.
    pub timeout: Duration,
    pub priority: i32,
    pub metadata: Option<String>,
    pub owner_service: Option<String>,
}

impl InventoryLock {
    /// Generates a fresh lock id.
    pub fn generate_lock_id() -> String {
        format!("lock_{}", Uuid::new_v4().simple())
    }

    /// Builds a PENDING lock for `request` starting at `now`.
    pub fn pending(request: &LockRequest, now: DateTime<Utc>) -> Self {
        Self {
            lock_id: Self::generate_lock_id(),
            resource: request.resource.clone(),
            resource_type: request.resource_type.clone(),
            owner: request.owner.clone(),
            quantity: request.quantity,
            status: LockStatus::Pending,
            acquired_at: now,
            expires_at: expiry_after(now, request.timeout),
            timeout: request.timeout,
            priority: request.priority,
            metadata: request.metadata.clone(),
            owner_service: request.owner_service.clone(),
        }
    }

    /// Moves the lock to `next` if the status machine allows it.
    pub fn transition(&mut self, next: LockStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// ACQUIRED and not yet past its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == LockStatus::Acquired && self.expires_at > now
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            LockStatus::Expired => true,
            LockStatus::Acquired => self.expires_at <= now,
            _ => false,
        }
    }

    /// Time left on the lease, zero once it has run out.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Lease length between acquisition and current expiry.
    pub fn lease_length(&self) -> Duration {
        (self.expires_at - self.acquired_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// `start + timeout`, saturating at the maximum representable instant.
pub fn expiry_after(start: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(timeout)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
