//! Convenience prelude for inventory lock types.

pub use crate::capacity::CapacityTable;
pub use crate::error::{LockError, LockResult};
pub use crate::lock::{InventoryLock, LockStatus, ResourceType};
pub use crate::request::LockRequest;
pub use crate::stats::LockStatistics;
pub use crate::traits::LockBackend;
