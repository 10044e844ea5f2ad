//! Acquisition requests.

use std::time::Duration;

use crate::error::{LockError, LockResult};
use crate::lock::ResourceType;

/// Everything a backend needs to create a lock.
#[derive(Debug, Clone, PartialEq)]
pub struct LockRequest {
    pub resource: String,
    pub resource_type: ResourceType,
    pub owner: String,
    pub timeout: Duration,
    pub quantity: u32,
    /// Stored only; no backend orders acquisitions by priority.
    pub priority: i32,
    pub metadata: Option<String>,
    pub owner_service: Option<String>,
}

impl LockRequest {
    pub const DEFAULT_PRIORITY: i32 = 5;

    /// Creates a request for a single unit.
    pub fn new(
        resource: impl Into<String>,
        resource_type: ResourceType,
        owner: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            resource: resource.into(),
            resource_type,
            owner: owner.into(),
            timeout,
            quantity: 1,
            priority: Self::DEFAULT_PRIORITY,
            metadata: None,
            owner_service: None,
        }
    }

    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn owner_service(mut self, service: impl Into<String>) -> Self {
        self.owner_service = Some(service.into());
        self
    }

    /// Checks the acquisition contract: `quantity >= 1`, `timeout > 0`,
    /// non-empty resource and owner.
    pub fn validate(&self) -> LockResult<()> {
        if self.quantity == 0 {
            return Err(LockError::InvalidArgument(
                "quantity must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(LockError::InvalidArgument(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.resource.is_empty() {
            return Err(LockError::InvalidArgument(
                "resource cannot be empty".to_string(),
            ));
        }
        if self.owner.is_empty() {
            return Err(LockError::InvalidArgument(
                "owner cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
