//! Per resource-type capacity ceilings.

use std::collections::HashMap;

use crate::lock::ResourceType;

/// Maximum concurrently reserved quantity per resource, keyed by type.
///
/// Passed into each backend at construction so tests and deployments can
/// choose their own ceilings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityTable {
    capacities: HashMap<ResourceType, u32>,
    default_capacity: u32,
}

impl CapacityTable {
    pub const DEFAULT_CAPACITY: u32 = 100;

    /// Creates a table with no per-type entries.
    pub fn empty(default_capacity: u32) -> Self {
        Self {
            capacities: HashMap::new(),
            default_capacity,
        }
    }

    /// Sets the ceiling for one resource type.
    pub fn with_capacity(mut self, resource_type: ResourceType, capacity: u32) -> Self {
        self.capacities.insert(resource_type, capacity);
        self
    }

    /// Sets the ceiling used for types without an entry.
    pub fn with_default_capacity(mut self, capacity: u32) -> Self {
        self.default_capacity = capacity;
        self
    }

    pub fn capacity_for(&self, resource_type: &ResourceType) -> u32 {
        self.capacities
            .get(resource_type)
            .copied()
            .unwrap_or(self.default_capacity)
    }

    pub fn default_capacity(&self) -> u32 {
        self.default_capacity
    }
}

impl Default for CapacityTable {
    fn default() -> Self {
        Self::empty(Self::DEFAULT_CAPACITY)
            .with_capacity(ResourceType::Flight, 300)
            .with_capacity(ResourceType::Hotel, 100)
            .with_capacity(ResourceType::Room, 50)
            .with_capacity(ResourceType::Seat, 300)
    }
}
