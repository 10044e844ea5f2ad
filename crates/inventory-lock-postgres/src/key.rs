//! Advisory lock keys for per-resource serialization.

use inventory_lock_core::lock::ResourceType;
use sha2::{Digest, Sha256};

/// Transaction-scoped advisory lock key for one `(resource_type, resource)`.
///
/// Acquisition takes `pg_advisory_xact_lock` on this key before summing the
/// held quantity, so two acquirers of the same resource never both see the
/// pre-insert total. Two resources hashing to the same key only serialize
/// each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceLockKey(i64);

impl ResourceLockKey {
    pub fn new(resource_type: &ResourceType, resource: &str) -> Self {
        Self(hash_name(&format!("{}:{}", resource_type.as_str(), resource)))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// First 8 bytes of the SHA-256 digest, little-endian.
fn hash_name(name: &str) -> i64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable() {
        let a = ResourceLockKey::new(&ResourceType::Hotel, "HTL-42");
        let b = ResourceLockKey::new(&ResourceType::Hotel, "HTL-42");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_depends_on_type_and_resource() {
        let hotel = ResourceLockKey::new(&ResourceType::Hotel, "42");
        let room = ResourceLockKey::new(&ResourceType::Room, "42");
        let other = ResourceLockKey::new(&ResourceType::Hotel, "43");
        assert_ne!(hotel, room);
        assert_ne!(hotel, other);
    }

    #[test]
    fn test_hash_matches_digest_prefix() {
        let digest = Sha256::digest(b"FLIGHT:VN123");
        let expected = i64::from_le_bytes(digest[..8].try_into().unwrap());
        assert_eq!(
            ResourceLockKey::new(&ResourceType::Flight, "VN123").value(),
            expected
        );
    }
}
