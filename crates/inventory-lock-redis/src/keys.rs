//! Redis key layout.
//!
//! ```text
//! {prefix}:lock:{type}:{resource}:{lock_id}   lock record (JSON, PX = lease)
//! {prefix}:owner:{owner}                      set of the owner's lock keys
//! {prefix}:resource:{type}:{resource}         quantity ledger (sorted set)
//! ```
//!
//! Ledger members are `"{quantity}:{lock_id}"` scored by expiry in server
//! milliseconds, so each lock's share of the running quantity lapses at its
//! own expiry.

use inventory_lock_core::lock::ResourceType;

/// Builds keys and glob patterns under a common prefix.
#[derive(Debug, Clone)]
pub struct RedisKeys {
    prefix: String,
}

impl RedisKeys {
    pub const DEFAULT_PREFIX: &'static str = "inventory_lock";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn lock_key(&self, resource_type: &ResourceType, resource: &str, lock_id: &str) -> String {
        format!(
            "{}{}:{}:{}",
            self.lock_prefix(),
            resource_type.key_segment(),
            resource,
            lock_id
        )
    }

    pub fn owner_key(&self, owner: &str) -> String {
        format!("{}:owner:{}", self.prefix, owner)
    }

    pub fn ledger_key(&self, resource_type: &ResourceType, resource: &str) -> String {
        format!(
            "{}{}:{}",
            self.ledger_prefix(),
            resource_type.key_segment(),
            resource
        )
    }

    /// Prefix shared by every lock key. The scripts strip it to derive the
    /// ledger key of a lock.
    pub fn lock_prefix(&self) -> String {
        format!("{}:lock:", self.prefix)
    }

    pub fn ledger_prefix(&self) -> String {
        format!("{}:resource:", self.prefix)
    }

    pub fn ledger_member(quantity: u32, lock_id: &str) -> String {
        format!("{quantity}:{lock_id}")
    }

    /// Matches the single lock key carrying `lock_id`.
    pub fn lock_id_pattern(&self, lock_id: &str) -> String {
        format!("{}*:{}", escape_glob(&self.lock_prefix()), escape_glob(lock_id))
    }

    /// Matches lock keys of one resource. Resources sharing a prefix with
    /// `resource` (e.g. `flight:1` vs `flight:1:seats:Y`) match too, so
    /// callers filter decoded records on the exact resource.
    pub fn resource_pattern(&self, resource_type: &ResourceType, resource: &str) -> String {
        format!(
            "{}{}:{}:*",
            escape_glob(&self.lock_prefix()),
            escape_glob(&resource_type.key_segment()),
            escape_glob(resource)
        )
    }

    pub fn all_locks_pattern(&self) -> String {
        format!("{}*", escape_glob(&self.lock_prefix()))
    }
}

impl Default for RedisKeys {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

/// Escapes the characters Redis glob patterns treat specially.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
