//! Redis backend for distributed inventory locks.

pub mod backend;
pub mod keys;
pub mod provider;
pub mod record;
pub mod scripts;

pub use backend::RedisLockBackend;
pub use keys::RedisKeys;
pub use provider::RedisLockBackendBuilder;
