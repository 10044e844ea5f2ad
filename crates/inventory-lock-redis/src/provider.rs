//! Redis lock backend configuration.

use inventory_lock_core::capacity::CapacityTable;
use inventory_lock_core::error::{LockError, LockResult};

use crate::backend::RedisLockBackend;
use crate::keys::RedisKeys;
use fred::prelude::*;

/// Builder for the Redis lock backend.
pub struct RedisLockBackendBuilder {
    url: Option<String>,
    client: Option<RedisClient>,
    key_prefix: String,
    capacities: CapacityTable,
}

impl RedisLockBackendBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: None,
            client: None,
            key_prefix: RedisKeys::DEFAULT_PREFIX.to_string(),
            capacities: CapacityTable::default(),
        }
    }

    /// Sets the Redis server URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Uses an existing, connected Redis client.
    pub fn client(mut self, client: RedisClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the prefix of every key this backend writes.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the capacity ceilings.
    pub fn capacities(mut self, capacities: CapacityTable) -> Self {
        self.capacities = capacities;
        self
    }

    /// Builds the backend, connecting to Redis if a URL was given.
    pub async fn build(self) -> LockResult<RedisLockBackend> {
        let client = match (self.client, self.url) {
            (Some(client), _) => client,
            (None, Some(url)) => {
                let config = RedisConfig::from_url(&url).map_err(|e| {
                    LockError::Connection(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("invalid Redis URL: {}", e),
                    )))
                })?;

                let client = RedisClient::new(config, None, None, None);
                client.connect();
                client.wait_for_connect().await.map_err(|e| {
                    LockError::Connection(Box::new(std::io::Error::other(format!(
                        "failed to connect to Redis: {}",
                        e
                    ))))
                })?;
                client
            }
            (None, None) => {
                return Err(LockError::Configuration(
                    "no Redis client or URL provided".to_string(),
                ));
            }
        };

        Ok(RedisLockBackend::new(
            client,
            RedisKeys::new(self.key_prefix),
            self.capacities,
        ))
    }
}

impl Default for RedisLockBackendBuilder {
    fn default() -> Self {
        Self::new()
    }
}
