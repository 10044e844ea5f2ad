//! Lock manager configuration.
//!
//! Loaded from TOML or from the process environment. Backend selection
//! happens once, in [`LockManager::from_config`](crate::LockManager::from_config).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use inventory_lock_core::capacity::CapacityTable;
use inventory_lock_core::error::{LockError, LockResult};
use inventory_lock_core::lock::ResourceType;

pub const ENV_PROVIDER: &str = "INVENTORY_LOCK_PROVIDER";
pub const ENV_REDIS_URL: &str = "REDIS_URL";
pub const ENV_POSTGRES_URL: &str = "POSTGRES_URL";
pub const ENV_DEFAULT_TIMEOUT_SECS: &str = "INVENTORY_LOCK_DEFAULT_TIMEOUT_SECS";
pub const ENV_SWEEP_INTERVAL_SECS: &str = "INVENTORY_LOCK_SWEEP_INTERVAL_SECS";
pub const ENV_OWNER_SERVICE: &str = "INVENTORY_LOCK_OWNER_SERVICE";

/// Which backing store holds the locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Redis; native key expiry.
    #[default]
    Cache,
    /// PostgreSQL; expiry by timestamp filters plus sweeping.
    Store,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => f.write_str("cache"),
            Self::Store => f.write_str("store"),
        }
    }
}

impl FromStr for Provider {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cache" | "redis" => Ok(Self::Cache),
            "store" | "database" | "postgres" => Ok(Self::Store),
            other => Err(LockError::Configuration(format!(
                "unknown lock provider '{other}', expected 'cache' or 'store'"
            ))),
        }
    }
}

/// Lock manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Backend to use
    #[serde(default)]
    pub provider: Provider,

    /// Redis URL, required for the cache provider
    #[serde(default)]
    pub redis_url: Option<String>,

    /// PostgreSQL connection string, required for the store provider
    #[serde(default)]
    pub postgres_url: Option<String>,

    /// Lease used when callers do not pass one
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Service name stamped on new locks
    #[serde(default)]
    pub owner_service: Option<String>,

    /// Capacity per resource type, overriding the built-in table
    #[serde(default)]
    pub capacities: BTreeMap<String, u32>,

    /// Capacity for resource types missing from the table
    #[serde(default = "default_capacity")]
    pub default_capacity: u32,

    /// Interval of the expiry sweeper
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Redis key prefix
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// PostgreSQL pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            redis_url: None,
            postgres_url: None,
            default_timeout_secs: default_timeout_secs(),
            owner_service: None,
            capacities: BTreeMap::new(),
            default_capacity: default_capacity(),
            sweep_interval_secs: default_sweep_interval_secs(),
            key_prefix: None,
            max_connections: default_max_connections(),
        }
    }
}

impl ManagerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> LockResult<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| LockError::Configuration(format!("invalid lock configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> LockResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, starting from defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LockResult<Self> {
        let mut config = Self::default();
        if let Some(provider) = lookup(ENV_PROVIDER) {
            config.provider = provider.parse()?;
        }
        config.redis_url = lookup(ENV_REDIS_URL).or(config.redis_url);
        config.postgres_url = lookup(ENV_POSTGRES_URL).or(config.postgres_url);
        config.owner_service = lookup(ENV_OWNER_SERVICE).or(config.owner_service);
        if let Some(secs) = lookup(ENV_DEFAULT_TIMEOUT_SECS) {
            config.default_timeout_secs = parse_secs(ENV_DEFAULT_TIMEOUT_SECS, &secs)?;
        }
        if let Some(secs) = lookup(ENV_SWEEP_INTERVAL_SECS) {
            config.sweep_interval_secs = parse_secs(ENV_SWEEP_INTERVAL_SECS, &secs)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks that the selected provider has what it needs.
    pub fn validate(&self) -> LockResult<()> {
        match self.provider {
            Provider::Cache if self.redis_url.is_none() => {
                return Err(LockError::Configuration(
                    "provider 'cache' requires redis_url".to_string(),
                ));
            }
            Provider::Store if self.postgres_url.is_none() => {
                return Err(LockError::Configuration(
                    "provider 'store' requires postgres_url".to_string(),
                ));
            }
            _ => {}
        }
        if self.default_timeout_secs == 0 {
            return Err(LockError::Configuration(
                "default_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(LockError::Configuration(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Built-in capacities overlaid with the configured ones.
    pub fn capacity_table(&self) -> CapacityTable {
        self.capacities.iter().fold(
            CapacityTable::default().with_default_capacity(self.default_capacity),
            |table, (name, capacity)| {
                table.with_capacity(ResourceType::from(name.as_str()), *capacity)
            },
        )
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_secs(key: &str, raw: &str) -> LockResult<u64> {
    raw.trim()
        .parse()
        .map_err(|e| LockError::Configuration(format!("{key}={raw:?} is not a number: {e}")))
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_capacity() -> u32 {
    CapacityTable::DEFAULT_CAPACITY
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    10
}
