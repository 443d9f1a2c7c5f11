//! Configuration Module
//!
//! Construction parameters for the default sharded backing store, loadable
//! from environment variables.

use std::env;
use std::str::FromStr;

use crate::error::{ConfigError, Result};

/// Environment variable holding the initial capacity.
pub const CAPACITY_VAR: &str = "EXPIRING_MAP_CAPACITY";

/// Environment variable holding the shard amount.
pub const SHARD_AMOUNT_VAR: &str = "EXPIRING_MAP_SHARD_AMOUNT";

/// Map construction parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapConfig {
    /// Number of entries to preallocate room for
    pub capacity: usize,
    /// Shard count of the backing store, None = store default
    pub shard_amount: Option<usize>,
}

impl MapConfig {
    /// Creates a new MapConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `EXPIRING_MAP_CAPACITY` - Initial capacity (default: 0)
    /// - `EXPIRING_MAP_SHARD_AMOUNT` - Shard count, power of two > 1 (default: unset)
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            capacity: parse_var(&lookup, CAPACITY_VAR)?.unwrap_or(0),
            shard_amount: parse_var(&lookup, SHARD_AMOUNT_VAR)?,
        };
        config.validate()?;
        Ok(config)
    }

    // == Validate ==
    /// Checks the shard amount against the sharded store's requirements.
    pub fn validate(&self) -> Result<()> {
        match self.shard_amount {
            Some(shards) if shards < 2 || !shards.is_power_of_two() => {
                Err(ConfigError::InvalidShardAmount(shards))
            }
            _ => Ok(()),
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvVar { name, value: raw }),
    }
}
