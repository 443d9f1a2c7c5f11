//! Error types for map construction
//!
//! Map operations never fail: absence and expiry are reported as `None` or
//! `false`. The only fallible path is building a map from configuration.

use thiserror::Error;

// == Config Error Enum ==
/// Errors raised while loading or validating a [`MapConfig`](crate::MapConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Shard amount rejected by the sharded backing store
    #[error("Invalid shard amount: {0} (must be a power of two greater than 1)")]
    InvalidShardAmount(usize),

    /// Environment variable set to a value that does not parse
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnvVar { name: &'static str, value: String },
}

// == Result Type Alias ==
/// Convenience Result type for configuration handling.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConfigError::InvalidShardAmount(3).to_string(),
            "Invalid shard amount: 3 (must be a power of two greater than 1)"
        );

        let err = ConfigError::InvalidEnvVar {
            name: "EXPIRING_MAP_CAPACITY",
            value: "lots".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for EXPIRING_MAP_CAPACITY: \"lots\"");
    }
}
