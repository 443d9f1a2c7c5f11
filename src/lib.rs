//! Expiring Map - a concurrent map with lazily expiring entries
//!
//! Every entry carries an absolute deadline. Once the deadline is reached the
//! entry reads as absent and is evicted the next time an operation touches
//! it; there is no background sweeper.

pub mod config;
pub mod error;
pub mod map;

pub use config::MapConfig;
pub use error::ConfigError;
pub use map::{
    ConcurrentKeyValueStore, DashMapStore, Deadline, Entry, ExpiringMap, Iter, Keys, LockedStore,
    Sequence, StatsSnapshot, Values,
};
