//! Map Module
//!
//! Expiring map layered on a pluggable concurrent key/value store.

mod backend;
mod entry;
mod iter;
mod stats;
mod store;


// Re-export public types
pub use backend::{ConcurrentKeyValueStore, DashMapStore, LockedStore};
pub use entry::{Deadline, Entry};
pub use iter::{Iter, Keys, Sequence, Values};
pub(crate) use stats::MapStats;
pub use stats::StatsSnapshot;
pub use store::ExpiringMap;
