//! Map Statistics Module
//!
//! Lock-free counters for lookups and lazy expiry activity.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Map Stats ==
/// Shared counters updated by every map handle.
#[derive(Debug, Default)]
pub struct MapStats {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    stale_evictions_skipped: AtomicU64,
}

impl MapStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lookup found a live entry.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A lookup found nothing, or only an expired entry.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// An expired entry was evicted on contact.
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// An eviction was abandoned because the expired entry was already
    /// removed or the key was re-written meanwhile.
    pub fn record_skipped_eviction(&self) {
        self.stale_evictions_skipped.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Copies the current counter values.
    ///
    /// Counters are read independently, so a snapshot taken under concurrent
    /// load is not a consistent cut across all four.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            stale_evictions_skipped: self.stale_evictions_skipped.load(Ordering::Relaxed),
        }
    }
}

// == Stats Snapshot ==
/// Point-in-time copy of the map counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Lookups (`get`/`has`) that found a live entry
    pub hits: u64,
    /// Lookups that found no entry or an expired one
    pub misses: u64,
    /// Expired entries evicted by lazy expiry
    pub expirations: u64,
    /// Evictions skipped because the entry was already removed or re-written
    pub stale_evictions_skipped: u64,
}

impl StatsSnapshot {
    /// Calculates the lookup hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_stats_new() {
        let stats = MapStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(StatsSnapshot::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let stats = MapStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.snapshot().hit_rate(), 0.75);
    }

    #[test]
    fn test_record_expiration_and_skip() {
        let stats = MapStats::new();
        stats.record_expiration();
        stats.record_expiration();
        stats.record_skipped_eviction();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.expirations, 2);
        assert_eq!(snapshot.stale_evictions_skipped, 1);
    }

    #[test]
    fn test_concurrent_recording() {
        let stats = Arc::new(MapStats::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_hit();
                        stats.record_miss();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 8000);
        assert_eq!(snapshot.misses, 8000);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = MapStats::new();
        stats.record_hit();

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["misses"], 0);
        assert_eq!(json["expirations"], 0);
        assert_eq!(json["stale_evictions_skipped"], 0);
    }
}
