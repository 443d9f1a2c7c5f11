//! Expiring Map Module
//!
//! Map facade that stores every value with an absolute deadline and applies
//! lazy expiry on each read and traversal.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::config::MapConfig;
use crate::error::Result;
use crate::map::iter::{Iter, Keys, Sequence, Values};
use crate::map::{ConcurrentKeyValueStore, DashMapStore, Deadline, Entry, MapStats, StatsSnapshot};

struct Shared<S> {
    store: S,
    next_stamp: AtomicU64,
    stats: MapStats,
}

// == Expiring Map ==
/// Concurrent map whose entries expire at an absolute deadline.
///
/// Expired entries are never swept in the background. Reads (`get`, `has`)
/// and traversals (`range`, `len`, sequences) treat them as absent and evict
/// them on contact. Writes do not look at deadlines at all.
///
/// Handles are cheap to clone and share the same entries.
pub struct ExpiringMap<K, V, S = DashMapStore<K, Entry<V>>> {
    shared: Arc<Shared<S>>,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V, S> Clone for ExpiringMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            _types: PhantomData,
        }
    }
}

impl<K, V, S> fmt::Debug for ExpiringMap<K, V, S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringMap")
            .field("store", &self.shared.store)
            .field("stats", &self.shared.stats.snapshot())
            .finish()
    }
}

impl<K, V> Default for ExpiringMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash,
{
    // == Constructors ==
    /// Creates an empty map over the default sharded store.
    pub fn new() -> Self {
        Self::with_store(DashMapStore::new())
    }

    /// Creates an empty map sized and sharded according to `config`.
    pub fn from_config(config: &MapConfig) -> Result<Self> {
        config.validate()?;
        let store = match config.shard_amount {
            Some(shards) => DashMapStore::with_capacity_and_shard_amount(config.capacity, shards),
            None => DashMapStore::with_capacity(config.capacity),
        };
        debug!(
            capacity = config.capacity,
            shard_amount = ?config.shard_amount,
            "Expiring map built from config"
        );
        Ok(Self::with_store(store))
    }
}

impl<K, V, S> ExpiringMap<K, V, S> {
    /// Creates an empty map over a caller-supplied backing store.
    pub fn with_store(store: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                next_stamp: AtomicU64::new(0),
                stats: MapStats::new(),
            }),
            _types: PhantomData,
        }
    }

    /// Returns the lookup and expiry counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl<K, V, S> ExpiringMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: ConcurrentKeyValueStore<K, Entry<V>>,
{
    fn new_entry(&self, value: V, deadline: Deadline) -> Entry<V> {
        let stamp = self.shared.next_stamp.fetch_add(1, Ordering::Relaxed);
        Entry::new(value, deadline, stamp)
    }

    /// Removes `stale` from `key`, unless the key now holds a newer entry.
    fn evict(&self, key: &K, stale: &Entry<V>) {
        let stamp = stale.stamp();
        if self.shared.store.remove_if(key, |current| current.stamp() == stamp) {
            trace!(stamp, "Evicted expired entry");
            self.shared.stats.record_expiration();
        } else {
            debug!(stamp, "Expired entry already removed or re-written, eviction skipped");
            self.shared.stats.record_skipped_eviction();
        }
    }

    // == Set If Absent ==
    /// Inserts the entry only if the key holds nothing.
    ///
    /// Deadlines are not consulted: an entry that has expired but has not been
    /// evicted yet still occupies the key and makes this return false. Reading
    /// the key first (`get`/`has`) evicts such a stale claim.
    ///
    /// Returns true iff the entry was inserted.
    pub fn set_if_absent(&self, key: K, value: V, deadline: impl Into<Deadline>) -> bool {
        let entry = self.new_entry(value, deadline.into());
        self.shared.store.set_if_absent(key, entry)
    }

    // == Set ==
    /// Inserts or replaces the entry for `key`.
    ///
    /// Returns true if the key already held an entry, live or expired.
    pub fn set(&self, key: K, value: V, deadline: impl Into<Deadline>) -> bool {
        let entry = self.new_entry(value, deadline.into());
        self.shared.store.set(key, entry)
    }

    // == Get Or Set ==
    /// Returns the live value for `key`, storing `value` if there is none.
    ///
    /// An expired entry is replaced by the new one and the new value is
    /// returned. The replacement only succeeds against the exact expired
    /// entry that was loaded; if another writer got there first the lookup
    /// starts over, so the result is always a value that was live during
    /// the call.
    pub fn get_or_set(&self, key: K, value: V, deadline: impl Into<Deadline>) -> V {
        let deadline = deadline.into();
        loop {
            let fresh = self.new_entry(value.clone(), deadline);
            let (current, loaded) = self.shared.store.load_or_store(key.clone(), fresh.clone());
            if !loaded {
                return value;
            }
            if !current.is_expired() {
                return current.into_value();
            }

            let stale = current.stamp();
            if self
                .shared
                .store
                .replace_if(&key, fresh, |entry| entry.stamp() == stale)
            {
                trace!(stamp = stale, "Replaced expired entry");
                self.shared.stats.record_expiration();
                return value;
            }
            debug!(stamp = stale, "Expired entry changed concurrently, retrying get_or_set");
        }
    }

    // == Has ==
    /// Returns true if `key` holds a live entry. Evicts an expired one.
    pub fn has(&self, key: &K) -> bool {
        self.get_live(key).is_some()
    }

    // == Get ==
    /// Returns the value for `key` if its entry is live. Evicts an expired one.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_live(key).map(Entry::into_value)
    }

    fn get_live(&self, key: &K) -> Option<Entry<V>> {
        let now = Instant::now();
        match self.shared.store.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.shared.stats.record_hit();
                Some(entry)
            }
            Some(entry) => {
                self.evict(key, &entry);
                self.shared.stats.record_miss();
                None
            }
            None => {
                self.shared.stats.record_miss();
                None
            }
        }
    }

    // == Delete / Remove ==
    /// Removes `key` whether or not its entry is live.
    ///
    /// Returns true if an entry was present.
    pub fn delete(&self, key: &K) -> bool {
        self.shared.store.delete(key)
    }

    /// Same as [`delete`](Self::delete), through the store's `remove` primitive.
    pub fn remove(&self, key: &K) -> bool {
        self.shared.store.remove(key)
    }

    // == Range ==
    /// Calls `visit` for each live entry until it returns false.
    ///
    /// Expiry is judged against the instant the traversal started; expired
    /// entries are evicted and skipped. Each key is presented at most once.
    /// Entries written or expiring during the traversal may or may not be seen.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let now = Instant::now();
        self.shared.store.range(|key, entry| {
            if entry.is_expired_at(now) {
                self.evict(key, entry);
                true
            } else {
                visit(key, entry.value())
            }
        });
    }

    // == Length ==
    /// Counts live entries with a full traversal, evicting expired ones.
    ///
    /// Cost grows with every resident entry, expired or not.
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.range(|_, _| {
            count += 1;
            true
        });
        count
    }

    /// Returns true if no live entry remains. Same cost as [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries physically held, including expired ones not yet evicted.
    pub fn resident_len(&self) -> usize {
        self.shared.store.len()
    }

    // == Clear ==
    /// Removes every entry regardless of deadline.
    pub fn clear(&self) {
        self.shared.store.clear();
        debug!("Expiring map cleared");
    }
}

impl<K, V, S> ExpiringMap<K, V, S>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: ConcurrentKeyValueStore<K, Entry<V>> + 'static,
{
    // == Sequences ==
    /// Lazily yields live `(key, value)` pairs.
    ///
    /// A producer thread runs [`range`](Self::range) and hands items over
    /// one at a time. Drop the sequence (or call `cancel`) to stop early.
    pub fn iter(&self) -> Iter<K, V> {
        let map = self.clone();
        Sequence::spawn(move |emitter| {
            map.range(|key, value| emitter.emit((key.clone(), value.clone())));
        })
    }

    /// Lazily yields live keys. See [`iter`](Self::iter).
    pub fn keys(&self) -> Keys<K> {
        let map = self.clone();
        Sequence::spawn(move |emitter| {
            map.range(|key, _| emitter.emit(key.clone()));
        })
    }

    /// Lazily yields live values. See [`iter`](Self::iter).
    pub fn values(&self) -> Values<V> {
        let map = self.clone();
        Sequence::spawn(move |emitter| {
            map.range(|_, value| emitter.emit(value.clone()));
        })
    }
}
