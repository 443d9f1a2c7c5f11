//! Integration Tests for the Expiring Map
//!
//! Exercises the public API end to end: expiry over real time, concurrent
//! writers on threads and tokio tasks, lazy sequences and configuration.

use chrono::Utc;
use expiring_map::{Deadline, ExpiringMap, MapConfig};
use std::sync::{Arc, Barrier};
use std::thread::{self, sleep};
use std::time::{Duration, Instant};

// == Helper Functions ==

fn in_a_minute() -> Deadline {
    Deadline::after(Duration::from_secs(60))
}

fn in_millis(ms: u64) -> Deadline {
    Deadline::after(Duration::from_millis(ms))
}

// == Expiry Over Time ==

#[test]
fn test_value_readable_until_deadline() {
    let map = ExpiringMap::new();
    map.set("session", "token", in_millis(100));

    assert_eq!(map.get(&"session"), Some("token"));
    assert!(map.has(&"session"));

    sleep(Duration::from_millis(150));

    assert_eq!(map.get(&"session"), None);
    assert_eq!(map.len(), 0);
    assert_eq!(map.resident_len(), 0);
}

#[test]
fn test_untouched_expired_entries_stay_resident() {
    let map = ExpiringMap::new();
    for i in 0..10 {
        map.set(i, i, in_millis(20));
    }
    sleep(Duration::from_millis(50));

    // Nothing sweeps in the background
    assert_eq!(map.resident_len(), 10);

    // One read evicts one entry
    assert!(!map.has(&3));
    assert_eq!(map.resident_len(), 9);

    // A traversal evicts the rest
    assert!(map.is_empty());
    assert_eq!(map.resident_len(), 0);
}

#[test]
fn test_live_count_shrinks_monotonically() {
    let map = ExpiringMap::new();
    let start = Instant::now();
    for i in 0..20u64 {
        map.set(i, i, start + Duration::from_millis(10 * (i + 1)));
    }

    let mut previous = map.len();
    while previous > 0 {
        sleep(Duration::from_millis(5));
        let current = map.len();
        assert!(current <= previous, "count grew from {} to {}", previous, current);
        previous = current;
    }

    assert_eq!(map.resident_len(), 0);
}

#[test]
fn test_set_if_absent_claim_survives_expiry_until_read() {
    let map = ExpiringMap::new();
    assert!(map.set_if_absent("lock", "owner-1", in_millis(20)));
    sleep(Duration::from_millis(40));

    // Expired but never read: still claimed
    assert!(!map.set_if_absent("lock", "owner-2", in_a_minute()));

    assert!(!map.has(&"lock"));
    assert!(map.set_if_absent("lock", "owner-2", in_a_minute()));
    assert_eq!(map.get(&"lock"), Some("owner-2"));
}

#[test]
fn test_get_or_set_after_expiry() {
    let map = ExpiringMap::new();
    assert_eq!(map.get_or_set("k", 1, in_millis(20)), 1);
    assert_eq!(map.get_or_set("k", 2, in_a_minute()), 1);

    sleep(Duration::from_millis(40));

    assert_eq!(map.get_or_set("k", 3, in_a_minute()), 3);
    assert_eq!(map.get(&"k"), Some(3));
}

#[test]
fn test_wall_clock_deadlines() {
    let map = ExpiringMap::new();
    map.set("future", 1, Deadline::from_datetime(Utc::now() + chrono::Duration::minutes(5)));
    map.set("past", 2, Deadline::from_datetime(Utc::now() - chrono::Duration::minutes(5)));

    assert_eq!(map.get(&"future"), Some(1));
    assert_eq!(map.get(&"past"), None);
}

#[test]
fn test_clear_forgets_all_keys() {
    let map = ExpiringMap::new();
    for i in 0..50 {
        let deadline = if i % 2 == 0 {
            in_a_minute()
        } else {
            Deadline::at(Instant::now())
        };
        map.set(i, i, deadline);
    }

    map.clear();

    for i in 0..50 {
        assert_eq!(map.get(&i), None);
    }
    assert!(map.is_empty());
}

// == Concurrency ==

#[test]
fn test_threads_insert_then_delete_disjoint_keys() {
    let map = ExpiringMap::new();
    let writers = 8;
    let per_writer = 500;
    let barrier = Arc::new(Barrier::new(writers));

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let map = map.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in w * per_writer..(w + 1) * per_writer {
                    map.set(i, format!("value-{}", i), in_a_minute());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(map.len(), writers * per_writer);

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let map = map.clone();
            thread::spawn(move || {
                for i in w * per_writer..(w + 1) * per_writer {
                    assert!(map.delete(&i));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(map.len(), 0);
}

#[test]
fn test_get_or_set_racers_agree_on_one_value() {
    let map = ExpiringMap::new();
    let racers = 16;
    let barrier = Arc::new(Barrier::new(racers));

    let handles: Vec<_> = (0..racers)
        .map(|r| {
            let map = map.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                map.get_or_set("shared", r, in_a_minute())
            })
        })
        .collect();

    let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winner = map.get(&"shared").unwrap();

    assert!(results.iter().all(|&r| r == winner));
}

#[test]
fn test_get_or_set_racers_replace_stale_entry() {
    let racers = 16;

    for _ in 0..200 {
        let map = ExpiringMap::new();
        map.set("shared", usize::MAX, Deadline::at(Instant::now()));
        let barrier = Arc::new(Barrier::new(racers));

        // Every racer loads the same expired entry and competes to replace it
        let handles: Vec<_> = (0..racers)
            .map(|r| {
                let map = map.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    map.get_or_set("shared", r, in_a_minute())
                })
            })
            .collect();

        let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winner = map.get(&"shared").unwrap();

        assert_ne!(winner, usize::MAX);
        assert!(results.iter().all(|&r| r == winner));
    }
}

#[test]
fn test_eviction_never_drops_fresh_writes() {
    let map = ExpiringMap::new();
    let rounds = 2000;

    let writer = {
        let map = map.clone();
        thread::spawn(move || {
            for i in 0..rounds {
                // Alternate stale and fresh entries under one key
                map.set("key", i, Deadline::at(Instant::now()));
                map.set("key", i, in_a_minute());
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let map = map.clone();
            thread::spawn(move || {
                for _ in 0..rounds {
                    map.has(&"key");
                    map.len();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for h in readers {
        h.join().unwrap();
    }

    // The last write was fresh, so no racing eviction may have removed it
    assert_eq!(map.get(&"key"), Some(rounds - 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tasks_share_one_map() {
    let map: ExpiringMap<String, u64> = ExpiringMap::new();

    let mut handles = vec![];
    for t in 0..10u64 {
        let map = map.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..100u64 {
                let key = format!("task-{}-{}", t, i);
                map.set(key.clone(), t * 100 + i, in_a_minute());
                assert_eq!(map.get(&key), Some(t * 100 + i));
            }
        }));
    }
    for handle in handles {
        handle.await.expect("Task should not panic");
    }

    assert_eq!(map.len(), 1000);
    assert_eq!(map.values().sum::<u64>(), (0..1000u64).sum::<u64>());
}

// == Sequences ==

#[test]
fn test_sequences_cover_live_entries() {
    let map = ExpiringMap::new();
    for i in 0..30 {
        map.set(i, i * 10, in_a_minute());
    }
    map.set(100, 1000, Deadline::at(Instant::now()));

    let mut pairs: Vec<(i32, i32)> = map.iter().collect();
    pairs.sort_unstable();
    assert_eq!(pairs, (0..30).map(|i| (i, i * 10)).collect::<Vec<_>>());

    let mut keys: Vec<i32> = map.keys().collect();
    keys.sort_unstable();
    assert_eq!(keys, (0..30).collect::<Vec<_>>());

    assert_eq!(map.values().count(), 30);
}

#[test]
fn test_abandoned_sequences_do_not_block_writers() {
    let map = ExpiringMap::new();
    for i in 0..1000 {
        map.set(i, i, in_a_minute());
    }

    let taken: Vec<_> = map.iter().take(5).collect();
    assert_eq!(taken.len(), 5);

    let mut values = map.values();
    values.next();
    values.cancel();

    // Writers and fresh traversals proceed normally afterwards
    map.set(5000, 5000, in_a_minute());
    assert_eq!(map.len(), 1001);
}

#[tokio::test]
async fn test_sequence_consumed_from_blocking_task() {
    let map: ExpiringMap<u32, u32> = ExpiringMap::new();
    for i in 0..50 {
        map.set(i, i, in_a_minute());
    }

    let reader = map.clone();
    let count = tokio::task::spawn_blocking(move || reader.keys().count())
        .await
        .expect("Task should not panic");

    assert_eq!(count, 50);
}

// == Configuration ==

#[test]
fn test_map_from_config() {
    let config = MapConfig::from_vars(|name| match name {
        "EXPIRING_MAP_CAPACITY" => Some("256".to_string()),
        "EXPIRING_MAP_SHARD_AMOUNT" => Some("4".to_string()),
        _ => None,
    })
    .unwrap();

    let map: ExpiringMap<u32, &str> = ExpiringMap::from_config(&config).unwrap();
    map.set(1, "one", in_a_minute());

    assert_eq!(map.get(&1), Some("one"));
    assert_eq!(map.stats().hits, 1);
}

#[test]
fn test_invalid_shard_amount_rejected() {
    let config = MapConfig {
        capacity: 0,
        shard_amount: Some(3),
    };

    assert!(ExpiringMap::<u32, u32>::from_config(&config).is_err());
}
