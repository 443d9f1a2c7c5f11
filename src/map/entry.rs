//! Entry Module
//!
//! Defines the deadline type and the stored entry wrapping each value.

use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, TimeZone};

/// Stand-in for deadlines too far ahead for `Instant` to represent.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

// == Deadline ==
/// Absolute point in time after which an entry is expired.
///
/// Backed by the monotonic clock. A deadline is exclusive: it has passed as
/// soon as the current instant reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline at the given instant.
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// Deadline `ttl` from now.
    pub fn after(ttl: Duration) -> Self {
        Self(offset(Instant::now(), ttl))
    }

    // == Wall-Clock Conversions ==
    /// Converts a wall-clock time into a monotonic deadline, relative to now.
    ///
    /// Times already in the past map to a deadline that has passed.
    pub fn from_system_time(at: SystemTime) -> Self {
        let now = Instant::now();
        match at.duration_since(SystemTime::now()) {
            Ok(ahead) => Self(offset(now, ahead)),
            Err(behind) => Self(now.checked_sub(behind.duration()).unwrap_or(now)),
        }
    }

    /// Converts a `chrono` timestamp into a monotonic deadline, relative to now.
    pub fn from_datetime<Tz: TimeZone>(at: DateTime<Tz>) -> Self {
        Self::from_system_time(SystemTime::from(at))
    }

    /// The underlying instant.
    pub fn instant(&self) -> Instant {
        self.0
    }

    /// Returns true if the deadline is at or before `now`.
    #[inline]
    pub fn is_passed_at(&self, now: Instant) -> bool {
        self.0 <= now
    }

    /// Returns true if the deadline has passed.
    #[inline]
    pub fn is_passed(&self) -> bool {
        self.is_passed_at(Instant::now())
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

impl From<Instant> for Deadline {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

fn offset(from: Instant, by: Duration) -> Instant {
    from.checked_add(by)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

// == Entry ==
/// A stored value together with its deadline.
///
/// `stamp` is the write version handed out by the owning map. Two entries
/// stored under the same key never share a stamp, so eviction can check that
/// it is removing exactly the entry it observed as expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<V> {
    value: V,
    deadline: Deadline,
    stamp: u64,
}

impl<V> Entry<V> {
    pub(crate) fn new(value: V, deadline: Deadline, stamp: u64) -> Self {
        Self {
            value,
            deadline,
            stamp,
        }
    }

    /// The stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry, returning the stored value.
    pub fn into_value(self) -> V {
        self.value
    }

    /// Point in time at which the entry expires.
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Write version assigned by the owning map.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Checks expiry against an instant the caller already read.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.deadline.is_passed_at(now)
    }

    /// Checks expiry against the current instant.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_passed()
    }
}
