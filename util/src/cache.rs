//! # Timed Cache
//!
//! A single-slot, thread-safe store for the most recent value of some asynchronously arriving
//! data along with the time it arrived. Producers (usually a network callback) `put` into the
//! cache, consumers (usually a fixed-rate loop) `get` from it.
//!
//! The cache has two modes:
//! - [`CacheMode::Expiring`]: once the value is older than the cache's maximum age `get` returns
//!   `None`, so a consumer that stalls will never act on old data.
//! - [`CacheMode::Latching`]: `get` always returns the last value. The age can still be checked
//!   with [`TimedCache::is_stale_at`], so consumers can tell "possibly stale" from "gone".

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single-slot cache holding the most recent value and its arrival time.
#[derive(Debug)]
pub struct TimedCache<T> {
    slot: Mutex<Option<TimedEntry<T>>>,

    max_age: Duration,

    mode: CacheMode,
}

/// An entry in a [`TimedCache`].
#[derive(Debug, Clone)]
pub struct TimedEntry<T> {
    /// The stored value
    pub value: T,

    /// The time at which the value arrived
    pub timestamp: DateTime<Utc>,
}

/// Parameters describing a cache, as loaded from a parameter file.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheParams {
    /// Maximum age of the value.
    ///
    /// Units: seconds
    pub max_age_s: f64,

    /// Behaviour of the cache once the value is older than `max_age_s`.
    pub mode: CacheMode,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Behaviour of a [`TimedCache`] once its value is older than the maximum age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Old values are no longer returned.
    Expiring,

    /// Old values are still returned, but reported as stale.
    Latching,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T: Clone> TimedCache<T> {
    /// Create a new empty cache.
    pub fn new(max_age: Duration, mode: CacheMode) -> Self {
        Self {
            slot: Mutex::new(None),
            max_age,
            mode,
        }
    }

    /// Create a new empty cache from its parameters.
    pub fn from_params(params: &CacheParams) -> Self {
        Self::new(crate::time::seconds_to_duration(params.max_age_s), params.mode)
    }

    /// Replace the stored value.
    ///
    /// Last write wins, there is no history.
    pub fn put(&self, value: T, timestamp: DateTime<Utc>) {
        *self.lock() = Some(TimedEntry { value, timestamp });
    }

    /// Get the stored value, applying the cache mode against the current time.
    pub fn get(&self) -> Option<T> {
        self.get_at(Utc::now())
    }

    /// Get the stored value, applying the cache mode against the given time.
    pub fn get_at(&self, now: DateTime<Utc>) -> Option<T> {
        self.entry_at(now).map(|e| e.value)
    }

    /// Get the stored entry (value and timestamp), applying the cache mode against the given time.
    pub fn entry_at(&self, now: DateTime<Utc>) -> Option<TimedEntry<T>> {
        let slot = self.lock();
        let entry = slot.as_ref()?;

        match self.mode {
            CacheMode::Expiring if now - entry.timestamp > self.max_age => None,
            _ => Some(entry.clone()),
        }
    }

    /// Age of the stored value at the given time, or `None` if nothing has been stored.
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.lock().as_ref().map(|e| now - e.timestamp)
    }

    /// Returns true if there is no value, or the value is older than the maximum age.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        match self.age_at(now) {
            Some(age) => age > self.max_age,
            None => true,
        }
    }

    /// A poisoned lock only means a writer panicked mid-`put`, which cannot leave the slot half
    /// written, so the inner value is still used.
    fn lock(&self) -> MutexGuard<'_, Option<TimedEntry<T>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ms(n: i64) -> Duration {
        Duration::milliseconds(n)
    }

    #[test]
    fn test_empty() {
        let cache: TimedCache<u32> = TimedCache::new(ms(200), CacheMode::Latching);
        assert_eq!(cache.get(), None);
        assert!(cache.is_stale_at(Utc::now()));
    }

    #[test]
    fn test_expiring() {
        let cache = TimedCache::new(ms(250), CacheMode::Expiring);
        let t0 = Utc::now();

        cache.put(1u32, t0);
        assert_eq!(cache.get_at(t0 + ms(100)), Some(1));
        assert_eq!(cache.get_at(t0 + ms(250)), Some(1));
        assert_eq!(cache.get_at(t0 + ms(251)), None);
        assert!(cache.is_stale_at(t0 + ms(300)));
    }

    #[test]
    fn test_latching() {
        let cache = TimedCache::new(ms(200), CacheMode::Latching);
        let t0 = Utc::now();

        cache.put(7u32, t0);
        assert_eq!(cache.get_at(t0 + ms(5000)), Some(7));
        assert!(!cache.is_stale_at(t0 + ms(100)));
        assert!(cache.is_stale_at(t0 + ms(5000)));
    }

    #[test]
    fn test_last_write_wins() {
        let cache = TimedCache::new(ms(250), CacheMode::Expiring);
        let t0 = Utc::now();

        cache.put(1u32, t0);
        cache.put(2u32, t0 - ms(100));
        let entry = cache.entry_at(t0).unwrap();
        assert_eq!(entry.value, 2);
        assert_eq!(entry.timestamp, t0 - ms(100));
    }

    #[test]
    fn test_shared_between_threads() {
        use std::{sync::Arc, thread};

        let cache = Arc::new(TimedCache::new(ms(1000), CacheMode::Expiring));
        let producer = cache.clone();

        thread::spawn(move || {
            for i in 0..100u32 {
                producer.put(i, Utc::now());
            }
        })
        .join()
        .unwrap();

        assert_eq!(cache.get(), Some(99));
    }
}
