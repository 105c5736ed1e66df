//! Keyed Record Store
//!
//! The map-plus-sweep shape shared by all three components: a map from an
//! identity or request key to a small record that knows when it has gone
//! stale. Locking is left to the owner, so the rate limiter and the cache can
//! wrap a [`RecordMap`] in a `std::sync::Mutex` while the token budget uses a
//! `tokio::sync::Mutex`.
//!
//! A sweep assesses each record in isolation. A record that reports an error,
//! or panics while being assessed, is dropped and logged; the sweep carries
//! on with the remaining keys.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// How far a record may run ahead of the clock before it is treated as
/// malformed. Wall clocks step backwards; small steps must not wipe state.
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 300;

pub fn clock_skew_tolerance() -> Duration {
    Duration::seconds(CLOCK_SKEW_TOLERANCE_SECS)
}

/// State of a record at sweep time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Still within its window, day or TTL
    Live,
    /// Past its useful life; safe to remove
    Expired,
}

/// A record that cannot be assessed sensibly
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The record carries a timestamp ahead of the clock (clock stepped back)
    #[error("record timestamp {recorded} is ahead of the clock ({now})")]
    FromTheFuture {
        recorded: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// The record expires further out than any configured lifetime allows
    #[error("record expiry {expires_at} exceeds the {horizon_secs}s horizon")]
    BeyondHorizon {
        expires_at: DateTime<Utc>,
        horizon_secs: i64,
    },
}

/// A record that can decide whether it is still worth keeping
pub trait ExpiringRecord {
    /// Component settings the assessment depends on (window length, TTL, ...)
    type Policy;

    /// Assess (and, where useful, prune) the record at `now`
    fn assess(&mut self, now: DateTime<Utc>, policy: &Self::Policy)
        -> Result<Liveness, RecordError>;
}

/// What a single sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    /// Records looked at
    pub examined: usize,

    /// Records removed because they expired
    pub removed: usize,

    /// Records dropped because they errored or panicked during assessment
    pub malformed: usize,
}

impl SweepOutcome {
    /// Total records that left the map
    pub fn dropped(&self) -> usize {
        self.removed + self.malformed
    }
}

/// Map from key to record
#[derive(Debug, Clone)]
pub struct RecordMap<R> {
    records: HashMap<String, R>,
}

impl<R> RecordMap<R> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Get the record for `key`, creating it with `create` on first use
    pub fn get_or_insert_with<F>(&mut self, key: &str, create: F) -> &mut R
    where
        F: FnOnce() -> R,
    {
        self.records.entry(key.to_owned()).or_insert_with(create)
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut R> {
        self.records.get_mut(key)
    }

    /// Insert or replace a record, returning the previous one
    pub fn insert(&mut self, key: String, record: R) -> Option<R> {
        self.records.insert(key, record)
    }

    pub fn remove(&mut self, key: &str) -> Option<R> {
        self.records.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record, returning how many there were
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        count
    }

    pub fn values(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    /// Keys of the `n` records that sort lowest by `order`
    pub fn lowest_keys_by<K, F>(&self, n: usize, order: F) -> Vec<String>
    where
        K: Ord,
        F: Fn(&R) -> K,
    {
        let mut ranked: Vec<(K, &String)> = self
            .records
            .iter()
            .map(|(key, record)| (order(record), key))
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0));
        ranked
            .into_iter()
            .take(n)
            .map(|(_, key)| key.clone())
            .collect()
    }
}

impl<R: ExpiringRecord> RecordMap<R> {
    /// Remove every expired or malformed record
    pub fn sweep(&mut self, now: DateTime<Utc>, policy: &R::Policy) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        self.records.retain(|key, record| {
            outcome.examined += 1;
            match catch_unwind(AssertUnwindSafe(|| record.assess(now, policy))) {
                Ok(Ok(Liveness::Live)) => true,
                Ok(Ok(Liveness::Expired)) => {
                    outcome.removed += 1;
                    false
                }
                Ok(Err(error)) => {
                    tracing::warn!(key = %key, error = %error, "Dropping malformed record");
                    outcome.malformed += 1;
                    false
                }
                Err(_) => {
                    tracing::error!(key = %key, "Record assessment panicked; dropping record");
                    outcome.malformed += 1;
                    false
                }
            }
        });

        outcome
    }
}

impl<R> Default for RecordMap<R> {
    fn default() -> Self {
        Self::new()
    }
}
