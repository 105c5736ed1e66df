//! Cached value with an absolute expiry

use chrono::{DateTime, Duration, Utc};

use crate::store::{clock_skew_tolerance, ExpiringRecord, Liveness, RecordError};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    /// Expired strictly after `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl<V> ExpiringRecord for CacheEntry<V> {
    /// Configured TTL; no entry may outlive `now + ttl` (plus clock skew)
    type Policy = Duration;

    fn assess(&mut self, now: DateTime<Utc>, ttl: &Duration) -> Result<Liveness, RecordError> {
        if self.expires_at > now + *ttl + clock_skew_tolerance() {
            return Err(RecordError::BeyondHorizon {
                expires_at: self.expires_at,
                horizon_secs: ttl.num_seconds(),
            });
        }

        Ok(if self.is_expired(now) {
            Liveness::Expired
        } else {
            Liveness::Live
        })
    }
}
