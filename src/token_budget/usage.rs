//! Daily Usage Record
//!
//! UTC midnight is the only reset boundary. A record whose `day_start` is
//! behind the current day is reset before it is read or written.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{clock_skew_tolerance, ExpiringRecord, Liveness, RecordError};

/// Midnight UTC of the day containing `now`
pub fn day_start_of(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Next UTC midnight after `now`
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    day_start_of(now) + Duration::days(1)
}

/// Whole seconds until the next UTC midnight, at least 1
pub fn seconds_until_reset(now: DateTime<Utc>) -> u64 {
    (next_reset(now) - now).num_seconds().max(1) as u64
}

/// Tokens spent by one key on one UTC day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub tokens_used: u64,
    pub day_start: DateTime<Utc>,
}

impl TokenUsage {
    /// Fresh record for the day containing `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            tokens_used: 0,
            day_start: day_start_of(now),
        }
    }

    /// Reset the counter if `now` falls on a later day. Returns whether it reset.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let today = day_start_of(now);
        if today > self.day_start {
            self.tokens_used = 0;
            self.day_start = today;
            true
        } else {
            false
        }
    }

    /// Add tokens after rolling over, returning the day's total
    pub fn add(&mut self, tokens: u64, now: DateTime<Utc>) -> u64 {
        self.roll_over(now);
        self.tokens_used = self.tokens_used.saturating_add(tokens);
        self.tokens_used
    }

    pub fn remaining(&self, limit: u64) -> u64 {
        limit.saturating_sub(self.tokens_used)
    }

    pub fn fits(&self, estimated_tokens: u64, limit: u64) -> bool {
        self.tokens_used.saturating_add(estimated_tokens) <= limit
    }
}

impl ExpiringRecord for TokenUsage {
    type Policy = ();

    fn assess(&mut self, now: DateTime<Utc>, _: &()) -> Result<Liveness, RecordError> {
        let today = day_start_of(now);
        if self.day_start > day_start_of(now + clock_skew_tolerance()) {
            return Err(RecordError::FromTheFuture {
                recorded: self.day_start,
                now,
            });
        }

        Ok(if self.day_start < today {
            Liveness::Expired
        } else {
            Liveness::Live
        })
    }
}
