//! Sliding Request Window
//!
//! Per-key record of admitted request timestamps, kept in ascending order so
//! that pruning only ever pops from the front.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use crate::store::{clock_skew_tolerance, ExpiringRecord, Liveness, RecordError};

/// Timestamps of the requests admitted for one key
#[derive(Debug, Clone)]
pub struct RequestWindow {
    timestamps: VecDeque<DateTime<Utc>>,

    /// Window length the key was last checked with
    span: Duration,
}

impl RequestWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            timestamps: VecDeque::new(),
            span,
        }
    }

    /// Adopt the window length of the latest check; sweeps prune with it
    pub fn set_span(&mut self, span: Duration) {
        self.span = span;
    }

    /// Drop every timestamp at or before `now - span`
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.span;
        while self.timestamps.front().is_some_and(|ts| *ts <= cutoff) {
            self.timestamps.pop_front();
        }
    }

    /// Record an admitted request, keeping the sequence ordered
    pub fn record(&mut self, at: DateTime<Utc>) {
        let idx = self.timestamps.partition_point(|ts| *ts <= at);
        self.timestamps.insert(idx, at);
    }

    /// Requests currently counted against the key
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.timestamps.back().copied()
    }

    /// Whole seconds until enough requests age out to admit one more
    ///
    /// Assumes the window was pruned at `now`. Clamped to `[1, span]`.
    pub fn retry_after(&self, now: DateTime<Utc>, max_requests: u32) -> u64 {
        let window_secs = self.span.num_seconds().max(1);
        let excess = self.timestamps.len().saturating_sub(max_requests as usize);

        let secs = match self.timestamps.get(excess) {
            Some(must_expire) if max_requests > 0 => {
                (*must_expire + self.span - now).num_seconds()
            }
            _ => window_secs,
        };

        secs.clamp(1, window_secs) as u64
    }
}

/// Settings a window is assessed against during a sweep
#[derive(Debug, Clone, Copy)]
pub struct WindowPolicy {
    pub future_tolerance: Duration,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            future_tolerance: clock_skew_tolerance(),
        }
    }
}

impl ExpiringRecord for RequestWindow {
    type Policy = WindowPolicy;

    fn assess(&mut self, now: DateTime<Utc>, policy: &WindowPolicy) -> Result<Liveness, RecordError> {
        if let Some(newest) = self.newest() {
            if newest > now + policy.future_tolerance {
                return Err(RecordError::FromTheFuture {
                    recorded: newest,
                    now,
                });
            }
        }

        self.prune(now);
        Ok(if self.is_empty() {
            Liveness::Expired
        } else {
            Liveness::Live
        })
    }
}
