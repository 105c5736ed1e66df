//! Rate Limit Configuration
//!
//! Tiered request limits for the sliding-window limiter.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{env_override, process_env, EnvLookup};

/// Default rate limits
pub const DEFAULT_MAX_REQUESTS_ANONYMOUS: u32 = 15; // per window
pub const DEFAULT_MAX_REQUESTS_AUTHENTICATED: u32 = 100; // per window
pub const DEFAULT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per window for anonymous sessions
    pub max_requests_anonymous: u32,

    /// Requests per window for authenticated users
    pub max_requests_authenticated: u32,

    /// Sliding window length in seconds
    pub window_secs: u64,

    /// Interval between background sweeps in seconds
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_anonymous: DEFAULT_MAX_REQUESTS_ANONYMOUS,
            max_requests_authenticated: DEFAULT_MAX_REQUESTS_AUTHENTICATED,
            window_secs: DEFAULT_WINDOW_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl RateLimitConfig {
    /// Create a new rate limit configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(&process_env);
        config
    }

    /// Apply `ADMISSION_RATE_LIMIT_*` overrides; unparsable values are ignored
    pub fn apply_overrides(&mut self, lookup: &EnvLookup<'_>) {
        env_override(
            lookup,
            "ADMISSION_RATE_LIMIT_ANONYMOUS",
            &mut self.max_requests_anonymous,
        );
        env_override(
            lookup,
            "ADMISSION_RATE_LIMIT_AUTHENTICATED",
            &mut self.max_requests_authenticated,
        );
        env_override(lookup, "ADMISSION_RATE_LIMIT_WINDOW_SECS", &mut self.window_secs);
        env_override(
            lookup,
            "ADMISSION_RATE_LIMIT_CLEANUP_SECS",
            &mut self.cleanup_interval_secs,
        );
    }

    /// Requests allowed per window for the given tier
    pub fn limit_for(&self, authenticated: bool) -> u32 {
        if authenticated {
            self.max_requests_authenticated
        } else {
            self.max_requests_anonymous
        }
    }

    /// Get cleanup interval
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
