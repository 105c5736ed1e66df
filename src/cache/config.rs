//! Response Cache Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{env_override, process_env, EnvLookup};

pub const DEFAULT_MAX_SIZE: usize = 500;
pub const DEFAULT_TTL_SECS: u64 = 3600;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 600;

/// Longest TTL honoured (ten years)
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached entries
    pub max_size: usize,

    /// Lifetime of an entry in seconds
    pub ttl_secs: u64,

    /// Interval between background sweeps in seconds
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            ttl_secs: DEFAULT_TTL_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(&process_env);
        config
    }

    /// Apply `ADMISSION_CACHE_*` overrides; unparsable values are ignored
    pub fn apply_overrides(&mut self, lookup: &EnvLookup<'_>) {
        env_override(lookup, "ADMISSION_CACHE_MAX_SIZE", &mut self.max_size);
        env_override(lookup, "ADMISSION_CACHE_TTL_SECS", &mut self.ttl_secs);
        env_override(
            lookup,
            "ADMISSION_CACHE_CLEANUP_SECS",
            &mut self.cleanup_interval_secs,
        );
    }

    /// Entry lifetime
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs.min(MAX_TTL_SECS) as i64)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
