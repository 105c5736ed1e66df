//! Token Budget Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{env_override, process_env, EnvLookup};

/// Default daily budgets
pub const DEFAULT_DAILY_LIMIT_ANONYMOUS: u64 = 75_000; // tokens per UTC day
pub const DEFAULT_DAILY_LIMIT_AUTHENTICATED: u64 = 250_000; // tokens per UTC day
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Token budget configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenBudgetConfig {
    /// Tokens per UTC day for anonymous sessions
    pub daily_limit_anonymous: u64,

    /// Tokens per UTC day for authenticated users
    pub daily_limit_authenticated: u64,

    /// Interval between background sweeps in seconds
    pub cleanup_interval_secs: u64,
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit_anonymous: DEFAULT_DAILY_LIMIT_ANONYMOUS,
            daily_limit_authenticated: DEFAULT_DAILY_LIMIT_AUTHENTICATED,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl TokenBudgetConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(&process_env);
        config
    }

    /// Apply `ADMISSION_TOKEN_BUDGET_*` overrides; unparsable values are ignored
    pub fn apply_overrides(&mut self, lookup: &EnvLookup<'_>) {
        env_override(
            lookup,
            "ADMISSION_TOKEN_BUDGET_ANONYMOUS",
            &mut self.daily_limit_anonymous,
        );
        env_override(
            lookup,
            "ADMISSION_TOKEN_BUDGET_AUTHENTICATED",
            &mut self.daily_limit_authenticated,
        );
        env_override(
            lookup,
            "ADMISSION_TOKEN_BUDGET_CLEANUP_SECS",
            &mut self.cleanup_interval_secs,
        );
    }

    /// Daily limit for the given tier
    pub fn limit_for(&self, authenticated: bool) -> u64 {
        if authenticated {
            self.daily_limit_authenticated
        } else {
            self.daily_limit_anonymous
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
