//! Daily Token Budget Tracker
//!
//! Async-side counterpart of the rate limiter: a `tokio::sync::Mutex`-guarded
//! map from key to the day's token spend. `check_budget` and `record_usage`
//! lock separately, so concurrent requests for one key may both pass the
//! check before either records. The budget is a soft cap.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::config::TokenBudgetConfig;
use super::error::BudgetExceeded;
use super::usage::{seconds_until_reset, TokenUsage};
use crate::cleanup::{CleanupTask, Sweep};
use crate::clock::{system_clock, Clock};
use crate::store::{RecordMap, SweepOutcome};

/// Completion tokens assumed on top of the prompt when estimating a call
pub const DEFAULT_COMPLETION_ALLOWANCE: u64 = 800;

/// Rough token count for a prompt: four characters per token plus the
/// expected completion
pub fn estimate_tokens(prompt: &str, completion_allowance: u64) -> u64 {
    (prompt.len() as u64 / 4).saturating_add(completion_allowance)
}

/// Outcome of a budget pre-check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCheck {
    /// Whether `tokens_used + estimated <= limit`
    pub allowed: bool,

    /// Allowance left today, before the estimated call
    pub remaining: u64,

    /// Daily limit applied
    pub limit: u64,

    /// Tokens already spent today
    pub tokens_used: u64,
}

/// Usage report for a single key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub tokens_used: u64,
    pub daily_limit: u64,
    pub remaining: u64,
    pub percentage_used: u64,
}

/// Snapshot for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBudgetStats {
    /// Keys with a usage record in memory
    pub active_trackers: usize,

    /// Tokens recorded across all keys
    pub total_tokens_today: u64,

    /// Current configuration
    pub config: TokenBudgetConfig,
}

#[derive(Debug)]
struct BudgetState {
    config: TokenBudgetConfig,
    clock: Arc<dyn Clock>,
    usage: Mutex<RecordMap<TokenUsage>>,
}

#[async_trait]
impl Sweep for BudgetState {
    async fn sweep(&self) -> SweepOutcome {
        let mut usage = self.usage.lock().await;
        usage.sweep(self.clock.now(), &())
    }
}

/// Per-key daily token budget
#[derive(Debug, Clone)]
pub struct TokenBudget {
    state: Arc<BudgetState>,
    cleanup: Arc<CleanupTask>,
}

impl TokenBudget {
    pub fn new(config: TokenBudgetConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: TokenBudgetConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(BudgetState {
                config,
                clock,
                usage: Mutex::new(RecordMap::new()),
            }),
            cleanup: Arc::new(CleanupTask::new("token_budget")),
        }
    }

    pub fn config(&self) -> &TokenBudgetConfig {
        &self.state.config
    }

    pub fn limit_for(&self, authenticated: bool) -> u64 {
        self.state.config.limit_for(authenticated)
    }

    /// Whether `estimated_tokens` fits in what is left of today's allowance
    pub async fn check_budget(
        &self,
        key: &str,
        estimated_tokens: u64,
        authenticated: bool,
    ) -> BudgetCheck {
        let limit = self.limit_for(authenticated);
        let now = self.state.clock.now();

        let mut usage = self.state.usage.lock().await;
        let record = usage.get_or_insert_with(key, || TokenUsage::new(now));
        if record.roll_over(now) {
            tracing::debug!(key = %key, "Token budget reset for new day");
        }

        let check = BudgetCheck {
            allowed: record.fits(estimated_tokens, limit),
            remaining: record.remaining(limit),
            limit,
            tokens_used: record.tokens_used,
        };

        if !check.allowed {
            tracing::debug!(
                key = %key,
                estimated_tokens,
                tokens_used = check.tokens_used,
                limit,
                "Token budget would be exceeded"
            );
        }

        check
    }

    /// Add actual usage to today's counter, returning the day's total
    ///
    /// Never re-checks the limit.
    pub async fn record_usage(&self, key: &str, tokens: u64) -> u64 {
        let now = self.state.clock.now();
        let mut usage = self.state.usage.lock().await;
        usage
            .get_or_insert_with(key, || TokenUsage::new(now))
            .add(tokens, now)
    }

    /// Pre-check that raises [`BudgetExceeded`] instead of returning a denial
    pub async fn require_budget(
        &self,
        key: &str,
        estimated_tokens: u64,
        authenticated: bool,
    ) -> Result<BudgetCheck, BudgetExceeded> {
        let check = self
            .check_budget(key, estimated_tokens, authenticated)
            .await;
        if check.allowed {
            return Ok(check);
        }

        Err(BudgetExceeded::new(
            "Daily token budget exceeded",
            check.tokens_used,
            check.limit,
            seconds_until_reset(self.state.clock.now()),
        ))
    }

    /// Today's usage for `key`; does not create a record
    pub async fn usage(&self, key: &str, authenticated: bool) -> UsageSnapshot {
        let limit = self.limit_for(authenticated);
        let now = self.state.clock.now();

        let mut usage = self.state.usage.lock().await;
        let tokens_used = match usage.get_mut(key) {
            Some(record) => {
                record.roll_over(now);
                record.tokens_used
            }
            None => 0,
        };

        let percentage_used = match (limit, tokens_used) {
            (_, 0) => 0,
            (0, _) => 100,
            (limit, used) => used.saturating_mul(100) / limit,
        };

        UsageSnapshot {
            tokens_used,
            daily_limit: limit,
            remaining: limit.saturating_sub(tokens_used),
            percentage_used,
        }
    }

    pub async fn stats(&self) -> TokenBudgetStats {
        let usage = self.state.usage.lock().await;
        TokenBudgetStats {
            active_trackers: usage.len(),
            total_tokens_today: usage
                .values()
                .fold(0u64, |total, record| total.saturating_add(record.tokens_used)),
            config: self.state.config.clone(),
        }
    }

    /// Forget every record from a previous day
    pub async fn cleanup(&self) -> SweepOutcome {
        self.state.sweep().await
    }

    /// Start the periodic sweep. Must be called from within a Tokio runtime.
    pub fn start_cleanup_task(&self) -> bool {
        let target: Arc<dyn Sweep> = self.state.clone();
        self.cleanup
            .start(self.state.config.cleanup_interval(), target)
    }

    pub async fn stop_cleanup_task(&self) {
        self.cleanup.stop().await;
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup.is_running()
    }
}
