//! Admission Control
//!
//! The context object a host application builds once at startup and passes
//! to its request handlers. It owns one rate limiter, one token budget and
//! one response cache, starts their cleanup tasks together and stops them in
//! reverse order.
//!
//! [`AdmissionControl::execute`] runs the guarded path for one expensive call:
//!
//! ```text
//! rate limit ──reject──► RateLimited
//!     │
//!     ▼
//! cache ──hit──► cached value (no budget, no call)
//!     │
//!     ▼
//! budget pre-check ──exceeded──► BudgetExceeded
//!     │
//!     ▼
//! call ──► record usage ──► cache store ──► value
//! ```

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::cache::{cache_key, CacheStats, ResponseCache};
use crate::clock::{system_clock, Clock};
use crate::config::Config;
use crate::identity::Identity;
use crate::metrics::AdmissionMetrics;
use crate::rate_limit::{RateLimitStats, RateLimiter};
use crate::token_budget::{BudgetExceeded, TokenBudget, TokenBudgetStats};

/// Point-in-time view of all three components, for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionSnapshot {
    /// Timestamp of data generation
    pub timestamp: DateTime<Utc>,

    pub rate_limit: RateLimitStats,
    pub token_budget: TokenBudgetStats,
    pub cache: CacheStats,
}

/// What the guarded call returns
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<V> {
    pub value: V,

    /// Tokens the call actually consumed
    pub tokens_used: u64,
}

/// A request that made it through admission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Admitted<V> {
    pub value: V,

    /// Served from the response cache without calling upstream
    pub cached: bool,

    /// Tokens recorded for this request (0 when cached)
    pub tokens_used: u64,
}

/// Why a request did not produce a value
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("Rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),

    #[error("Upstream call failed: {0:#}")]
    Upstream(anyhow::Error),
}

impl AdmissionError {
    /// Value for a Retry-After header, if the client should retry later
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            Self::BudgetExceeded(err) => Some(err.retry_after_secs),
            Self::Upstream(_) => None,
        }
    }
}

/// Rate limiter, token budget and response cache behind one handle
#[derive(Debug)]
pub struct AdmissionControl<V> {
    config: Config,
    clock: Arc<dyn Clock>,
    rate_limiter: RateLimiter,
    token_budget: TokenBudget,
    cache: ResponseCache<V>,
    metrics: AdmissionMetrics,
}

impl<V> AdmissionControl<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Build all components from a validated configuration
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_clock(config, system_clock())
    }

    /// Build all components on a shared clock
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        config.validate()?;
        let metrics = AdmissionMetrics::new().context("Failed to register admission metrics")?;

        Ok(Self {
            rate_limiter: RateLimiter::with_clock(config.rate_limit.clone(), clock.clone()),
            token_budget: TokenBudget::with_clock(config.token_budget.clone(), clock.clone()),
            cache: ResponseCache::with_clock(config.cache.clone(), clock.clone()),
            config,
            clock,
            metrics,
        })
    }

    /// Start every cleanup task. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        self.rate_limiter.start_cleanup_task();
        self.token_budget.start_cleanup_task();
        self.cache.start_cleanup_task();
        tracing::info!("Admission control started");
    }

    /// Stop every cleanup task, in reverse start order
    pub async fn shutdown(&self) {
        self.cache.stop_cleanup_task().await;
        self.token_budget.stop_cleanup_task().await;
        self.rate_limiter.stop_cleanup_task().await;
        tracing::info!("Admission control stopped");
    }

    /// Whether all three cleanup tasks are running
    pub fn is_running(&self) -> bool {
        self.rate_limiter.is_cleanup_running()
            && self.token_budget.is_cleanup_running()
            && self.cache.is_cleanup_running()
    }

    /// Run `call` for `identity` if admission allows it
    ///
    /// `input` is the logical request used as the cache key;
    /// `estimated_tokens` is the pre-check estimate.
    pub async fn execute<F, Fut>(
        &self,
        identity: &Identity,
        input: &Value,
        estimated_tokens: u64,
        call: F,
    ) -> Result<Admitted<V>, AdmissionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Completion<V>>>,
    {
        let decision = self.rate_limiter.check_identity(identity);
        let outcome = if decision.allowed { "allowed" } else { "rejected" };
        self.metrics
            .rate_limit_decisions
            .with_label_values(&[outcome])
            .inc();
        if !decision.allowed {
            return Err(AdmissionError::RateLimited {
                retry_after_secs: decision.retry_after_secs,
            });
        }

        let key = cache_key(input);
        if let Some(value) = self.cache.get_by_key(&key) {
            self.metrics.cache_lookups.with_label_values(&["hit"]).inc();
            return Ok(Admitted {
                value,
                cached: true,
                tokens_used: 0,
            });
        }
        self.metrics.cache_lookups.with_label_values(&["miss"]).inc();

        let check = self
            .token_budget
            .require_budget(identity.key(), estimated_tokens, identity.authenticated)
            .await;
        let outcome = if check.is_ok() { "allowed" } else { "exceeded" };
        self.metrics.budget_checks.with_label_values(&[outcome]).inc();
        check?;

        let completion = call().await.map_err(AdmissionError::Upstream)?;

        let total = self
            .token_budget
            .record_usage(identity.key(), completion.tokens_used)
            .await;
        self.metrics.tokens_recorded.inc_by(completion.tokens_used);
        tracing::debug!(
            identity = %identity,
            tokens_used = completion.tokens_used,
            total_today = total,
            "Recorded token usage"
        );

        self.cache.set_by_key(key, completion.value.clone());

        Ok(Admitted {
            value: completion.value,
            cached: false,
            tokens_used: completion.tokens_used,
        })
    }

    pub async fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            timestamp: self.clock.now(),
            rate_limit: self.rate_limiter.stats(),
            token_budget: self.token_budget.stats().await,
            cache: self.cache.stats(),
        }
    }

    /// Refresh the tracked-key gauges and render all metrics
    pub async fn gather_metrics(&self) -> anyhow::Result<String> {
        let snapshot = self.snapshot().await;
        let gauges = &self.metrics.tracked_keys;
        gauges
            .with_label_values(&["rate_limit"])
            .set(snapshot.rate_limit.active_keys as i64);
        gauges
            .with_label_values(&["token_budget"])
            .set(snapshot.token_budget.active_trackers as i64);
        gauges
            .with_label_values(&["cache"])
            .set(snapshot.cache.total_entries as i64);

        self.metrics.gather()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn token_budget(&self) -> &TokenBudget {
        &self.token_budget
    }

    pub fn cache(&self) -> &ResponseCache<V> {
        &self.cache
    }

    pub fn metrics(&self) -> &AdmissionMetrics {
        &self.metrics
    }
}
