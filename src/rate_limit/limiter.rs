//! Sliding-Window Rate Limiter
//!
//! Counts admitted requests per key within a rolling window. Every check
//! prunes and appends under one `std::sync::Mutex`, so no window of
//! `window_secs` ever holds more than `max_requests` admitted requests for a
//! key.

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::config::RateLimitConfig;
use super::window::{RequestWindow, WindowPolicy};
use crate::cleanup::{CleanupTask, Sweep};
use crate::clock::{system_clock, Clock};
use crate::identity::Identity;
use crate::store::{RecordMap, SweepOutcome};

/// Longest window a caller may ask for (one year)
const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Result of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Requests left in the window after this one (0 when rejected)
    pub remaining: u32,

    /// Seconds before a retry can succeed (0 when allowed)
    pub retry_after_secs: u64,
}

impl RateLimitResult {
    /// Create an allowed result
    pub fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after_secs: 0,
        }
    }

    /// Create a denied result
    pub fn denied(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_secs,
        }
    }
}

/// Snapshot for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStats {
    /// Keys with a window in memory
    pub active_keys: usize,

    /// Timestamps held across all windows
    pub tracked_requests: usize,

    /// Current configuration
    pub config: RateLimitConfig,
}

#[derive(Debug)]
struct LimiterState {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<RecordMap<RequestWindow>>,
}

impl LimiterState {
    fn windows(&self) -> MutexGuard<'_, RecordMap<RequestWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep_now(&self) -> SweepOutcome {
        let now = self.clock.now();
        self.windows().sweep(now, &WindowPolicy::default())
    }
}

#[async_trait]
impl Sweep for LimiterState {
    async fn sweep(&self) -> SweepOutcome {
        self.sweep_now()
    }
}

/// Sliding-window rate limiter
///
/// Cloning yields another handle onto the same windows and cleanup task.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<LimiterState>,
    cleanup: Arc<CleanupTask>,
}

impl RateLimiter {
    /// Create a rate limiter on the system clock
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Create a rate limiter reading time from `clock`
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(LimiterState {
                config,
                clock,
                windows: Mutex::new(RecordMap::new()),
            }),
            cleanup: Arc::new(CleanupTask::new("rate_limit")),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.state.config
    }

    /// Admit or reject one request for `key`, recording it if admitted
    ///
    /// `None` falls back to the anonymous limit and the configured window,
    /// as does a window of zero. A limit of zero rejects every request.
    pub fn check_and_increment(
        &self,
        key: &str,
        max_requests: Option<u32>,
        window_secs: Option<u64>,
    ) -> RateLimitResult {
        let config = &self.state.config;
        let max_requests = max_requests.unwrap_or(config.max_requests_anonymous);
        let window_secs = window_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(config.window_secs)
            .clamp(1, MAX_WINDOW_SECS);
        let span = Duration::seconds(window_secs as i64);

        let now = self.state.clock.now();
        let mut windows = self.state.windows();
        let window = windows.get_or_insert_with(key, || RequestWindow::new(span));
        window.set_span(span);
        window.prune(now);

        let count = window.len();
        if count >= max_requests as usize {
            let retry_after = window.retry_after(now, max_requests);
            tracing::debug!(
                key = %key,
                count,
                max_requests,
                retry_after,
                "Rate limit exceeded"
            );
            return RateLimitResult::denied(retry_after);
        }

        window.record(now);
        RateLimitResult::allowed(max_requests - count as u32 - 1)
    }

    /// Check using the identity's tier limit and the configured window
    pub fn check_identity(&self, identity: &Identity) -> RateLimitResult {
        let limit = self.state.config.limit_for(identity.authenticated);
        self.check_and_increment(identity.key(), Some(limit), None)
    }

    /// Current key and request counts
    pub fn stats(&self) -> RateLimitStats {
        let windows = self.state.windows();
        RateLimitStats {
            active_keys: windows.len(),
            tracked_requests: windows.values().map(RequestWindow::len).sum(),
            config: self.state.config.clone(),
        }
    }

    /// Prune every window and forget keys left empty
    pub fn cleanup(&self) -> SweepOutcome {
        self.state.sweep_now()
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
