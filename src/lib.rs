//! Admission Guard Library
//!
//! In-process admission control for expensive, externally billed model
//! calls: a sliding-window rate limiter, a daily token budget and a TTL
//! response cache, owned together by an [`AdmissionControl`] context.
//!
//! State is memory-resident and per process. Replicas do not share limits.

pub mod admission;
pub mod cache;
pub mod cleanup;
pub mod clock;
pub mod config;
pub mod identity;
pub mod metrics;
pub mod rate_limit;
pub mod store;
pub mod token_budget;

#[cfg(test)]
mod proptests;

pub use admission::{AdmissionControl, AdmissionError, AdmissionSnapshot, Admitted, Completion};
pub use cache::{cache_key, CacheConfig, ResponseCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use identity::Identity;
pub use rate_limit::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use token_budget::{BudgetCheck, BudgetExceeded, TokenBudget, TokenBudgetConfig};
