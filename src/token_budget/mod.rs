//! Daily Token Budget Module
//!
//! Caps cumulative token spend per identity per UTC calendar day.
//!
//! # Architecture
//!
//! ```text
//! check_budget ──┐                 ┌── cleanup task (hourly)
//!                ▼                 ▼
//!        tokio::sync::Mutex<RecordMap<TokenUsage>>
//!                ▲
//! record_usage ──┘
//! ```
//!
//! The pre-check and the record are separate critical sections; see
//! [`TokenBudget`] for what that means under concurrent load.

pub mod config;
pub mod error;
pub mod tracker;
pub mod usage;

pub use config::TokenBudgetConfig;
pub use error::BudgetExceeded;
pub use tracker::{
    estimate_tokens, BudgetCheck, TokenBudget, TokenBudgetStats, UsageSnapshot,
    DEFAULT_COMPLETION_ALLOWANCE,
};
pub use usage::{day_start_of, seconds_until_reset, TokenUsage};
