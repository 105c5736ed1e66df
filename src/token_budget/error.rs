//! Budget-exceeded signal

use serde::{Deserialize, Serialize};

/// Raised by a caller whose own post-check finds the daily allowance spent
///
/// Meant to be caught at the API boundary and turned into a rate-limited
/// response with `retry_after_secs` as the Retry-After value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({tokens_used}/{daily_limit} tokens used, resets in {retry_after_secs}s)")]
pub struct BudgetExceeded {
    pub message: String,
    pub tokens_used: u64,
    pub daily_limit: u64,

    /// Seconds until the next UTC midnight
    pub retry_after_secs: u64,
}

impl BudgetExceeded {
    pub fn new(
        message: impl Into<String>,
        tokens_used: u64,
        daily_limit: u64,
        retry_after_secs: u64,
    ) -> Self {
        Self {
            message: message.into(),
            tokens_used,
            daily_limit,
            retry_after_secs,
        }
    }
}
