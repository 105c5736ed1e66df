//! Property-Based Tests for Admission Components
//!
//! Invariants checked against random inputs:
//!
//! - **Rate Limiter**: no window ever admits more than `max_requests`, and a
//!   rejection always carries a retry delay within `[1, window]`
//! - **Token Budget**: a check fails exactly when `used + estimate > limit`
//! - **Cache Keys**: wrapping a top-level field in `{"value": ..}` never changes the key
//! - **Cache Size**: no sequence of inserts grows past `max_size`
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib proptests
//! ```

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cache::{cache_key, CacheConfig, ResponseCache};
use crate::clock::{Clock, ManualClock};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::token_budget::{TokenBudget, TokenBudgetConfig};

// Helper: JSON scalars and shallow containers
fn arb_json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[a-z0-9 ]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-u]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn manual_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap())
}

// ============================================================================
// Rate Limiter Properties
// ============================================================================

proptest! {
    /// Property: no window of `window_secs` holds more than `max` admits
    #[test]
    fn prop_window_never_exceeds_limit(
        max in 1u32..20,
        window_secs in 1u64..120,
        gaps_ms in prop::collection::vec(0i64..5_000, 1..120),
    ) {
        let clock = manual_clock();
        let limiter = RateLimiter::with_clock(RateLimitConfig::default(), Arc::new(clock.clone()));
        let window = Duration::seconds(window_secs as i64);
        let mut admitted = Vec::new();

        for gap in gaps_ms {
            clock.advance(Duration::milliseconds(gap));
            let now = clock.now();
            let result = limiter.check_and_increment("k", Some(max), Some(window_secs));

            if result.allowed {
                admitted.push(now);
                let in_window = admitted.iter().filter(|ts| **ts > now - window).count();
                prop_assert!(in_window <= max as usize);
            } else {
                prop_assert_eq!(result.remaining, 0);
                prop_assert!(result.retry_after_secs >= 1);
                prop_assert!(result.retry_after_secs <= window_secs);
            }
        }
    }

    /// Property: `remaining` counts down by one per admit from `max - 1`
    #[test]
    fn prop_remaining_counts_down(max in 1u32..50) {
        let limiter = RateLimiter::with_clock(RateLimitConfig::default(), Arc::new(manual_clock()));
        for i in 0..max {
            let result = limiter.check_and_increment("k", Some(max), Some(60));
            prop_assert!(result.allowed);
            prop_assert_eq!(result.remaining, max - i - 1);
        }
        prop_assert!(!limiter.check_and_increment("k", Some(max), Some(60)).allowed);
    }
}

// ============================================================================
// Token Budget Properties
// ============================================================================

proptest! {
    /// Property: check fails iff used + estimate > limit
    #[test]
    fn prop_budget_check_matches_arithmetic(
        used in 0u64..300_000,
        estimate in 0u64..300_000,
        authenticated in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let budget = TokenBudget::with_clock(TokenBudgetConfig::default(), Arc::new(manual_clock()));

        let check = runtime.block_on(async {
            budget.record_usage("k", used).await;
            budget.check_budget("k", estimate, authenticated).await
        });

        let limit = if authenticated { 250_000 } else { 75_000 };
        prop_assert_eq!(check.limit, limit);
        prop_assert_eq!(check.allowed, used + estimate <= limit);
        prop_assert_eq!(check.remaining, limit.saturating_sub(used));
    }
}

// ============================================================================
// Response Cache Properties
// ============================================================================

proptest! {
    /// Property: a wrapped top-level field and its bare value share a key
    #[test]
    fn prop_wrapper_does_not_change_key(field in "[a-z]{1,8}", value in arb_json_value()) {
        let bare = json!({ field.clone(): value.clone() });
        let wrapped = json!({ field: { "value": value, "label": "ignored" } });
        prop_assert_eq!(cache_key(&bare), cache_key(&wrapped));
    }

    /// Property: cache keys are 16 lowercase hex characters
    #[test]
    fn prop_key_shape(value in arb_json_value()) {
        let key = cache_key(&value);
        prop_assert_eq!(key.len(), 16);
        prop_assert!(key.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    /// Property: size never exceeds max_size
    #[test]
    fn prop_cache_bounded(
        max_size in 1usize..40,
        inserts in prop::collection::vec((0u32..200, 0i64..30), 0..300),
    ) {
        let clock = manual_clock();
        let config = CacheConfig { max_size, ttl_secs: 60, cleanup_interval_secs: 600 };
        let cache: ResponseCache<u32> = ResponseCache::with_clock(config, Arc::new(clock.clone()));

        for (key, gap) in inserts {
            clock.advance(Duration::seconds(gap));
            cache.set(&json!(key), key);
            prop_assert!(cache.stats().total_entries <= max_size);
        }
    }
}
