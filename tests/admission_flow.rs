use admission_guard::cache::{CacheConfig, ResponseCache};
use admission_guard::rate_limit::{RateLimitConfig, RateLimiter};
use admission_guard::token_budget::{TokenBudget, TokenBudgetConfig};
use admission_guard::{
    AdmissionControl, AdmissionError, Completion, Config, Identity, ManualClock,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;

async fn upstream(tokens_used: u64) -> anyhow::Result<Completion<String>> {
    Ok(Completion {
        value: "scored".to_string(),
        tokens_used,
    })
}

#[test]
fn test_fifteen_requests_then_rejection() {
    let limiter = RateLimiter::new(RateLimitConfig::default());

    let mut last = u32::MAX;
    for _ in 0..15 {
        let result = limiter.check_and_increment("session:abc", Some(15), Some(60));
        assert!(result.allowed);
        assert!(result.remaining < last);
        last = result.remaining;
    }
    assert_eq!(last, 0);

    let result = limiter.check_and_increment("session:abc", Some(15), Some(60));
    assert!(!result.allowed);
    assert_eq!(result.remaining, 0);
    assert!(result.retry_after_secs > 0);
}

#[tokio::test]
async fn test_anonymous_estimate_over_daily_limit() {
    let budget = TokenBudget::new(TokenBudgetConfig::default());
    let check = budget.check_budget("session:abc", 80_000, false).await;

    assert!(!check.allowed);
    assert_eq!(check.remaining, 75_000);
    assert_eq!(check.limit, 75_000);
}

#[test]
fn test_cache_entry_expires_after_ttl() {
    let cache: ResponseCache<String> = ResponseCache::new(CacheConfig {
        max_size: 10,
        ttl_secs: 1,
        cleanup_interval_secs: 600,
    });
    let answers = json!({"industry": {"value": "logistics"}, "size": "large"});

    cache.set(&answers, "recommendations".to_string());
    assert_eq!(cache.get(&answers), Some("recommendations".to_string()));

    std::thread::sleep(std::time::Duration::from_millis(1100));
    assert_eq!(cache.get(&answers), None);
}

#[tokio::test(start_paused = true)]
async fn test_idle_key_swept_by_background_task() {
    let clock = ManualClock::starting_now();
    let limiter = RateLimiter::with_clock(RateLimitConfig::default(), Arc::new(clock.clone()));

    limiter.check_and_increment("session:idle", None, None);
    assert_eq!(limiter.stats().active_keys, 1);

    assert!(limiter.start_cleanup_task());
    clock.advance(Duration::seconds(600));
    tokio::time::sleep(std::time::Duration::from_secs(601)).await;

    assert_eq!(limiter.stats().active_keys, 0);
    limiter.stop_cleanup_task().await;
}

#[tokio::test]
async fn test_usage_accumulates_within_day() {
    let budget = TokenBudget::new(TokenBudgetConfig::default());
    budget.record_usage("user:7", 1000).await;
    let total = budget.record_usage("user:7", 1000).await;

    assert_eq!(total, 2000);
    assert_eq!(budget.usage("user:7", true).await.tokens_used, 2000);
}

#[tokio::test]
async fn test_guarded_flow_across_midnight() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 14, 23, 0, 0).unwrap());
    let mut config = Config::default();
    config.token_budget.daily_limit_anonymous = 3000;
    let control: AdmissionControl<String> =
        AdmissionControl::with_clock(config, Arc::new(clock.clone())).unwrap();
    let who = Identity::session("night-owl");

    let first = control
        .execute(&who, &json!({"q": 1}), 1000, || upstream(2500))
        .await
        .unwrap();
    assert!(!first.cached);

    // Same logical input, different shape: served from cache at no cost
    let again = control
        .execute(&who, &json!({"q": {"value": 1}}), 1000, || upstream(2500))
        .await
        .unwrap();
    assert!(again.cached);

    let err = control
        .execute(&who, &json!({"q": 2}), 1000, || upstream(2500))
        .await
        .unwrap_err();
    match err {
        AdmissionError::BudgetExceeded(exceeded) => {
            assert_eq!(exceeded.tokens_used, 2500);
            assert_eq!(exceeded.retry_after_secs, 3600);
        }
        other => panic!("expected budget exhaustion, got {other}"),
    }

    clock.advance(Duration::hours(1));
    let fresh = control
        .execute(&who, &json!({"q": 2}), 1000, || upstream(2500))
        .await
        .unwrap();
    assert!(!fresh.cached);
    assert_eq!(control.token_budget().usage(who.key(), false).await.tokens_used, 2500);
}

#[tokio::test]
async fn test_authenticated_users_get_higher_limits() {
    let mut config = Config::default();
    config.rate_limit.max_requests_anonymous = 2;
    config.rate_limit.max_requests_authenticated = 4;
    let control: AdmissionControl<String> = AdmissionControl::new(config).unwrap();

    let anonymous = Identity::session("s");
    let user = Identity::user("u");

    let mut anonymous_admitted = 0;
    let mut user_admitted = 0;
    for i in 0..6 {
        let input = json!({ "n": i });
        if control.execute(&anonymous, &input, 10, || upstream(10)).await.is_ok() {
            anonymous_admitted += 1;
        }
        if control.execute(&user, &input, 10, || upstream(10)).await.is_ok() {
            user_admitted += 1;
        }
    }

    assert_eq!(anonymous_admitted, 2);
    assert_eq!(user_admitted, 4);
}
