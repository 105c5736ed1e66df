// Admission Hot Path Benchmarks
//
// Measures the per-request cost of each admission decision.
//
// Key metrics:
// - Rate limit check under a populated window
// - Cache key derivation for a typical answers payload
// - Cache hit lookup
// - Token budget check (async mutex)

use admission_guard::cache::{cache_key, CacheConfig, ResponseCache};
use admission_guard::rate_limit::{RateLimitConfig, RateLimiter};
use admission_guard::token_budget::{TokenBudget, TokenBudgetConfig};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use std::hint::black_box;
use tokio::runtime::Runtime;

fn answers(fields: usize) -> Value {
    let map: serde_json::Map<String, Value> = (0..fields)
        .map(|i| {
            (
                format!("question_{i}"),
                json!({ "value": format!("answer {i}"), "label": "Answer" }),
            )
        })
        .collect();
    Value::Object(map)
}

/// Benchmark: sliding-window check with a window already holding requests
fn bench_rate_limit_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit_check");

    for held in [0u32, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(held), &held, |b, &held| {
            let limiter = RateLimiter::new(RateLimitConfig::default());
            for _ in 0..held {
                limiter.check_and_increment("bench", Some(u32::MAX), Some(3600));
            }
            b.iter(|| {
                black_box(limiter.check_and_increment(
                    black_box("bench"),
                    Some(u32::MAX),
                    Some(3600),
                ))
            });
        });
    }

    group.finish();
}

/// Benchmark: key derivation over payloads of growing size
fn bench_cache_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_key");

    for fields in [4usize, 16, 64] {
        let input = answers(fields);
        group.bench_with_input(BenchmarkId::from_parameter(fields), &input, |b, input| {
            b.iter(|| black_box(cache_key(black_box(input))));
        });
    }

    group.finish();
}

/// Benchmark: cache hit in a full cache
fn bench_cache_hit(c: &mut Criterion) {
    let cache: ResponseCache<String> = ResponseCache::new(CacheConfig::default());
    for i in 0..500 {
        cache.set(&json!({ "n": i }), format!("value {i}"));
    }
    let lookup = json!({ "n": 250 });

    c.bench_function("cache_hit", |b| {
        b.iter(|| black_box(cache.get(black_box(&lookup))));
    });
}

/// Benchmark: token budget pre-check
fn bench_budget_check(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let budget = TokenBudget::new(TokenBudgetConfig::default());
    rt.block_on(budget.record_usage("bench", 10_000));

    c.bench_function("budget_check", |b| {
        b.iter(|| black_box(rt.block_on(budget.check_budget("bench", 800, false))));
    });
}

criterion_group!(
    benches,
    bench_rate_limit_check,
    bench_cache_key,
    bench_cache_hit,
    bench_budget_check
);
criterion_main!(benches);
