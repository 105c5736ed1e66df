// Prometheus metrics for admission decisions
//
// Counters live on a registry owned by each AdmissionControl instance, so
// several instances (and parallel tests) never share series:
// - Rate limit decisions (counter, by outcome)
// - Token budget pre-checks (counter, by outcome)
// - Tokens recorded (counter)
// - Cache lookups (counter, by result)
// - Tracked keys per component (gauge)

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::fmt;

/// Metric families for one admission context
#[derive(Clone)]
pub struct AdmissionMetrics {
    registry: Registry,

    /// `outcome` = `allowed` | `rejected`
    pub rate_limit_decisions: IntCounterVec,

    /// `outcome` = `allowed` | `exceeded`
    pub budget_checks: IntCounterVec,

    pub tokens_recorded: IntCounter,

    /// `result` = `hit` | `miss`
    pub cache_lookups: IntCounterVec,

    /// `component` = `rate_limit` | `token_budget` | `cache`
    pub tracked_keys: IntGaugeVec,
}

impl AdmissionMetrics {
    /// Create the metric families and register them on a fresh registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let rate_limit_decisions = IntCounterVec::new(
            Opts::new(
                "admission_rate_limit_decisions_total",
                "Rate limiter decisions by outcome",
            ),
            &["outcome"],
        )?;
        let budget_checks = IntCounterVec::new(
            Opts::new(
                "admission_token_budget_checks_total",
                "Token budget pre-checks by outcome",
            ),
            &["outcome"],
        )?;
        let tokens_recorded = IntCounter::new(
            "admission_tokens_recorded_total",
            "Tokens recorded against daily budgets",
        )?;
        let cache_lookups = IntCounterVec::new(
            Opts::new("admission_cache_lookups_total", "Response cache lookups by result"),
            &["result"],
        )?;
        let tracked_keys = IntGaugeVec::new(
            Opts::new("admission_tracked_keys", "Keys currently held by each component"),
            &["component"],
        )?;

        registry.register(Box::new(rate_limit_decisions.clone()))?;
        registry.register(Box::new(budget_checks.clone()))?;
        registry.register(Box::new(tokens_recorded.clone()))?;
        registry.register(Box::new(cache_lookups.clone()))?;
        registry.register(Box::new(tracked_keys.clone()))?;

        Ok(Self {
            registry,
            rate_limit_decisions,
            budget_checks,
            tokens_recorded,
            cache_lookups,
            tracked_keys,
        })
    }

    /// Render every family in the Prometheus text format
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl fmt::Debug for AdmissionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionMetrics")
            .field("families", &self.registry.gather().len())
            .finish_non_exhaustive()
    }
}
