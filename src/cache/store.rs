//! Response Cache
//!
//! TTL-bounded memo of expensive results, keyed by [`cache_key`]. When a new
//! key arrives at capacity the cache first purges expired entries and, if
//! still full, evicts the tenth of entries closest to expiry. Reads do not
//! refresh an entry, so this approximates least-recently-set rather than
//! least-recently-used.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::key::cache_key;
use crate::cleanup::{CleanupTask, Sweep};
use crate::clock::{system_clock, Clock};
use crate::store::{RecordMap, SweepOutcome};

/// Snapshot for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub config: CacheConfig,
}

#[derive(Debug)]
struct CacheState<V> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    entries: Mutex<RecordMap<CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> CacheState<V> {
    fn entries(&self) -> MutexGuard<'_, RecordMap<CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep_now(&self) -> SweepOutcome {
        let now = self.clock.now();
        self.entries().sweep(now, &self.config.ttl())
    }
}

#[async_trait]
impl<V: Send + Sync + 'static> Sweep for CacheState<V> {
    async fn sweep(&self) -> SweepOutcome {
        self.sweep_now()
    }
}

/// Bounded TTL cache
///
/// Cloning yields another handle onto the same entries.
#[derive(Debug, Clone)]
pub struct ResponseCache<V> {
    state: Arc<CacheState<V>>,
    cleanup: Arc<CleanupTask>,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(CacheState {
                config,
                clock,
                entries: Mutex::new(RecordMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
            cleanup: Arc::new(CleanupTask::new("cache")),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.state.config
    }

    /// Cached value for the logical input, if present and unexpired
    pub fn get(&self, input: &Value) -> Option<V> {
        self.get_by_key(&cache_key(input))
    }

    /// Lookup by a key already derived with [`cache_key`]
    pub fn get_by_key(&self, key: &str) -> Option<V> {
        let now = self.state.clock.now();
        let mut entries = self.state.entries();

        let value = match entries.get(key) {
            None => {
                tracing::debug!(key = %key, "Cache miss");
                None
            }
            Some(entry) if entry.is_expired(now) => {
                tracing::debug!(key = %key, "Cache entry expired");
                entries.remove(key);
                None
            }
            Some(entry) => {
                tracing::debug!(key = %key, "Cache hit");
                Some(entry.value.clone())
            }
        };

        let counter = if value.is_some() {
            &self.state.hits
        } else {
            &self.state.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);

        value
    }

    /// Store `value` for the logical input, expiring one TTL from now
    pub fn set(&self, input: &Value, value: V) {
        self.set_by_key(cache_key(input), value);
    }

    /// Store under a key already derived with [`cache_key`]
    ///
    /// A cache with `max_size` zero stores nothing.
    pub fn set_by_key(&self, key: String, value: V) {
        let config = &self.state.config;
        if config.max_size == 0 {
            return;
        }

        let now = self.state.clock.now();
        let ttl = config.ttl();
        let mut entries = self.state.entries();

        if !entries.contains_key(&key) && entries.len() >= config.max_size {
            let purged = entries.sweep(now, &ttl);

            if entries.len() >= config.max_size {
                let evict = (entries.len() / 10).max(1);
                for oldest in entries.lowest_keys_by(evict, |entry| entry.expires_at) {
                    entries.remove(&oldest);
                }
                tracing::debug!(
                    purged = purged.dropped(),
                    evicted = evict,
                    "Cache at capacity; evicted entries closest to expiry"
                );
            }
        }

        entries.insert(key, CacheEntry::new(value, now + ttl));
    }

    /// Drop every entry, returning how many there were
    pub fn clear(&self) -> usize {
        let cleared = self.state.entries().clear();
        tracing::info!(cleared, "Cache cleared");
        cleared
    }

    /// Remove every expired entry
    pub fn cleanup(&self) -> SweepOutcome {
        self.state.sweep_now()
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.state.clock.now();
        let (total_entries, expired_entries) = {
            let entries = self.state.entries();
            let expired = entries.values().filter(|e| e.is_expired(now)).count();
            (entries.len(), expired)
        };

        let hits = self.state.hits.load(Ordering::Relaxed);
        let misses = self.state.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        };

        CacheStats {
            total_entries,
            valid_entries: total_entries - expired_entries,
            expired_entries,
            hits,
            misses,
            hit_rate,
            config: self.state.config.clone(),
        }
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
