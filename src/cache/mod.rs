//! Response Cache Module
//!
//! Memoizes expensive results for a bounded time, keyed by a content hash of
//! the logical input.
//!
//! # Features
//!
//! - Wrapper-insensitive keys (`{"a": "x"}` and `{"a": {"value": "x"}}` collide)
//! - Absolute per-entry expiry, removed lazily on read
//! - Bounded size with purge-then-evict on insert
//! - Hit/miss counters for monitoring

pub mod config;
pub mod entry;
pub mod key;
pub mod store;

pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use key::{cache_key, canonical_json, normalize};
pub use store::{CacheStats, ResponseCache};
