//! Rate Limiting Module
//!
//! Per-identity request limits over a rolling time window.
//!
//! # Features
//!
//! - Sliding-window counting (no bucket edges to burst across)
//! - Tiered limits for anonymous sessions and authenticated users
//! - Per-call limit and window overrides
//! - Background sweep that forgets idle keys
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 RateLimiter                  │
//! ├──────────────────────────────────────────────┤
//! │  check_and_increment / check_identity        │
//! │        │                                     │
//! │        ▼                                     │
//! │  Mutex<RecordMap<RequestWindow>>  ◄── sweep  │
//! └──────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod limiter;
pub mod window;

pub use config::RateLimitConfig;
pub use limiter::{RateLimitResult, RateLimitStats, RateLimiter};
pub use window::RequestWindow;
