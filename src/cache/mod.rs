//! Cache Module
//!
//! Provides in-memory caching with LRU eviction and bucketed TTL expiration.

mod buckets;
mod builder;
mod entry;
mod expirable;
mod lru;
mod stats;
mod store;


use std::time::Duration;

// Re-export public types
pub use builder::CacheBuilder;
pub use expirable::Cache;
pub use stats::CacheStats;
pub use store::EvictCallback;

pub(crate) use store::CacheStore;

// == Constants ==
/// Number of buckets in the expiration ring
pub(crate) const BUCKET_COUNT: usize = 100;

/// Lower bound for the sweeper tick; tokio timers have millisecond resolution
pub(crate) const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(1);
