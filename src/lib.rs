//! Expirable Cache - A thread-safe in-memory cache
//!
//! Provides LRU eviction under a capacity bound and approximate TTL
//! expiration driven by a bucketed background sweep.
//!
//! ```rust
//! use expirable_cache::Cache;
//!
//! let cache: Cache<&str, u32> = Cache::new(2, None, std::time::Duration::ZERO).unwrap();
//! cache.add("a", 1);
//! cache.add("b", 2);
//! assert!(cache.add("c", 3));
//! assert!(!cache.contains("a"));
//! ```

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{Cache, CacheBuilder, CacheStats, EvictCallback};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
