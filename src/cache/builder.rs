//! Cache builder.
//!
//! ## Example
//!
//! ```rust
//! use expirable_cache::cache::CacheBuilder;
//!
//! let cache = CacheBuilder::new()
//!     .capacity(2)
//!     .on_evict(|key: &String, value: &u32| println!("evicted {key}={value}"))
//!     .build()
//!     .unwrap();
//! cache.add("a".to_string(), 1);
//! assert_eq!(cache.get("a"), Some(1));
//! assert_eq!(cache.ttl(), None);
//! ```

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use crate::cache::{Cache, EvictCallback};
use crate::config::CacheConfig;
use crate::error::Result;

/// Collects capacity, TTL and the evict callback before constructing a
/// [`Cache`]. Defaults to an unbounded cache without expiration.
pub struct CacheBuilder<K, V> {
    capacity: usize,
    ttl: Duration,
    on_evict: Option<EvictCallback<K, V>>,
}

impl<K, V> fmt::Debug for CacheBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("on_evict", &self.on_evict.is_some())
            .finish()
    }
}

impl<K, V> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            capacity: 0,
            ttl: Duration::ZERO,
            on_evict: None,
        }
    }

    /// Maximum number of entries, 0 for unbounded.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Entry lifetime, `Duration::ZERO` disables expiration.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Takes capacity and TTL from `config`.
    pub fn config(self, config: &CacheConfig) -> Self {
        self.capacity(config.capacity).ttl(config.ttl)
    }

    /// Callback for every entry leaving the cache.
    ///
    /// Runs with the cache lock held: it must not touch the same cache and
    /// must not block.
    pub fn on_evict<F>(mut self, on_evict: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.on_evict = Some(Box::new(on_evict));
        self
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    /// Builds the cache, starting the sweeper when TTL is enabled.
    ///
    /// Fails only if TTL is enabled outside of a tokio runtime.
    pub fn build(self) -> Result<Cache<K, V>> {
        Cache::new(self.capacity, self.on_evict, self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::error::CacheError;

    #[test]
    fn test_builder_defaults() {
        let cache: Cache<u32, u32> = CacheBuilder::new().build().unwrap();
        assert_eq!(cache.capacity(), 0);
        assert_eq!(cache.ttl(), None);
        assert!(!cache.is_sweeping());
    }

    #[test]
    fn test_builder_from_config_without_ttl() {
        let config = CacheConfig::new(3, Duration::ZERO);
        let cache: Cache<u32, u32> = CacheBuilder::new().config(&config).build().unwrap();
        assert_eq!(cache.capacity(), 3);
        assert_eq!(cache.ttl(), None);
    }

    #[test]
    fn test_builder_ttl_requires_runtime() {
        let result: Result<Cache<u32, u32>> =
            CacheBuilder::new().ttl(Duration::from_secs(1)).build();
        assert!(matches!(result, Err(CacheError::RuntimeUnavailable(_))));
    }

    #[test]
    fn test_builder_on_evict() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let cache = CacheBuilder::new()
            .capacity(1)
            .on_evict(move |_: &u32, _: &u32| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        cache.add(1, 1);
        cache.add(2, 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_builder_ttl_starts_sweeper() {
        let cache: Cache<u32, u32> = CacheBuilder::new()
            .ttl(Duration::from_secs(10))
            .build()
            .unwrap();
        assert_eq!(cache.ttl(), Some(Duration::from_secs(10)));
        assert!(cache.is_sweeping());
        cache.close().await.unwrap();
        assert!(!cache.is_sweeping());
    }
}
