//! Thread-safe cache facade.
//!
//! [`Cache`] puts a `CacheStore` behind a single coarse mutex and owns the
//! background sweeper that expires entries. Every operation holds the lock
//! for its full duration; the only suspension point is the sweeper waiting
//! for a bucket's deadline, which it does with the lock released.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheBuilder, CacheStats, CacheStore, EvictCallback};
use crate::config::{sweep_schedule, CacheConfig};
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, SweeperHandle};

// == Cache ==
/// A capacity-bounded LRU cache with approximate TTL expiration.
///
/// Entries live at least `ttl` and at most about one sweep tick longer
/// (`ttl / 100`, or 1 ms for TTLs under 100 ms); they are removed in batches
/// by a background task rather than on read. See
/// [`Cache::get`] and [`Cache::get_live`] for the two read policies.
///
/// Share it between threads with `Arc<Cache<K, V>>`.
pub struct Cache<K, V> {
    store: Arc<Mutex<CacheStore<K, V>>>,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("store", &*self.store.lock())
            .field("sweeping", &self.sweeper.lock().is_some())
            .finish()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    // == Constructor ==
    /// Creates a new cache.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, 0 for unbounded
    /// * `on_evict` - Optional callback for every entry leaving the cache
    /// * `ttl` - Entry lifetime, `Duration::ZERO` disables expiration
    ///
    /// With TTL enabled the sweeper is spawned on the current tokio runtime;
    /// calling this outside a runtime then fails with
    /// [`CacheError::RuntimeUnavailable`].
    pub fn new(
        capacity: usize,
        on_evict: Option<EvictCallback<K, V>>,
        ttl: Duration,
    ) -> Result<Self> {
        let store = Arc::new(Mutex::new(CacheStore::new(capacity, ttl, on_evict)));

        let sweeper = match sweep_schedule(ttl) {
            Some(schedule) => {
                let runtime = Handle::try_current()
                    .map_err(|e| CacheError::RuntimeUnavailable(e.to_string()))?;
                Some(spawn_sweep_task(&runtime, Arc::downgrade(&store), schedule))
            }
            None => None,
        };

        Ok(Self {
            store,
            sweeper: Mutex::new(sweeper),
        })
    }

    /// Creates a cache from `config` without an evict callback.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::new(config.capacity, None, config.ttl)
    }

    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    // == Writes ==
    /// Inserts or refreshes `key`. Returns true if an entry was evicted to
    /// stay within capacity.
    pub fn add(&self, key: K, value: V) -> bool {
        self.store.lock().add(key, value)
    }

    /// Removes `key`. Returns true if it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.lock().remove(key)
    }

    /// Removes and returns the least recently used entry.
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        self.store.lock().remove_oldest()
    }

    /// Changes the capacity and returns the number of entries evicted.
    /// A capacity of 0 is unbounded.
    pub fn resize(&self, capacity: usize) -> usize {
        self.store.lock().resize(capacity)
    }

    /// Removes every entry, invoking the evict callback for each.
    pub fn purge(&self) {
        self.store.lock().purge()
    }

    // == Reads ==
    /// Returns the value for `key` and marks it most recently used.
    ///
    /// Expiration is lazy here: an entry past its deadline is still returned
    /// until the sweeper collects its bucket.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.store.lock().get(key)
    }

    /// Like [`Cache::get`] but returns None once the deadline has passed.
    pub fn get_live<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.store.lock().get_live(key)
    }

    /// Returns the value for `key` without touching recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.store.lock().peek(key)
    }

    /// Like [`Cache::peek`] but returns None once the deadline has passed.
    pub fn peek_live<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.store.lock().peek_live(key)
    }

    /// Checks presence without touching recency or looking at deadlines.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.lock().contains(key)
    }

    /// Deadline of `key`, None if absent or if TTL is disabled.
    pub fn expires_at<Q>(&self, key: &Q) -> Option<Instant>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.lock().expires_at(key)
    }

    /// Time left before `key` reaches its deadline, `Some(ZERO)` once it has
    /// passed. None if absent or if TTL is disabled.
    pub fn ttl_remaining<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.lock().ttl_remaining(key)
    }

    /// Returns the least recently used entry without touching it.
    pub fn get_oldest(&self) -> Option<(K, V)>
    where
        V: Clone,
    {
        self.store.lock().get_oldest()
    }

    /// All keys, oldest to newest, including expired but unswept ones.
    pub fn keys(&self) -> Vec<K> {
        self.store.lock().keys()
    }

    /// Values of unexpired entries, oldest to newest.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.store.lock().values()
    }

    /// Number of stored entries, including expired but unswept ones.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.store.lock().capacity()
    }

    /// Entry lifetime, None when expiration is disabled.
    pub fn ttl(&self) -> Option<Duration> {
        self.store.lock().ttl()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.lock().stats()
    }

    // == Lifecycle ==
    /// Returns true while the background sweeper is attached.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the background sweeper and waits for it to exit.
    ///
    /// The cache remains usable afterwards, but entries are no longer
    /// expired in the background. Calling this more than once is a no-op.
    pub async fn close(&self) -> Result<()> {
        let handle = self.sweeper.lock().take();
        match handle {
            Some(handle) => handle.shutdown().await,
            None => Ok(()),
        }
    }
}

impl<K, V> Drop for Cache<K, V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            debug!("Cache dropped without close(), aborting sweeper");
            handle.abort();
        }
    }
}
