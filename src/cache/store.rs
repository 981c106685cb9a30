//! Cache Store Module
//!
//! Single-threaded cache engine combining the key map, the entry arena, the
//! LRU evict list and the expiration bucket ring. The thread-safe
//! [`Cache`](crate::cache::Cache) wraps one of these behind a mutex.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::cache::buckets::BucketRing;
use crate::cache::entry::{Entry, EntryArena, EntryId};
use crate::cache::lru::EvictList;
use crate::cache::CacheStats;

/// Callback invoked with every entry leaving the cache.
///
/// It runs while the cache lock is held, so it must not call back into the
/// same cache and should return quickly.
pub type EvictCallback<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

// == Cache Store ==
/// Cache storage with LRU eviction and bucketed TTL expiration.
pub(crate) struct CacheStore<K, V> {
    /// Key to arena handle
    entries: HashMap<K, EntryId>,
    /// Owner of every live entry
    arena: EntryArena<K, V>,
    /// Recency order
    evict_list: EvictList,
    /// Expiration wheel, only populated when TTL is enabled
    buckets: BucketRing,
    /// Maximum number of entries, 0 = unbounded
    capacity: usize,
    /// Entry lifetime, None = entries never expire
    ttl: Option<Duration>,
    on_evict: Option<EvictCallback<K, V>>,
    stats: CacheStats,
}

impl<K, V> fmt::Debug for CacheStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.arena.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("cursor", &self.buckets.cursor())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates a new CacheStore.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, 0 for unbounded
    /// * `ttl` - Entry lifetime, `Duration::ZERO` disables expiration
    /// * `on_evict` - Optional callback for every removed entry
    pub(crate) fn new(capacity: usize, ttl: Duration, on_evict: Option<EvictCallback<K, V>>) -> Self {
        Self {
            entries: HashMap::new(),
            arena: EntryArena::new(),
            evict_list: EvictList::new(),
            buckets: BucketRing::new(),
            capacity,
            ttl: (!ttl.is_zero()).then_some(ttl),
            on_evict,
            stats: CacheStats::new(),
        }
    }

    // == Add ==
    /// Inserts or refreshes `key`.
    ///
    /// Refreshing an existing key updates its value and deadline, moves it
    /// to the front of the recency list and re-homes it into the current
    /// insertion bucket. Returns true if a new key pushed the cache over
    /// capacity and the least recently used entry was evicted.
    pub(crate) fn add(&mut self, key: K, value: V) -> bool {
        let expires_at = self.deadline();

        if let Some(&id) = self.entries.get(&key) {
            if let Some(entry) = self.arena.get_mut(id) {
                entry.value = value;
                entry.expires_at = expires_at;
            }
            self.evict_list.move_to_front(&mut self.arena, id);
            self.buckets.remove(&mut self.arena, id);
            if expires_at.is_some() {
                self.buckets.add(&mut self.arena, id);
            }
            return false;
        }

        let id = self
            .evict_list
            .push_front(&mut self.arena, key.clone(), value, expires_at);
        self.entries.insert(key, id);
        if expires_at.is_some() {
            self.buckets.add(&mut self.arena, id);
        }

        let evicted = self.capacity > 0 && self.entries.len() > self.capacity;
        if evicted {
            self.evict_oldest();
        }
        evicted
    }

    // == Get ==
    /// Returns a clone of the value for `key` and marks it most recently used.
    ///
    /// Expiration is lazy on this path: an entry whose deadline has passed
    /// but whose bucket has not been swept yet is still returned. Use
    /// [`CacheStore::get_live`] to hide such entries.
    pub(crate) fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        match self.entries.get(key).copied() {
            Some(id) => {
                self.evict_list.move_to_front(&mut self.arena, id);
                self.stats.record_hit();
                self.arena.get(id).map(|entry| entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Like [`CacheStore::get`] but treats logically expired entries as
    /// missing. Expired entries are left for the sweeper and keep their
    /// recency position.
    pub(crate) fn get_live<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let now = Instant::now();
        let live = self
            .entries
            .get(key)
            .copied()
            .filter(|&id| self.arena.get(id).is_some_and(|e| !e.is_expired_at(now)));

        match live {
            Some(id) => {
                self.evict_list.move_to_front(&mut self.arena, id);
                self.stats.record_hit();
                self.arena.get(id).map(|entry| entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Peek ==
    /// Returns a clone of the value without touching recency. Lazy like `get`.
    pub(crate) fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.lookup(key).map(|entry| entry.value.clone())
    }

    /// Like [`CacheStore::peek`] but hides logically expired entries.
    pub(crate) fn peek_live<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let now = Instant::now();
        self.lookup(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
    }

    // == Contains ==
    /// Checks physical presence. Ignores deadlines and recency.
    pub(crate) fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Absolute deadline of `key`, None if absent or never expiring.
    pub(crate) fn expires_at<Q>(&self, key: &Q) -> Option<Instant>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key).and_then(|entry| entry.expires_at)
    }

    /// Remaining lifetime of `key`, None if absent or never expiring.
    pub(crate) fn ttl_remaining<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key).and_then(Entry::ttl_remaining)
    }

    // == Remove ==
    /// Removes `key`, invoking the evict callback. Returns true if present.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(id) = self.entries.get(key).copied() else {
            return false;
        };
        match self.unlink_entry(id) {
            Some(entry) => {
                self.notify(&entry);
                true
            }
            None => false,
        }
    }

    // == Oldest ==
    /// Removes and returns the least recently used entry.
    pub(crate) fn remove_oldest(&mut self) -> Option<(K, V)> {
        self.evict_oldest().map(|entry| (entry.key, entry.value))
    }

    /// Returns a clone of the least recently used entry without touching it.
    pub(crate) fn get_oldest(&self) -> Option<(K, V)>
    where
        V: Clone,
    {
        self.evict_list
            .back()
            .and_then(|id| self.arena.get(id))
            .map(|entry| (entry.key.clone(), entry.value.clone()))
    }

    // == Snapshots ==
    /// Every key, oldest to newest, including logically expired ones that
    /// have not been swept yet.
    pub(crate) fn keys(&self) -> Vec<K> {
        self.evict_list
            .iter_oldest_first(&self.arena)
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Every live value, oldest to newest. Logically expired entries are
    /// filtered out even if they have not been swept yet.
    pub(crate) fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        let now = Instant::now();
        self.evict_list
            .iter_oldest_first(&self.arena)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
            .collect()
    }

    // == Length ==
    /// Number of stored entries, including expired but unswept ones.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    // == Resize ==
    /// Changes the capacity, evicting the oldest entries on shrink.
    ///
    /// Returns how many entries were evicted. A capacity of 0 is unbounded.
    pub(crate) fn resize(&mut self, capacity: usize) -> usize {
        let overflow = if capacity > 0 {
            self.len().saturating_sub(capacity)
        } else {
            0
        };
        for _ in 0..overflow {
            self.evict_oldest();
        }
        self.capacity = capacity;
        overflow
    }

    // == Purge ==
    /// Removes every entry, invoking the evict callback once per entry.
    pub(crate) fn purge(&mut self) {
        if let Some(on_evict) = &self.on_evict {
            for entry in self.evict_list.iter_oldest_first(&self.arena) {
                on_evict(&entry.key, &entry.value);
            }
        }
        self.entries.clear();
        self.evict_list.clear();
        self.buckets.clear();
        self.arena.clear();
    }

    // == Expiration ==
    /// Bucket due for the next sweep and how long to wait before every
    /// member's deadline has passed.
    pub(crate) fn next_sweep(&self) -> (usize, Option<Duration>) {
        let index = self.buckets.cursor();
        let wait = self
            .buckets
            .bucket(index)
            .and_then(|bucket| bucket.newest_expiry())
            .map(|newest| newest.saturating_duration_since(Instant::now()))
            .filter(|wait| !wait.is_zero());
        (index, wait)
    }

    /// Removes every entry still linked into bucket `index` and advances the
    /// cursor. Returns the number of expired entries.
    pub(crate) fn expire_bucket(&mut self, index: usize) -> usize {
        let members = self.buckets.members(&self.arena, index);
        let mut expired = 0;
        for id in members {
            if let Some(entry) = self.unlink_entry(id) {
                self.notify(&entry);
                expired += 1;
            }
        }
        self.buckets.finish_sweep(index);
        self.stats.record_expirations(expired);
        expired
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub(crate) fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    fn deadline(&self) -> Option<Instant> {
        self.ttl.and_then(|ttl| Instant::now().checked_add(ttl))
    }

    fn lookup<Q>(&self, key: &Q) -> Option<&Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).and_then(|&id| self.arena.get(id))
    }

    /// Evicts the back of the recency list to make room.
    fn evict_oldest(&mut self) -> Option<Entry<K, V>> {
        let id = self.evict_list.back()?;
        let entry = self.unlink_entry(id)?;
        trace!(len = self.entries.len(), "Evicted least recently used entry");
        self.stats.record_eviction();
        self.notify(&entry);
        Some(entry)
    }

    /// Detaches `id` from the map, the recency list and its bucket, then
    /// frees the slot.
    fn unlink_entry(&mut self, id: EntryId) -> Option<Entry<K, V>> {
        self.arena.get(id)?;
        self.evict_list.remove(&mut self.arena, id);
        self.buckets.remove(&mut self.arena, id);
        let entry = self.arena.remove(id)?;
        self.entries.remove(&entry.key);
        Some(entry)
    }

    fn notify(&self, entry: &Entry<K, V>) {
        if let Some(on_evict) = &self.on_evict {
            on_evict(&entry.key, &entry.value);
        }
    }

    /// Panics if the map, the recency list, the arena and the bucket ring
    /// disagree about the set of live entries.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        assert_eq!(self.entries.len(), self.evict_list.len());
        assert_eq!(self.entries.len(), self.arena.len());
        assert_eq!(
            self.evict_list.iter_oldest_first(&self.arena).count(),
            self.entries.len()
        );

        let expiring = self.arena.iter().filter(|e| e.expires_at.is_some()).count();
        assert_eq!(self.buckets.total_members(), expiring);
        for entry in self.arena.iter() {
            assert_eq!(entry.bucket.is_some(), entry.expires_at.is_some());
            assert!(self.entries.contains_key(&entry.key));
        }
    }
}
