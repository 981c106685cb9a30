//! Cache Entry Module
//!
//! Defines individual cache entries and the slot arena that owns them.
//!
//! Entries are linked into two independent intrusive lists (recency and
//! expiration bucket). Links are stored as [`EntryId`] handles into the
//! arena rather than pointers, so unlinking an entry from both lists is a
//! handful of index updates.

use std::time::Duration;

use tokio::time::Instant;

/// Stable handle to an entry slot in an [`EntryArena`].
pub(crate) type EntryId = usize;

// == Cache Entry ==
/// A single cache entry with its value, deadline and intrusive links.
#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    /// The key this entry is stored under
    pub(crate) key: K,
    /// The stored value
    pub(crate) value: V,
    /// Absolute expiration deadline, None when TTL is disabled
    pub(crate) expires_at: Option<Instant>,
    pub(crate) prev_recency: Option<EntryId>,
    pub(crate) next_recency: Option<EntryId>,
    pub(crate) prev_bucket: Option<EntryId>,
    pub(crate) next_bucket: Option<EntryId>,
    /// Index of the bucket this entry is linked into, if any
    pub(crate) bucket: Option<usize>,
}

impl<K, V> Entry<K, V> {
    // == Constructor ==
    /// Creates an unlinked entry.
    pub(crate) fn new(key: K, value: V, expires_at: Option<Instant>) -> Self {
        Self {
            key,
            value,
            expires_at,
            prev_recency: None,
            next_recency: None,
            prev_bucket: None,
            next_bucket: None,
            bucket: None,
        }
    }

    // == Is Expired ==
    /// Checks if the entry is logically expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches its
    /// deadline. Entries without a deadline never expire.
    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, `Some(ZERO)` once expired, or None if
    /// the entry never expires.
    pub(crate) fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

// == Entry Arena ==
/// Slot arena owning every live entry.
///
/// Freed slots are recycled through a free list, so handles stay small and
/// the backing vector does not grow past the peak number of live entries.
#[derive(Debug)]
pub(crate) struct EntryArena<K, V> {
    slots: Vec<Option<Entry<K, V>>>,
    free: Vec<EntryId>,
    len: usize,
}

impl<K, V> Default for EntryArena<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EntryArena<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `entry` and returns its handle.
    pub(crate) fn insert(&mut self, entry: Entry<K, V>) -> EntryId {
        self.len += 1;
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(entry);
                id
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    /// Frees the slot for `id` and returns its entry.
    ///
    /// The caller must have unlinked the entry from every list first.
    pub(crate) fn remove(&mut self, id: EntryId) -> Option<Entry<K, V>> {
        let entry = self.slots.get_mut(id)?.take()?;
        self.free.push(id);
        self.len -= 1;
        Some(entry)
    }

    pub(crate) fn get(&self, id: EntryId) -> Option<&Entry<K, V>> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry<K, V>> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Number of live entries.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over live entries in slot order.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry<K, V>> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Drops every entry and resets the free list.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }
}
