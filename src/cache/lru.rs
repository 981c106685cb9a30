//! LRU Evict List Module
//!
//! Implements recency ordering for cache eviction as an intrusive doubly
//! linked list threaded through the entry arena.

use tokio::time::Instant;

use crate::cache::entry::{Entry, EntryArena, EntryId};

// == Evict List ==
/// Tracks access order for LRU eviction strategy.
///
/// - Front = Most recently used
/// - Back = Least recently used
///
/// The list never owns entries; it only links and unlinks arena slots.
#[derive(Debug, Default)]
pub(crate) struct EvictList {
    front: Option<EntryId>,
    back: Option<EntryId>,
    len: usize,
}

impl EvictList {
    // == Constructor ==
    /// Creates a new empty list.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // == Push Front ==
    /// Allocates a new entry in `arena` and links it as most recently used.
    pub(crate) fn push_front<K, V>(
        &mut self,
        arena: &mut EntryArena<K, V>,
        key: K,
        value: V,
        expires_at: Option<Instant>,
    ) -> EntryId {
        let id = arena.insert(Entry::new(key, value, expires_at));
        self.link_front(arena, id);
        self.len += 1;
        id
    }

    // == Move To Front ==
    /// Marks an entry as most recently used.
    pub(crate) fn move_to_front<K, V>(&mut self, arena: &mut EntryArena<K, V>, id: EntryId) {
        if self.front == Some(id) || !self.is_linked(arena, id) {
            return;
        }
        self.unlink(arena, id);
        self.link_front(arena, id);
    }

    // == Remove ==
    /// Unlinks an entry from the list without freeing its slot. No-op if
    /// `id` is not linked.
    pub(crate) fn remove<K, V>(&mut self, arena: &mut EntryArena<K, V>, id: EntryId) {
        if !self.is_linked(arena, id) {
            return;
        }
        self.unlink(arena, id);
        self.len -= 1;
    }

    /// Most recently used entry.
    pub(crate) fn front(&self) -> Option<EntryId> {
        self.front
    }

    /// Least recently used entry.
    pub(crate) fn back(&self) -> Option<EntryId> {
        self.back
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates from least to most recently used.
    pub(crate) fn iter_oldest_first<'a, K, V>(
        &self,
        arena: &'a EntryArena<K, V>,
    ) -> impl Iterator<Item = &'a Entry<K, V>> + 'a {
        let mut cursor = self.back;
        std::iter::from_fn(move || {
            let entry = arena.get(cursor?)?;
            cursor = entry.prev_recency;
            Some(entry)
        })
    }

    /// Forgets every link. The arena is cleared separately by its owner.
    pub(crate) fn clear(&mut self) {
        self.front = None;
        self.back = None;
        self.len = 0;
    }

    /// Only the front entry has no predecessor.
    fn is_linked<K, V>(&self, arena: &EntryArena<K, V>, id: EntryId) -> bool {
        arena
            .get(id)
            .is_some_and(|entry| entry.prev_recency.is_some() || self.front() == Some(id))
    }

    fn link_front<K, V>(&mut self, arena: &mut EntryArena<K, V>, id: EntryId) {
        let old_front = self.front;
        if let Some(entry) = arena.get_mut(id) {
            entry.prev_recency = None;
            entry.next_recency = old_front;
        }
        match old_front.and_then(|front| arena.get_mut(front)) {
            Some(front) => front.prev_recency = Some(id),
            None => self.back = Some(id),
        }
        self.front = Some(id);
    }

    fn unlink<K, V>(&mut self, arena: &mut EntryArena<K, V>, id: EntryId) {
        let (prev, next) = match arena.get_mut(id) {
            Some(entry) => (entry.prev_recency.take(), entry.next_recency.take()),
            None => return,
        };

        match prev.and_then(|p| arena.get_mut(p)) {
            Some(prev_entry) => prev_entry.next_recency = next,
            None => self.front = next,
        }
        match next.and_then(|n| arena.get_mut(n)) {
            Some(next_entry) => next_entry.prev_recency = prev,
            None => self.back = prev,
        }
    }
}
