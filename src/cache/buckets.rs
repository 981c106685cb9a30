//! Expiration Bucket Module
//!
//! A fixed ring of time buckets used to batch-expire entries without a timer
//! per entry.
//!
//! The sweeper visits one bucket per tick (`ttl / BUCKET_COUNT`). New or
//! refreshed entries always land in the bucket the cursor has just passed,
//! so a full rotation (about `ttl`) elapses before that bucket is visited
//! again. Combined with the sweeper waiting for the bucket's newest deadline,
//! an entry lives at least `ttl` and at most about one bucket width longer.

use tokio::time::Instant;

use crate::cache::entry::{EntryArena, EntryId};
use crate::cache::BUCKET_COUNT;

// == Bucket ==
/// One slot of the ring: an unordered intrusive member list.
#[derive(Debug, Default, Clone)]
pub(crate) struct Bucket {
    head: Option<EntryId>,
    len: usize,
    /// Latest deadline among entries added since the last sweep
    newest_expiry: Option<Instant>,
}

impl Bucket {
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn newest_expiry(&self) -> Option<Instant> {
        self.newest_expiry
    }
}

// == Bucket Ring ==
#[derive(Debug)]
pub(crate) struct BucketRing {
    buckets: Vec<Bucket>,
    /// Next bucket due for sweeping
    cursor: usize,
}

impl Default for BucketRing {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketRing {
    pub(crate) fn new() -> Self {
        Self {
            buckets: vec![Bucket::default(); BUCKET_COUNT],
            cursor: 0,
        }
    }

    /// Index of the bucket the next sweep will collect.
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    /// Index new and refreshed entries are assigned to.
    pub(crate) fn insertion_index(&self) -> usize {
        (BUCKET_COUNT + self.cursor - 1) % BUCKET_COUNT
    }

    pub(crate) fn bucket(&self, index: usize) -> Option<&Bucket> {
        self.buckets.get(index)
    }

    // == Add To Bucket ==
    /// Links `id` into the bucket just behind the cursor.
    pub(crate) fn add<K, V>(&mut self, arena: &mut EntryArena<K, V>, id: EntryId) {
        let index = self.insertion_index();
        let bucket = &mut self.buckets[index];
        let old_head = bucket.head;

        let expires_at = match arena.get_mut(id) {
            Some(entry) => {
                entry.bucket = Some(index);
                entry.prev_bucket = None;
                entry.next_bucket = old_head;
                entry.expires_at
            }
            None => return,
        };
        if let Some(head) = old_head.and_then(|h| arena.get_mut(h)) {
            head.prev_bucket = Some(id);
        }

        bucket.head = Some(id);
        bucket.len += 1;
        if let Some(expires_at) = expires_at {
            bucket.newest_expiry = Some(match bucket.newest_expiry {
                Some(newest) => newest.max(expires_at),
                None => expires_at,
            });
        }
    }

    // == Remove From Bucket ==
    /// Unlinks `id` from whichever bucket holds it. No-op if unlinked.
    pub(crate) fn remove<K, V>(&mut self, arena: &mut EntryArena<K, V>, id: EntryId) {
        let (index, prev, next) = match arena.get_mut(id) {
            Some(entry) => match entry.bucket.take() {
                Some(index) => (index, entry.prev_bucket.take(), entry.next_bucket.take()),
                None => return,
            },
            None => return,
        };

        let bucket = &mut self.buckets[index];
        match prev.and_then(|p| arena.get_mut(p)) {
            Some(prev_entry) => prev_entry.next_bucket = next,
            None => bucket.head = next,
        }
        if let Some(next_entry) = next.and_then(|n| arena.get_mut(n)) {
            next_entry.prev_bucket = prev;
        }
        bucket.len -= 1;
    }

    /// Handles of every entry currently linked into bucket `index`.
    pub(crate) fn members<K, V>(&self, arena: &EntryArena<K, V>, index: usize) -> Vec<EntryId> {
        let Some(bucket) = self.buckets.get(index) else {
            return Vec::new();
        };
        let mut ids = Vec::with_capacity(bucket.len);
        let mut cursor = bucket.head;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = arena.get(id).and_then(|entry| entry.next_bucket);
        }
        ids
    }

    /// Finishes a sweep of bucket `index` and moves the cursor past it.
    pub(crate) fn finish_sweep(&mut self, index: usize) {
        if let Some(bucket) = self.buckets.get_mut(index) {
            if bucket.is_empty() {
                bucket.newest_expiry = None;
            }
        }
        self.cursor = (self.cursor + 1) % BUCKET_COUNT;
    }

    /// Empties every bucket. The cursor keeps its position.
    pub(crate) fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Bucket::default();
        }
    }

    /// Total number of linked entries across the ring.
    #[cfg(test)]
    pub(crate) fn total_members(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }
}
