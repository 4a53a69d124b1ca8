// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Bounded adaptive recency cache
//!
//! This module provides the generic fixed-capacity cache used by the name
//! resolution layer to avoid repeated store round-trips. Entries live in a
//! slab of slots linked into a doubly-linked recency chain. A movable cutoff
//! pointer partitions the chain into a protected head region (entries that
//! earned a promotion) and the remainder, which is eligible for eviction.
//!
//! Promotion is gated by a correlated-reference period measured on a logical
//! clock: a burst of repeated references within the period collapses into a
//! single promotion, so a hot loop cannot inflate an entry's priority.

use std::collections::HashMap;
use std::hash::Hash;

use super::CacheError;

/// Minimum capacity for the adaptive cache. Head, cutoff, and tail must
/// remain distinguishable, which requires at least two slots.
pub const MIN_CACHE_SIZE: usize = 2;

/// Default fraction of the capacity reserved for the protected region.
pub const DEFAULT_CUTOFF_FRACTION: f64 = 0.33;

/// Default correlated-reference period in logical ticks.
pub const DEFAULT_CORRELATED_REFERENCE_PERIOD: u64 = 30;

const NIL: usize = usize::MAX;

/// Hit/miss/eviction counters for a bounded cache
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundedCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
    last_access: u64,
    protected: bool,
}

/// Generic fixed-capacity recency cache with a protected cutoff region
///
/// `reference` inserts or refreshes an entry and returns the value evicted to
/// make room, if any. New entries enter at the front of the unprotected
/// region; only a re-reference outside the correlated-reference period moves
/// an entry into the protected head region. Eviction always reclaims the
/// tail slot and reuses it for the incoming key.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    head: usize,
    tail: usize,
    /// First slot of the unprotected region, NIL when every resident entry
    /// is protected or the cache is empty.
    cutoff: usize,
    protected_count: usize,
    protected_target: usize,
    capacity: usize,
    period: u64,
    clock: u64,
    stats: BoundedCacheStats,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache with the default cutoff fraction and reference period
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        Self::with_settings(
            capacity,
            DEFAULT_CUTOFF_FRACTION,
            DEFAULT_CORRELATED_REFERENCE_PERIOD,
        )
    }

    /// Create a cache with explicit tuning parameters
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of resident entries, must be >= 2
    /// * `cutoff_fraction` - Fraction of the capacity kept protected
    /// * `period` - Correlated-reference period in logical ticks
    pub fn with_settings(
        capacity: usize,
        cutoff_fraction: f64,
        period: u64,
    ) -> Result<Self, CacheError> {
        if capacity < MIN_CACHE_SIZE {
            return Err(CacheError::CapacityTooSmall(capacity));
        }
        if !(0.0..=1.0).contains(&cutoff_fraction) {
            return Err(CacheError::InvalidCutoffFraction(cutoff_fraction));
        }

        // At least one slot always stays unprotected so the tail is evictable.
        let protected_target =
            (((capacity as f64) * cutoff_fraction).round() as usize).min(capacity - 1);

        Ok(Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            cutoff: NIL,
            protected_count: 0,
            protected_target,
            capacity,
            period,
            clock: 0,
            stats: BoundedCacheStats::default(),
        })
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counters accumulated since construction or the last `clear`
    pub fn stats(&self) -> BoundedCacheStats {
        self.stats
    }

    /// Whether a key is resident, without touching recency state
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or refresh an entry, returning the evicted value if the cache
    /// was full
    pub fn reference(&mut self, key: K, value: V) -> Option<V> {
        self.clock = self.clock.wrapping_add(1);

        if let Some(&slot) = self.index.get(&key) {
            if let Some(s) = self.slots[slot].as_mut() {
                s.value = value;
            }
            self.maybe_promote(slot);
            return None;
        }

        let evicted = if self.index.len() == self.capacity {
            self.stats.evictions += 1;
            Some(self.evict_tail())
        } else {
            None
        };

        let slot = self.allocate(key.clone(), value);
        self.link_unprotected_front(slot);
        self.index.insert(key, slot);
        evicted
    }

    /// Look up a value, applying the same promotion rules as `reference`
    pub fn try_get(&mut self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.clock = self.clock.wrapping_add(1);
        match self.index.get(key).copied() {
            Some(slot) => {
                self.maybe_promote(slot);
                self.stats.hits += 1;
                self.slots[slot].as_ref().map(|s| s.value.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Remove an entry, returning its value
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.index.remove(key)?;
        self.unlink(slot);
        let entry = self.slots[slot].take()?;
        if entry.protected {
            self.protected_count -= 1;
        }
        self.free.push(slot);
        Some(entry.value)
    }

    /// Discard every entry, keeping the configured capacity
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = NIL;
        self.tail = NIL;
        self.cutoff = NIL;
        self.protected_count = 0;
        self.clock = 0;
        self.stats = BoundedCacheStats::default();
    }

    /// Iterate over resident values in recency order, most recent first
    pub fn values(&self) -> impl Iterator<Item = &V> {
        ChainIter {
            cache: self,
            current: self.head,
        }
    }

    // Promote a slot to the head if its last access falls outside the
    // correlated-reference period. The subtraction is wraparound-safe.
    fn maybe_promote(&mut self, slot: usize) {
        let (last_access, protected) = match &self.slots[slot] {
            Some(s) => (s.last_access, s.protected),
            None => return,
        };
        if self.clock.wrapping_sub(last_access) <= self.period {
            return;
        }

        self.unlink(slot);
        self.link_head(slot);
        if let Some(s) = self.slots[slot].as_mut() {
            s.last_access = self.clock;
            s.protected = true;
        }
        if !protected {
            self.protected_count += 1;
        }

        if self.protected_count > self.protected_target {
            self.demote_last_protected();
        }
    }

    // Move the cutoff up by one: the protected slot closest to the cutoff
    // rejoins the unprotected region.
    fn demote_last_protected(&mut self) {
        let last = if self.cutoff == NIL {
            self.tail
        } else {
            self.slots[self.cutoff].as_ref().map_or(NIL, |s| s.prev)
        };
        if last == NIL {
            return;
        }
        if let Some(s) = self.slots[last].as_mut() {
            if s.protected {
                s.protected = false;
                self.protected_count -= 1;
                self.cutoff = last;
            }
        }
    }

    fn evict_tail(&mut self) -> V {
        let slot = self.tail;
        debug_assert_ne!(slot, NIL);
        self.unlink(slot);
        let entry = self.slots[slot]
            .take()
            .expect("tail slot must be occupied");
        if entry.protected {
            self.protected_count -= 1;
        }
        self.index.remove(&entry.key);
        self.free.push(slot);
        entry.value
    }

    fn allocate(&mut self, key: K, value: V) -> usize {
        let entry = Slot {
            key,
            value,
            prev: NIL,
            next: NIL,
            last_access: self.clock,
            protected: false,
        };
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match &self.slots[slot] {
            Some(s) => (s.prev, s.next),
            None => return,
        };
        if prev != NIL {
            if let Some(p) = self.slots[prev].as_mut() {
                p.next = next;
            }
        } else {
            self.head = next;
        }
        if next != NIL {
            if let Some(n) = self.slots[next].as_mut() {
                n.prev = prev;
            }
        } else {
            self.tail = prev;
        }
        if self.cutoff == slot {
            self.cutoff = next;
        }
        if let Some(s) = self.slots[slot].as_mut() {
            s.prev = NIL;
            s.next = NIL;
        }
    }

    fn link_head(&mut self, slot: usize) {
        let head = self.head;
        if let Some(s) = self.slots[slot].as_mut() {
            s.prev = NIL;
            s.next = head;
        }
        if head != NIL {
            if let Some(h) = self.slots[head].as_mut() {
                h.prev = slot;
            }
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }

    // New entries become the first node of the unprotected region, so the
    // tail always holds the least-recently-placed unpromoted entry.
    fn link_unprotected_front(&mut self, slot: usize) {
        if self.cutoff == NIL {
            // No unprotected region yet: append behind the protected chain.
            let tail = self.tail;
            if let Some(s) = self.slots[slot].as_mut() {
                s.prev = tail;
                s.next = NIL;
            }
            if tail != NIL {
                if let Some(t) = self.slots[tail].as_mut() {
                    t.next = slot;
                }
            }
            self.tail = slot;
            if self.head == NIL {
                self.head = slot;
            }
        } else {
            let cutoff = self.cutoff;
            let before = self.slots[cutoff].as_ref().map_or(NIL, |c| c.prev);
            if let Some(s) = self.slots[slot].as_mut() {
                s.prev = before;
                s.next = cutoff;
            }
            if before != NIL {
                if let Some(b) = self.slots[before].as_mut() {
                    b.next = slot;
                }
            } else {
                self.head = slot;
            }
            if let Some(c) = self.slots[cutoff].as_mut() {
                c.prev = slot;
            }
        }
        self.cutoff = slot;
    }
}

struct ChainIter<'a, K, V> {
    cache: &'a BoundedCache<K, V>,
    current: usize,
}

impl<'a, K, V> Iterator for ChainIter<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == NIL {
            return None;
        }
        let slot = self.cache.slots[self.current].as_ref()?;
        self.current = slot.next;
        Some(&slot.value)
    }
}
