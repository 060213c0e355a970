//! LRU Recency List Module
//!
//! Implements the recency order used for LRU eviction.
//!
//! Entries live in a slot arena and are chained into a doubly linked list by
//! slot handle. Two sentinel slots bound the list:
//! - `HEAD.next` = Most recently used
//! - `TAIL.prev` = Least recently used

use crate::cache::CacheEntry;

/// Slot handle of the head sentinel.
const HEAD: usize = 0;
/// Slot handle of the tail sentinel.
const TAIL: usize = 1;

// == Slot ==
#[derive(Debug)]
struct Slot<K, V> {
    /// None for sentinels and free slots
    entry: Option<CacheEntry<K, V>>,
    prev: usize,
    next: usize,
}

impl<K, V> Slot<K, V> {
    fn vacant() -> Self {
        Self {
            entry: None,
            prev: HEAD,
            next: TAIL,
        }
    }
}

// == Recency List ==
/// Doubly linked recency order over an arena of entries.
///
/// Handles returned by [`RecencyList::push_front`] stay valid until the entry
/// is removed, after which the slot is recycled through the free list.
#[derive(Debug)]
pub struct RecencyList<K, V> {
    slots: Vec<Slot<K, V>>,
    /// Reclaimed slot handles
    free: Vec<usize>,
    len: usize,
}

impl<K, V> Default for RecencyList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecencyList<K, V> {
    // == Constructor ==
    /// Creates an empty list holding only the two sentinels.
    pub fn new() -> Self {
        let head = Slot {
            entry: None,
            prev: HEAD,
            next: TAIL,
        };
        let tail = Slot {
            entry: None,
            prev: HEAD,
            next: TAIL,
        };

        Self {
            slots: vec![head, tail],
            free: Vec::new(),
            len: 0,
        }
    }

    // == Push Front ==
    /// Stores an entry as the most recently used one and returns its handle.
    pub fn push_front(&mut self, entry: CacheEntry<K, V>) -> usize {
        let handle = match self.free.pop() {
            Some(handle) => handle,
            None => {
                self.slots.push(Slot::vacant());
                self.slots.len() - 1
            }
        };

        self.slots[handle].entry = Some(entry);
        self.link_front(handle);
        self.len += 1;
        handle
    }

    // == Move To Front ==
    /// Marks the entry at `handle` as most recently used.
    pub fn move_to_front(&mut self, handle: usize) {
        if self.slots[HEAD].next == handle {
            return;
        }
        self.unlink(handle);
        self.link_front(handle);
    }

    // == Remove ==
    /// Unlinks the entry at `handle` and recycles its slot.
    pub fn remove(&mut self, handle: usize) -> Option<CacheEntry<K, V>> {
        if handle <= TAIL {
            return None;
        }
        let entry = self.slots.get_mut(handle)?.entry.take()?;
        self.unlink(handle);
        self.free.push(handle);
        self.len -= 1;
        Some(entry)
    }

    // == Pop Back ==
    /// Removes and returns the least recently used entry.
    ///
    /// Returns None if the list is empty.
    pub fn pop_back(&mut self) -> Option<CacheEntry<K, V>> {
        let handle = self.slots[TAIL].prev;
        self.remove(handle)
    }

    // == Peek Back ==
    /// Returns the least recently used entry without removing it.
    pub fn peek_back(&self) -> Option<&CacheEntry<K, V>> {
        self.slots[self.slots[TAIL].prev].entry.as_ref()
    }

    // == Entry Access ==
    pub fn get(&self, handle: usize) -> Option<&CacheEntry<K, V>> {
        self.slots.get(handle)?.entry.as_ref()
    }

    pub fn get_mut(&mut self, handle: usize) -> Option<&mut CacheEntry<K, V>> {
        self.slots.get_mut(handle)?.entry.as_mut()
    }

    // == Drain ==
    /// Removes every entry, most recently used first.
    pub fn drain(&mut self) -> Vec<CacheEntry<K, V>> {
        let mut drained = Vec::with_capacity(self.len);
        let mut cursor = self.slots[HEAD].next;
        while cursor != TAIL {
            let next = self.slots[cursor].next;
            if let Some(entry) = self.slots[cursor].entry.take() {
                drained.push(entry);
            }
            cursor = next;
        }

        self.slots.truncate(2);
        self.slots[HEAD].next = TAIL;
        self.slots[TAIL].prev = HEAD;
        self.free.clear();
        self.len = 0;
        drained
    }

    // == Iteration ==
    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<K, V>> + '_ {
        let mut cursor = self.slots[HEAD].next;
        std::iter::from_fn(move || {
            if cursor == TAIL {
                return None;
            }
            let slot = &self.slots[cursor];
            cursor = slot.next;
            slot.entry.as_ref()
        })
    }

    // == Length ==
    /// Returns the number of linked entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn link_front(&mut self, handle: usize) {
        let first = self.slots[HEAD].next;
        self.slots[handle].prev = HEAD;
        self.slots[handle].next = first;
        self.slots[first].prev = handle;
        self.slots[HEAD].next = handle;
    }

    fn unlink(&mut self, handle: usize) {
        let (prev, next) = (self.slots[handle].prev, self.slots[handle].next);
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
    }
}
