// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded least-recently-used store for the in-process tier.
//!
//! ```text
//!   index: HashMap<String, slot>
//!              │
//!              ▼
//!   head ──► [D] ◄──► [A] ◄──► [B] ◄── tail
//!            MRU                LRU (next eviction)
//! ```
//!
//! Nodes live in a slab (`Vec<Option<Node>>`) and link to each other by slot
//! index, so the list is doubly linked without any unsafe pointer juggling.
//! Freed slots are recycled through a free list.
//!
//! A single `parking_lot::Mutex` guards the whole structure. `get` takes it
//! too: a hit promotes the key, which rewrites the order.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use parking_lot::Mutex;

#[derive(Debug)]
struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Single-threaded core: index + slab-backed linked list.
#[derive(Debug)]
struct LruCore<V> {
    index: HashMap<String, usize>,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
}

impl<V> LruCore<V> {
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity.min(4096)),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            capacity,
        }
    }

    fn node(&self, slot: usize) -> &Node<V> {
        self.slots[slot].as_ref().expect("linked slot is occupied")
    }

    fn node_mut(&mut self, slot: usize) -> &mut Node<V> {
        self.slots[slot].as_mut().expect("linked slot is occupied")
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let n = self.node(slot);
            (n.prev, n.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let n = self.node_mut(slot);
        n.prev = None;
        n.next = None;
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        {
            let n = self.node_mut(slot);
            n.prev = None;
            n.next = old_head;
        }
        match old_head {
            Some(h) => self.node_mut(h).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    fn promote(&mut self, slot: usize) {
        if self.head != Some(slot) {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    fn remove_slot(&mut self, slot: usize) -> (String, V) {
        self.unlink(slot);
        let node = self.slots[slot].take().expect("linked slot is occupied");
        self.free.push(slot);
        self.index.remove(&node.key);
        (node.key, node.value)
    }

    fn set(&mut self, key: String, value: V) -> Option<(String, V)> {
        if let Some(&slot) = self.index.get(&key) {
            self.node_mut(slot).value = value;
            self.promote(slot);
            return None;
        }

        let evicted = match self.tail {
            Some(tail) if self.index.len() >= self.capacity => Some(self.remove_slot(tail)),
            _ => None,
        };

        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.push_front(slot);
        self.index.insert(key, slot);

        evicted
    }

    fn touch(&mut self, key: &str) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.promote(slot);
        Some(&self.node(slot).value)
    }

    fn peek(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.node(slot).value)
    }

    fn delete(&mut self, key: &str) -> Option<V> {
        let slot = *self.index.get(key)?;
        Some(self.remove_slot(slot).1)
    }

    /// Walk from head (MRU) to tail (LRU).
    fn iter(&self) -> impl Iterator<Item = &Node<V>> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let slot = cursor?;
            let node = self.node(slot);
            cursor = node.next;
            Some(node)
        })
    }

    fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }
}

/// Thread-safe, capacity-bounded LRU keyed by `String`.
///
/// # Example
///
/// ```
/// use std::num::NonZeroUsize;
/// use tiered_cache::LruStore;
///
/// let lru = LruStore::new(NonZeroUsize::new(2).unwrap());
/// lru.set("a", 1);
/// lru.set("b", 2);
/// lru.get("a");          // a is now most recently used
/// let evicted = lru.set("c", 3);
///
/// assert_eq!(evicted, Some(("b".to_string(), 2)));
/// assert_eq!(lru.keys(), vec!["c", "a"]);
/// ```
#[derive(Debug)]
pub struct LruStore<V> {
    inner: Mutex<LruCore<V>>,
}

impl<V: Clone> LruStore<V> {
    /// A zero capacity cannot be expressed; configuration validation rejects it.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCore::new(capacity.get())),
        }
    }

    /// Insert or replace, promoting the key to most-recently-used.
    ///
    /// Returns the entry evicted to make room, if any. Replacing an existing
    /// key never evicts.
    pub fn set(&self, key: impl Into<String>, value: V) -> Option<(String, V)> {
        self.inner.lock().set(key.into(), value)
    }

    /// Look up and promote on hit. A miss has no side effects.
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().touch(key).cloned()
    }

    /// Look up without touching recency.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.inner.lock().peek(key).cloned()
    }

    /// Remove if present.
    pub fn delete(&self, key: &str) -> Option<V> {
        self.inner.lock().delete(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().index.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Resident keys, most- to least-recently-used.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().iter().map(|n| n.key.clone()).collect()
    }

    /// Resident entries, most- to least-recently-used.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, V)> {
        self.inner
            .lock()
            .iter()
            .map(|n| (n.key.clone(), n.value.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
