//! Fixed-capacity LRU store shared by every lookup in the process.

use std::{collections::HashMap, sync::Mutex};

use metrics::counter;
use thiserror::Error;

use super::lock::lock_arena;

type NodeIndex = usize;

const NIL: NodeIndex = usize::MAX;

/// Minimal key/value contract the lookup services depend on.
///
/// Callers own key namespacing; the cache treats every key as opaque.
pub trait KeyValueCache<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    fn put(&self, key: String, value: V);
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cache capacity must be a positive integer, got {capacity}")]
pub struct InvalidCapacity {
    pub capacity: usize,
}

#[derive(Debug)]
struct Node<V> {
    key: String,
    value: V,
    /// Toward the most recently used end.
    prev: NodeIndex,
    /// Toward the least recently used end.
    next: NodeIndex,
}

/// Arena-backed recency list plus key index. Not synchronised on its own.
#[derive(Debug)]
struct LruState<V> {
    nodes: Vec<Node<V>>,
    free: Vec<NodeIndex>,
    index: HashMap<String, NodeIndex>,
    head: NodeIndex,
    tail: NodeIndex,
}

impl<V> LruState<V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: NIL,
            tail: NIL,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn unlink(&mut self, idx: NodeIndex) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);

        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }

        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    fn push_front(&mut self, idx: NodeIndex) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;

        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;

        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn promote(&mut self, idx: NodeIndex) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    /// Detach the least recently used node and hand back its slot.
    fn pop_back(&mut self) -> Option<NodeIndex> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        self.unlink(idx);
        self.index.remove(&self.nodes[idx].key);
        Some(idx)
    }

    fn allocate(&mut self, node: Node<V>) -> NodeIndex {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }
}

/// Bounded, thread-safe LRU cache keyed by string.
///
/// `get` promotes on hit, so reads take the same exclusive lock as writes.
/// The lock is never held across an `.await`.
#[derive(Debug)]
pub struct BoundedCache<V> {
    capacity: usize,
    state: Mutex<LruState<V>>,
}

impl<V: Clone> BoundedCache<V> {
    /// Build a cache holding at most `capacity` entries.
    ///
    /// A zero capacity is rejected rather than clamped.
    pub fn new(capacity: usize) -> Result<Self, InvalidCapacity> {
        if capacity == 0 {
            return Err(InvalidCapacity { capacity });
        }

        Ok(Self {
            capacity,
            state: Mutex::new(LruState::with_capacity(capacity)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        lock_arena(&self.state, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership check that leaves the recency order untouched.
    pub fn contains(&self, key: &str) -> bool {
        lock_arena(&self.state, "contains")
            .index
            .contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = lock_arena(&self.state, "get");
        let Some(&idx) = state.index.get(key) else {
            counter!("pokedex_cache_miss_total").increment(1);
            return None;
        };

        state.promote(idx);
        counter!("pokedex_cache_hit_total").increment(1);
        Some(state.nodes[idx].value.clone())
    }

    pub fn put(&self, key: String, value: V) {
        let mut state = lock_arena(&self.state, "put");

        if let Some(&idx) = state.index.get(&key) {
            state.nodes[idx].value = value;
            state.promote(idx);
            return;
        }

        if state.len() == self.capacity {
            if let Some(slot) = state.pop_back() {
                state.free.push(slot);
                counter!("pokedex_cache_evict_total").increment(1);
            }
        }

        let idx = state.allocate(Node {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        });
        state.index.insert(key, idx);
        state.push_front(idx);
    }
}

impl<V> KeyValueCache<V> for BoundedCache<V>
where
    V: Clone + Send,
{
    fn get(&self, key: &str) -> Option<V> {
        BoundedCache::get(self, key)
    }

    fn put(&self, key: String, value: V) {
        BoundedCache::put(self, key, value)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{AssertUnwindSafe, catch_unwind},
        sync::Arc,
        thread,
    };

    use super::*;

    fn cache(capacity: usize) -> BoundedCache<i32> {
        BoundedCache::new(capacity).expect("positive capacity")
    }

    /// Walk the recency list front to back and check it against the index.
    fn recency_keys(cache: &BoundedCache<i32>) -> Vec<String> {
        let state = lock_arena(&cache.state, "test");
        let mut keys = Vec::new();
        let mut cursor = state.head;
        let mut last = NIL;
        while cursor != NIL {
            let node = &state.nodes[cursor];
            assert_eq!(node.prev, last, "back link broken at {}", node.key);
            assert_eq!(state.index.get(&node.key), Some(&cursor));
            keys.push(node.key.clone());
            last = cursor;
            cursor = node.next;
        }
        assert_eq!(state.tail, last);
        assert_eq!(keys.len(), state.index.len());
        keys
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = BoundedCache::<i32>::new(0).expect_err("zero capacity must fail");
        assert_eq!(err, InvalidCapacity { capacity: 0 });
    }

    #[test]
    fn new_cache_is_empty_with_fixed_capacity() {
        let cache = cache(3);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 3);

        cache.put("mew".to_string(), 151);
        assert!(!cache.is_empty());
        assert_eq!(cache.capacity(), 3);
    }

    #[test]
    fn put_then_get_returns_value() {
        let cache = cache(2);
        cache.put("mew".to_string(), 151);
        assert_eq!(cache.get("mew"), Some(151));
    }

    #[test]
    fn miss_does_not_change_size() {
        let cache = cache(2);
        cache.put("mew".to_string(), 151);
        assert_eq!(cache.get("pikachu"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_one_evicts_previous_entry() {
        let cache = cache(1);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn read_refreshes_recency() {
        let cache = cache(2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.put("c".to_string(), 3);

        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn update_replaces_value_in_place() {
        let cache = cache(1);
        cache.put("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));
        cache.put("a".to_string(), 3);
        assert_eq!(cache.get("a"), Some(3));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn update_promotes_existing_key() {
        let cache = cache(2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("a".to_string(), 10);
        cache.put("c".to_string(), 3);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert_eq!(recency_keys(&cache), ["c", "a"]);
    }

    #[test]
    fn contains_does_not_promote() {
        let cache = cache(2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        assert!(cache.contains("a"));
        cache.put("c".to_string(), 3);
        assert!(!cache.contains("a"));
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let cache = cache(3);
        for i in 0..50 {
            cache.put(format!("key-{i}"), i);
            assert!(cache.len() <= 3);
        }
        assert_eq!(recency_keys(&cache), ["key-49", "key-48", "key-47"]);
    }

    #[test]
    fn evicted_slots_are_reused() {
        let cache = cache(2);
        for i in 0..10 {
            cache.put(format!("key-{i}"), i);
        }
        let state = lock_arena(&cache.state, "test");
        assert!(state.nodes.len() <= 2);
    }

    #[test]
    fn concurrent_access_keeps_structure_consistent() {
        let cache = Arc::new(cache(8));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("k{}", (worker * 7 + i) % 20);
                        if i % 3 == 0 {
                            let _ = cache.get(&key);
                        } else {
                            cache.put(key, i);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker thread");
        }

        assert!(cache.len() <= 8);
        recency_keys(&cache);
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let cache = cache(2);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.state.lock().expect("lock should be acquired");
            panic!("poison cache lock");
        }));
        assert!(cache.state.is_poisoned());

        cache.put("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));
        assert!(!cache.state.is_poisoned());
    }
}
