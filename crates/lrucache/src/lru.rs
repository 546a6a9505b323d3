//! LRU (Least Recently Used) core
//!
//! Entries live in a slot arena with explicit `prev`/`next` links, so
//! promotion and eviction are O(1) without pointer aliasing. The index maps
//! each key to its slot.

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use ahash::RandomState;

/// Node in the recency list
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Single-threaded LRU structure with fixed capacity
///
/// `head` is the most recently used slot, `tail` the next eviction candidate.
pub(crate) struct Lru<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    capacity: usize,
}

impl<K, V> Lru<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty structure holding at most `capacity` entries
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();

        Self {
            map: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_list: Vec::new(),
            capacity,
        }
    }

    /// Look up a value and mark it most recently used
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Look up a value without touching the recency order
    pub(crate) fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or update a key and mark it most recently used
    ///
    /// Updating a resident key never evicts. Inserting a new key into a full
    /// structure evicts the tail first; the evicted pair is returned.
    pub(crate) fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.map.get(&key) {
            if let Some(node) = &mut self.nodes[idx] {
                node.value = value;
            }
            self.move_to_front(idx);
            return None;
        }

        let evicted = if self.map.len() >= self.capacity {
            self.evict()
        } else {
            None
        };

        let idx = self.alloc_node();
        self.nodes[idx] = Some(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.push_front(idx);
        self.map.insert(key, idx);

        evicted
    }

    /// Remove a key, handing back its value
    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        self.free_node(idx);
        self.nodes[idx].take().map(|node| node.value)
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop every entry; capacity is unchanged
    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys from most to least recently used
    pub(crate) fn keys(&self) -> Keys<'_, K, V> {
        Keys {
            nodes: &self.nodes,
            cursor: self.head,
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        self.unlink(idx);
        self.push_front(idx);
    }

    /// Link a detached slot in at the head
    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = old_head;
        }

        match old_head {
            Some(head_idx) => {
                if let Some(head) = &mut self.nodes[head_idx] {
                    head.prev = Some(idx);
                }
            }
            None => {
                self.tail = Some(idx);
            }
        }

        self.head = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = if let Some(node) = &mut self.nodes[idx] {
            (node.prev.take(), node.next.take())
        } else {
            return;
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => {
                self.head = next;
            }
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => {
                self.tail = prev;
            }
        }
    }

    fn evict(&mut self) -> Option<(K, V)> {
        let tail_idx = self.tail?;
        // Unlink while the node is still in place so the neighbours get patched.
        self.unlink(tail_idx);
        let node = self.nodes[tail_idx].take()?;
        self.map.remove(&node.key);
        self.free_node(tail_idx);
        Some((node.key, node.value))
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.free_list.push(idx);
    }

    /// Panics if the index and the recency list disagree
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.nodes[idx].as_ref().expect("linked slot is empty");
            assert_eq!(node.prev, prev, "broken back link at slot {}", idx);
            assert_eq!(self.map.get(&node.key), Some(&idx), "index points elsewhere");
            assert!(seen.insert(idx), "cycle at slot {}", idx);
            prev = Some(idx);
            cursor = node.next;
        }

        assert_eq!(self.tail, prev, "tail is not the last linked slot");
        assert_eq!(seen.len(), self.map.len(), "index and list sizes differ");
        assert!(self.map.len() <= self.capacity, "capacity exceeded");
        for &idx in &self.free_list {
            assert!(self.nodes[idx].is_none(), "free slot {} still occupied", idx);
        }
    }
}

/// Iterator over keys, most recently used first
pub(crate) struct Keys<'a, K, V> {
    nodes: &'a [Option<Node<K, V>>],
    cursor: Option<usize>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes[self.cursor?].as_ref()?;
        self.cursor = node.next;
        Some(&node.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lru<V>(capacity: usize) -> Lru<i32, V> {
        Lru::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn order<V>(lru: &Lru<i32, V>) -> Vec<i32> {
        lru.keys().copied().collect()
    }

    #[test]
    fn test_lru_basic() {
        let mut cache = lru(2);

        cache.put(1, "a");
        cache.put(2, "b");

        assert_eq!(cache.get(&1), Some(&"a"));
        assert_eq!(cache.get(&2), Some(&"b"));
        assert_eq!(cache.len(), 2);
        cache.assert_consistent();
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = lru(2);

        assert_eq!(cache.put(1, "a"), None);
        assert_eq!(cache.put(2, "b"), None);
        assert_eq!(cache.put(3, "c"), Some((1, "a")));

        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(&"b"));
        assert_eq!(cache.get(&3), Some(&"c"));
        cache.assert_consistent();
    }

    #[test]
    fn test_lru_get_promotes() {
        let mut cache = lru(2);

        cache.put(1, "a");
        cache.put(2, "b");
        cache.get(&1);
        assert_eq!(cache.put(3, "c"), Some((2, "b")));

        assert_eq!(cache.get(&1), Some(&"a"));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3), Some(&"c"));
    }

    #[test]
    fn test_lru_peek_does_not_promote() {
        let mut cache = lru(2);

        cache.put(1, "a");
        cache.put(2, "b");
        assert_eq!(cache.peek(&1), Some(&"a"));
        assert_eq!(order(&cache), vec![2, 1]);

        assert_eq!(cache.put(3, "c"), Some((1, "a")));
        assert!(!cache.contains(&1));
    }

    #[test]
    fn test_lru_remove() {
        let mut cache = lru(3);

        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(3, "c");

        assert_eq!(cache.remove(&2), Some("b"));
        assert_eq!(cache.remove(&2), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), None);
        assert_eq!(order(&cache), vec![3, 1]);
        cache.assert_consistent();
    }

    #[test]
    fn test_lru_remove_head_and_tail() {
        let mut cache = lru(3);

        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(3, "c");

        cache.remove(&3);
        cache.assert_consistent();
        cache.remove(&1);
        cache.assert_consistent();
        assert_eq!(order(&cache), vec![2]);

        cache.remove(&2);
        cache.assert_consistent();
        assert!(cache.is_empty());
        assert_eq!(order(&cache), Vec::<i32>::new());
    }

    #[test]
    fn test_lru_clear() {
        let mut cache = lru(3);

        cache.put(1, "a");
        cache.put(2, "b");
        cache.clear();

        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity, 3);

        cache.put(3, "c");
        assert_eq!(cache.get(&3), Some(&"c"));
        cache.assert_consistent();
    }

    #[test]
    fn test_lru_overwrite() {
        let mut cache = lru(2);

        cache.put(1, "a");
        cache.put(1, "b");

        assert_eq!(cache.get(&1), Some(&"b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_overwrite_at_capacity_does_not_evict() {
        let mut cache = lru(1);

        cache.put(1, "a");
        assert_eq!(cache.put(1, "b"), None);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&1), Some(&"b"));
    }

    #[test]
    fn test_lru_overwrite_promotes() {
        let mut cache = lru(2);

        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(1, "z");
        assert_eq!(order(&cache), vec![1, 2]);

        assert_eq!(cache.put(3, "c"), Some((2, "b")));
    }

    #[test]
    fn test_lru_slots_are_reused() {
        let mut cache = lru(4);

        for i in 0..1000 {
            cache.put(i, i * 10);
        }

        assert_eq!(cache.len(), 4);
        assert_eq!(cache.nodes.len(), 4);
        assert_eq!(order(&cache), vec![999, 998, 997, 996]);
        cache.assert_consistent();
    }

    #[test]
    fn test_lru_resident_set_is_most_recent() {
        let mut cache = lru(3);
        let touches = [1, 2, 3, 1, 4, 2, 5, 1, 6];

        for &key in &touches {
            cache.put(key, ());
            assert!(cache.len() <= 3);
        }

        assert_eq!(order(&cache), vec![6, 1, 5]);
        cache.assert_consistent();
    }
}
