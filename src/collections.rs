use std::collections::{HashSet, VecDeque};
use core::hash::Hash;

/// FIFO work queue that admits every key at most once over its lifetime.
///
/// Used as the breadth-first frontier of the hierarchy walk: a key that was
/// already queued (or already popped) is never queued again, so shared
/// ancestors and cycles in the located-in graph are processed once.
pub struct Frontier<K>
where
    K: Clone,
    K: PartialEq + Eq,
    K: Hash,
{
    queue: VecDeque<(K, usize)>,
    seen: HashSet<K>,
}

impl<K> Frontier<K>
where
    K: Clone,
    K: PartialEq + Eq,
    K: Hash,
{
    pub fn new() -> Self {
        Frontier {
            queue: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Queues `key` at `depth`. Returns `false` if the key was seen before.
    pub fn push_back(&mut self, key: K, depth: usize) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.queue.push_back((key, depth));
        true
    }

    /// Pops the oldest queued key together with its depth.
    pub fn pop_front(&mut self) -> Option<(K, usize)> {
        self.queue.pop_front()
    }
}

impl<K> Default for Frontier<K>
where
    K: Clone + PartialEq + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
