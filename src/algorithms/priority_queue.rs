use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::hash::Hash;

/// Real-valued priority with a total order so it can key a `BTreeMap`.
#[derive(Debug, Clone, Copy)]
struct Priority(f32);

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Min-priority queue mapping each priority to a FIFO group of items.
///
/// Items are unique: inserting an item that is already queued moves it to
/// the new priority (at the back of that priority's group).
#[derive(Debug, Clone)]
pub struct PriorityQueue<T> {
    buckets: BTreeMap<Priority, VecDeque<T>>,
    index: FxHashMap<T, Priority>,
}

impl<T: Copy + Eq + Hash> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Eq + Hash> PriorityQueue<T> {
    pub fn new() -> Self {
        PriorityQueue {
            buckets: BTreeMap::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn insert(&mut self, item: T, priority: f32) {
        debug_assert!(!priority.is_nan(), "NaN priority");
        self.remove(&item);
        let priority = Priority(priority);
        self.buckets.entry(priority).or_default().push_back(item);
        self.index.insert(item, priority);
    }

    /// Removes and returns the item with the smallest priority; equal
    /// priorities come out in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty.
    pub fn extract_min(&mut self) -> T {
        let mut entry = self
            .buckets
            .first_entry()
            .expect("extract_min called on an empty priority queue");
        let item = entry
            .get_mut()
            .pop_front()
            .expect("priority queue bucket left empty");
        if entry.get().is_empty() {
            entry.remove();
        }
        self.index.remove(&item);
        item
    }

    /// Smallest item and its priority without removing it.
    pub fn peek_min(&self) -> Option<(T, f32)> {
        self.buckets
            .iter()
            .next()
            .and_then(|(priority, bucket)| bucket.front().map(|&item| (item, priority.0)))
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index.contains_key(item)
    }

    /// Current priority of `item`, or `None` when it is not queued.
    pub fn priority_of(&self, item: &T) -> Option<f32> {
        self.index.get(item).map(|p| p.0)
    }

    /// Removes `item` wherever it sits. Returns its priority, or `None` if it
    /// was not queued.
    pub fn remove(&mut self, item: &T) -> Option<f32> {
        let priority = self.index.remove(item)?;
        if let Some(bucket) = self.buckets.get_mut(&priority) {
            if let Some(at) = bucket.iter().position(|queued| queued == item) {
                bucket.remove(at);
            }
            if bucket.is_empty() {
                self.buckets.remove(&priority);
            }
        }
        Some(priority.0)
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.index.clear();
    }
}
