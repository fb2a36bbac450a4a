//! Bucket min-queue with O(1) insert, key update and removal.
//!
//! Keys are small integers (at most 8 free coarse candidates per vertex).
//! Items with equal keys pop in LIFO order, which keeps coarsening
//! deterministic.

const ABSENT: usize = usize::MAX;

pub(crate) struct BucketQueue {
    buckets: Vec<Vec<usize>>,
    /// Current key of each item, `ABSENT` when not queued
    keys: Vec<usize>,
    /// Position of each item inside its bucket
    slots: Vec<usize>,
    min_key: usize,
    len: usize,
}

impl BucketQueue {
    pub fn new(items: usize, max_key: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); max_key + 1],
            keys: vec![ABSENT; items],
            slots: vec![0; items],
            min_key: max_key + 1,
            len: 0,
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn key(&self, item: usize) -> Option<usize> {
        match self.keys[item] {
            ABSENT => None,
            k => Some(k),
        }
    }

    pub fn insert(&mut self, item: usize, key: usize) {
        debug_assert_eq!(self.keys[item], ABSENT, "item {} queued twice", item);
        self.slots[item] = self.buckets[key].len();
        self.buckets[key].push(item);
        self.keys[item] = key;
        self.min_key = self.min_key.min(key);
        self.len += 1;
    }

    pub fn remove(&mut self, item: usize) {
        let key = self.keys[item];
        if key == ABSENT {
            return;
        }
        let slot = self.slots[item];
        let bucket = &mut self.buckets[key];
        bucket.swap_remove(slot);
        if let Some(&moved) = bucket.get(slot) {
            self.slots[moved] = slot;
        }
        self.keys[item] = ABSENT;
        self.len -= 1;
    }

    pub fn set_key(&mut self, item: usize, key: usize) {
        self.remove(item);
        self.insert(item, key);
    }

    /// Remove and return an item with the smallest key.
    pub fn pop_min(&mut self) -> Option<(usize, usize)> {
        if self.len == 0 {
            return None;
        }
        while self.buckets[self.min_key].is_empty() {
            self.min_key += 1;
        }
        let key = self.min_key;
        let item = self.buckets[key].pop()?;
        self.keys[item] = ABSENT;
        self.len -= 1;
        Some((item, key))
    }
}
