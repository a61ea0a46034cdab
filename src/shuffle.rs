//! Keyed shuffle buffer: the accumulation point between the map and reduce
//! phases.
//!
//! Dozens of map workers write into the buffer concurrently, so a single
//! shared map would serialize them on one lock. Instead the key space is
//! fixed at [`KEY_SPACE`] buckets, each behind its own mutex; writers for
//! disjoint keys never contend.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Shuffle keys are bucket indices in `[0, KEY_SPACE)`.
pub type Key = usize;

/// Number of shuffle buckets. 768 covers the three 256-entry color channels
/// of the bitmap decomposition workload back to back.
pub const KEY_SPACE: usize = 768;

/// Fixed-size array of independently locked value buckets.
pub struct KeyedShuffleBuffer<V> {
    buckets: Vec<Mutex<Vec<V>>>,
}

impl<V> KeyedShuffleBuffer<V> {
    pub fn new() -> Self {
        Self {
            buckets: (0..KEY_SPACE).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    /// Append one value to `key`'s bucket. Locks only that bucket.
    ///
    /// # Panics
    ///
    /// Panics if `key >= KEY_SPACE` (a defect in the mapper).
    pub fn add(&self, key: Key, value: V) {
        self.buckets[key].lock().unwrap().push(value);
    }

    /// Append a batch of values to `key`'s bucket under one lock.
    pub fn add_many(&self, key: Key, values: Vec<V>) {
        self.buckets[key].lock().unwrap().extend(values);
    }

    /// Move every bucket's contents out as a key -> values mapping with
    /// exactly [`KEY_SPACE`] entries (empty keys included), leaving fresh
    /// empty buckets behind. Draining is the only way to read the buffer, so
    /// each shuffle epoch has at most one consumer.
    pub fn drain_map(&self) -> BTreeMap<Key, Vec<V>> {
        let mut result = BTreeMap::new();
        for (key, bucket) in self.buckets.iter().enumerate() {
            result.insert(key, std::mem::take(&mut *bucket.lock().unwrap()));
        }
        result
    }

    /// Like [`drain_map`](Self::drain_map), but as a dense array indexed by
    /// key.
    pub fn drain_dense(&self) -> Vec<Vec<V>> {
        self.buckets
            .iter()
            .map(|bucket| std::mem::take(&mut *bucket.lock().unwrap()))
            .collect()
    }
}

impl<V> Default for KeyedShuffleBuffer<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn drain_has_full_key_space() {
        let buffer = KeyedShuffleBuffer::<u32>::new();
        buffer.add(5, 50);
        buffer.add(5, 51);
        buffer.add_many(700, vec![1, 2, 3]);

        let map = buffer.drain_map();
        assert_eq!(map.len(), KEY_SPACE);
        assert_eq!(map[&5], vec![50, 51]);
        assert_eq!(map[&700], vec![1, 2, 3]);
        assert!(map[&0].is_empty());
    }

    #[test]
    fn drain_resets_buckets() {
        let buffer = KeyedShuffleBuffer::new();
        buffer.add(1, "a");
        let _ = buffer.drain_dense();
        let second = buffer.drain_dense();
        assert!(second.iter().all(Vec::is_empty));
    }

    #[test]
    fn concurrent_adds_lose_nothing() {
        let buffer = Arc::new(KeyedShuffleBuffer::new());
        let mut joins = Vec::new();
        for t in 0..8u64 {
            let buffer = Arc::clone(&buffer);
            joins.push(std::thread::spawn(move || {
                for i in 0..500u64 {
                    buffer.add(((t * 500 + i) % KEY_SPACE as u64) as Key, t * 500 + i);
                }
            }));
        }
        for j in joins {
            j.join().unwrap();
        }

        let dense = buffer.drain_dense();
        let mut all: Vec<u64> = dense.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, (0..4000).collect::<Vec<_>>());
    }

    #[test]
    #[should_panic]
    fn out_of_range_key_panics() {
        KeyedShuffleBuffer::new().add(KEY_SPACE, 0u8);
    }
}
