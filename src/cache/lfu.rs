use super::{CacheEngine, CacheError, MAX_CAPACITY};

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Frequency-bucketed cache.
///
/// Bucket `f` holds every entry accessed `f` times, capped at `capacity - 1`. Inside a
/// bucket entries are ordered by their last access tick, so the oldest one is the first
/// eviction victim. Once an entry reaches the top bucket its frequency is pinned and
/// further reads only refresh its position within that bucket.
///
/// Inserting a new key into a full cache evicts `capacity * eviction_factor` entries
/// (at least one), walking upwards from the lowest nonempty bucket.
pub struct LfuCache<K, V> {
    capacity: usize,
    batch: usize,
    state: Mutex<LfuState<K, V>>,
}

struct LfuEntry<V> {
    value: V,
    frequency: usize,
    tick: u64,
}

struct LfuState<K, V> {
    entries: HashMap<K, LfuEntry<V>>,
    buckets: Vec<BTreeMap<u64, K>>,
    min_frequency: usize,
    max_frequency: usize,
    clock: u64,
}

impl<K, V> LfuCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize, eviction_factor: f64) -> Result<Self, CacheError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(CacheError::InvalidCapacity(capacity));
        }
        if !(eviction_factor > 0.0 && eviction_factor < 1.0) {
            return Err(CacheError::InvalidEvictionFactor(eviction_factor));
        }

        let batch = ((capacity as f64) * eviction_factor).floor().max(1.0) as usize;

        Ok(Self {
            capacity,
            batch,
            state: Mutex::new(LfuState {
                entries: HashMap::with_capacity(capacity),
                buckets: (0..capacity).map(|_| BTreeMap::new()).collect(),
                min_frequency: 0,
                max_frequency: capacity - 1,
                clock: 0,
            }),
        })
    }

    /// Number of entries dropped by one eviction pass.
    pub fn eviction_batch(&self) -> usize {
        self.batch
    }
}

impl<K, V> LfuState<K, V>
where
    K: Eq + Hash + Clone,
{
    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn advance_min_frequency(&mut self) {
        while self.min_frequency <= self.max_frequency
            && self.buckets[self.min_frequency].is_empty()
        {
            self.min_frequency += 1;
        }
        if self.min_frequency > self.max_frequency {
            self.min_frequency = 0;
        }
    }

    fn evict(&mut self, batch: usize) {
        let mut evicted = 0;
        while evicted < batch && !self.entries.is_empty() {
            let Some((_, key)) = self.buckets[self.min_frequency].pop_first() else {
                self.advance_min_frequency();
                continue;
            };
            self.entries.remove(&key);
            evicted += 1;

            if self.buckets[self.min_frequency].is_empty() {
                self.advance_min_frequency();
            }
        }
    }

    fn upsert(&mut self, capacity: usize, batch: usize, key: K, value: V) -> Option<V> {
        if let Some(entry) = self.entries.get_mut(&key) {
            return Some(std::mem::replace(&mut entry.value, value));
        }

        if self.entries.len() == capacity {
            self.evict(batch);
        }

        let tick = self.next_tick();
        self.buckets[0].insert(tick, key.clone());
        self.entries.insert(
            key,
            LfuEntry {
                value,
                frequency: 0,
                tick,
            },
        );
        self.min_frequency = 0;
        None
    }
}

impl<K, V> CacheEngine<K, V> for LfuCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.state.lock();
        let tick = guard.next_tick();
        let state = &mut *guard;

        let entry = state.entries.get_mut(key)?;
        let current = entry.frequency;
        state.buckets[current].remove(&entry.tick);

        if current < state.max_frequency {
            let next = current + 1;
            state.buckets[next].insert(tick, key.clone());
            entry.frequency = next;
            if state.min_frequency == current && state.buckets[current].is_empty() {
                state.min_frequency = next;
            }
        } else {
            state.buckets[current].insert(tick, key.clone());
        }
        entry.tick = tick;

        Some(entry.value.clone())
    }

    fn put(&self, key: K, value: V) -> Option<V> {
        self.state.lock().upsert(self.capacity, self.batch, key, value)
    }

    fn put_if_absent(&self, key: K, value: V) -> Option<V> {
        let mut state = self.state.lock();
        if state.entries.contains_key(&key) {
            return Some(value);
        }
        state.upsert(self.capacity, self.batch, key, value)
    }

    fn remove(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let entry = state.entries.remove(key)?;
        state.buckets[entry.frequency].remove(&entry.tick);
        if state.min_frequency == entry.frequency && state.buckets[entry.frequency].is_empty() {
            state.advance_min_frequency();
        }
        Some(entry.value)
    }

    fn contains(&self, key: &K) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
