use super::{CacheEngine, CacheError, MAX_CAPACITY};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;

/// Recency-ordered cache. Entries live in an arena and are linked by slot index,
/// head is the most recently used entry and tail the next eviction victim.
pub struct LruCache<K, V> {
    capacity: usize,
    state: Mutex<LruState<K, V>>,
}

struct Slot<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct LruState<K, V> {
    index: HashMap<K, usize>,
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(CacheError::InvalidCapacity(capacity));
        }

        Ok(Self {
            capacity,
            state: Mutex::new(LruState {
                index: HashMap::with_capacity(capacity),
                slots: Vec::with_capacity(capacity),
                free: Vec::new(),
                head: None,
                tail: None,
            }),
        })
    }
}

impl<K, V> LruState<K, V>
where
    K: Eq + Hash + Clone,
{
    fn slot(&self, idx: usize) -> &Slot<K, V> {
        self.slots[idx].as_ref().expect("linked slot is occupied")
    }

    fn slot_mut(&mut self, idx: usize) -> &mut Slot<K, V> {
        self.slots[idx].as_mut().expect("linked slot is occupied")
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slot(idx);
            (slot.prev, slot.next)
        };

        match prev {
            Some(p) => self.slot_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slot_mut(n).prev = prev,
            None => self.tail = prev,
        }

        let slot = self.slot_mut(idx);
        slot.prev = None;
        slot.next = None;
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let slot = self.slot_mut(idx);
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(h) = old_head {
            self.slot_mut(h).prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.detach(idx);
            self.attach_front(idx);
        }
    }

    fn allocate(&mut self, key: K, value: V) -> usize {
        let slot = Slot {
            key,
            value,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Slot<K, V> {
        self.detach(idx);
        self.free.push(idx);
        self.slots[idx].take().expect("released slot is occupied")
    }

    fn upsert(&mut self, capacity: usize, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.index.get(&key) {
            let previous = std::mem::replace(&mut self.slot_mut(idx).value, value);
            self.touch(idx);
            return Some(previous);
        }

        if self.index.len() == capacity {
            self.evict_tail();
        }

        let idx = self.allocate(key.clone(), value);
        self.attach_front(idx);
        self.index.insert(key, idx);
        None
    }

    fn evict_tail(&mut self) {
        if let Some(tail) = self.tail {
            let evicted = self.release(tail);
            self.index.remove(&evicted.key);
        }
    }
}

impl<K, V> CacheEngine<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let idx = *state.index.get(key)?;
        state.touch(idx);
        Some(state.slot(idx).value.clone())
    }

    fn put(&self, key: K, value: V) -> Option<V> {
        self.state.lock().upsert(self.capacity, key, value)
    }

    fn put_if_absent(&self, key: K, value: V) -> Option<V> {
        let mut state = self.state.lock();
        if state.index.contains_key(&key) {
            return Some(value);
        }
        state.upsert(self.capacity, key, value)
    }

    fn remove(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let idx = state.index.remove(key)?;
        Some(state.release(idx).value)
    }

    fn contains(&self, key: &K) -> bool {
        self.state.lock().index.contains_key(key)
    }

    fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
