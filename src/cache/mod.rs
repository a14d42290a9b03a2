//! Bounded Cache Engines
//!
//! Every collection owns exactly one cache engine that mirrors the documents persisted
//! on this node. The engine is chosen and sized when the collection is created.
//!
//! ## Policies
//! - **LRU**: evicts the single least-recently-touched entry when a full cache receives a new key.
//! - **LFU**: tracks access frequency in buckets and evicts a batch of the least-frequently
//!   used entries (`capacity * eviction_factor`) when a full cache receives a new key.
//!
//! All operations of one engine are serialized behind a single lock so that the key map and
//! the eviction bookkeeping never drift apart.

pub mod factory;
pub mod lfu;
pub mod lru;

pub use factory::{DEFAULT_EVICTION_FACTOR, EvictionAlgorithm, create_cache, validate_settings};
pub use lfu::LfuCache;
pub use lru::LruCache;

use thiserror::Error;

/// Contract shared by every eviction policy.
pub trait CacheEngine<K, V>: Send + Sync {
    /// Returns the value and records the access for the eviction policy.
    fn get(&self, key: &K) -> Option<V>;

    /// Inserts or replaces the value, returning the previous one.
    fn put(&self, key: K, value: V) -> Option<V>;

    /// Inserts only when the key is absent.
    ///
    /// When the key is already present the stored value is left untouched and the
    /// *argument* is handed back, so callers cannot distinguish "inserted" from
    /// "already present" by `Some` alone.
    fn put_if_absent(&self, key: K, value: V) -> Option<V>;

    fn remove(&self, key: &K) -> Option<V>;

    fn contains(&self, key: &K) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;
}

/// Largest capacity an engine accepts. LFU allocates one bucket per unit of capacity.
pub const MAX_CAPACITY: usize = 1 << 20;

#[derive(Debug, Error, PartialEq)]
pub enum CacheError {
    #[error("cache capacity must be within 1..={MAX_CAPACITY}, got {0}")]
    InvalidCapacity(usize),

    #[error("eviction factor must be within (0, 1), got {0}")]
    InvalidEvictionFactor(f64),
}

#[cfg(test)]
mod tests;
