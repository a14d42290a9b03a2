use super::{CacheEngine, CacheError, LfuCache, LruCache, MAX_CAPACITY};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;

/// Batch fraction used by LFU caches unless the collection asks for another one.
pub const DEFAULT_EVICTION_FACTOR: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionAlgorithm {
    Lru,
    Lfu,
}

impl EvictionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionAlgorithm::Lru => "LRU",
            EvictionAlgorithm::Lfu => "LFU",
        }
    }
}

impl fmt::Display for EvictionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionAlgorithm {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.eq_ignore_ascii_case("LRU") {
            Ok(EvictionAlgorithm::Lru)
        } else if name.eq_ignore_ascii_case("LFU") {
            Ok(EvictionAlgorithm::Lfu)
        } else {
            Err(format!(
                "unknown eviction algorithm '{}': algorithm might be either LFU or LRU",
                name
            ))
        }
    }
}

impl Serialize for EvictionAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EvictionAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Checks engine parameters without allocating an engine.
pub fn validate_settings(
    algorithm: EvictionAlgorithm,
    capacity: usize,
    eviction_factor: f64,
) -> Result<(), CacheError> {
    if capacity == 0 || capacity > MAX_CAPACITY {
        return Err(CacheError::InvalidCapacity(capacity));
    }
    if algorithm == EvictionAlgorithm::Lfu && !(eviction_factor > 0.0 && eviction_factor < 1.0) {
        return Err(CacheError::InvalidEvictionFactor(eviction_factor));
    }
    Ok(())
}

/// Builds the engine backing one collection.
///
/// `eviction_factor` only matters for LFU; LRU always evicts a single entry.
pub fn create_cache<K, V>(
    algorithm: EvictionAlgorithm,
    capacity: usize,
    eviction_factor: f64,
) -> Result<Arc<dyn CacheEngine<K, V>>, CacheError>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    let cache: Arc<dyn CacheEngine<K, V>> = match algorithm {
        EvictionAlgorithm::Lru => Arc::new(LruCache::new(capacity)?),
        EvictionAlgorithm::Lfu => Arc::new(LfuCache::new(capacity, eviction_factor)?),
    };

    tracing::debug!(
        "Built {} cache with capacity {} (eviction factor {})",
        algorithm,
        capacity,
        eviction_factor
    );

    Ok(cache)
}
