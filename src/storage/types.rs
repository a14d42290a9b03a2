use crate::cache::{DEFAULT_EVICTION_FACTOR, EvictionAlgorithm};

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_eviction_factor() -> f64 {
    DEFAULT_EVICTION_FACTOR
}

/// A named container of documents, replicated to every node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub name: String,
    pub algorithm: EvictionAlgorithm,
    pub cache_limit: usize,
    /// Share of the cache evicted per LFU pass. Ignored by LRU.
    #[serde(default = "default_eviction_factor")]
    pub eviction_factor: f64,
    /// Schema every document value must satisfy. `null` accepts anything.
    #[serde(default)]
    pub json_schema: Value,
}

impl Collection {
    pub fn new(name: impl Into<String>, algorithm: EvictionAlgorithm, cache_limit: usize) -> Self {
        Self {
            name: name.into(),
            algorithm,
            cache_limit,
            eviction_factor: DEFAULT_EVICTION_FACTOR,
            json_schema: Value::Null,
        }
    }

    pub fn with_eviction_factor(mut self, factor: f64) -> Self {
        self.eviction_factor = factor;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.json_schema = schema;
        self
    }

    /// True when switching from `other` to `self` needs a fresh cache engine.
    pub fn cache_settings_differ(&self, other: &Collection) -> bool {
        self.algorithm != other.algorithm
            || self.cache_limit != other.cache_limit
            || (self.algorithm == EvictionAlgorithm::Lfu
                && self.eviction_factor != other.eviction_factor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub key: String,
    pub value: Value,
}

impl Document {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}
