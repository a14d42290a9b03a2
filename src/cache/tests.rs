//! Cache Engine Tests
//!
//! Exercises both eviction policies through the shared `CacheEngine` contract.
//!
//! ## Test Scopes
//! - **LRU**: single-victim eviction order and recency promotion.
//! - **LFU**: frequency buckets, batched eviction and the pinned top bucket.
//! - **Factory**: algorithm parsing and construction errors.

#[cfg(test)]
mod tests {
    use crate::cache::{
        CacheEngine, CacheError, EvictionAlgorithm, LfuCache, LruCache, create_cache,
    };
    use std::sync::Arc;

    fn keys(cache: &dyn CacheEngine<String, u32>, candidates: &[&str]) -> Vec<String> {
        candidates
            .iter()
            .filter(|k| cache.contains(&k.to_string()))
            .map(|k| k.to_string())
            .collect()
    }

    // ============================================================
    // LRU TESTS
    // ============================================================

    #[test]
    fn test_lru_evicts_least_recently_inserted() {
        let cache = LruCache::new(3).unwrap();
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.put(key.to_string(), i as u32);
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&"a".to_string()), "oldest key must be evicted");
        assert_eq!(keys(&cache, &["a", "b", "c", "d"]), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_lru_get_protects_entry_from_eviction() {
        let cache = LruCache::new(3).unwrap();
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("c".to_string(), 3);

        // Touch "a" so "b" becomes the victim
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        cache.put("d".to_string(), 4);

        assert!(cache.contains(&"a".to_string()));
        assert!(!cache.contains(&"b".to_string()));
    }

    #[test]
    fn test_lru_put_existing_returns_previous_and_refreshes() {
        let cache = LruCache::new(2).unwrap();
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);

        assert_eq!(cache.put("a".to_string(), 10), Some(1));
        cache.put("c".to_string(), 3);

        assert_eq!(cache.get(&"a".to_string()), Some(10));
        assert!(!cache.contains(&"b".to_string()));
    }

    #[test]
    fn test_lru_remove_unlinks_entry() {
        let cache = LruCache::new(2).unwrap();
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);

        assert_eq!(cache.remove(&"b".to_string()), Some(2));
        assert!(!cache.contains(&"b".to_string()));
        assert_eq!(cache.remove(&"b".to_string()), None);

        // Freed slot is reused and "a" is now the tail
        cache.put("c".to_string(), 3);
        cache.put("d".to_string(), 4);
        assert_eq!(keys(&cache, &["a", "b", "c", "d"]), vec!["c", "d"]);
    }

    #[test]
    fn test_lru_capacity_one() {
        let cache = LruCache::new(1).unwrap();
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"b".to_string()), Some(2));
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn test_lru_rejects_zero_capacity() {
        let result = LruCache::<String, u32>::new(0);
        assert!(matches!(result, Err(CacheError::InvalidCapacity(0))));
    }

    // ============================================================
    // LFU TESTS
    // ============================================================

    #[test]
    fn test_lfu_evicts_lowest_frequency_bucket() {
        // ARRANGE: A=2, B=1, C=0
        let cache = LfuCache::new(3, 0.34).unwrap();
        cache.put("A".to_string(), 1);
        cache.put("B".to_string(), 2);
        cache.put("C".to_string(), 3);

        cache.get(&"A".to_string());
        cache.get(&"A".to_string());
        cache.get(&"B".to_string());

        // ACT
        assert_eq!(cache.eviction_batch(), 1);
        cache.put("D".to_string(), 4);

        // ASSERT: exactly C is gone
        assert_eq!(cache.len(), 3);
        assert_eq!(keys(&cache, &["A", "B", "C", "D"]), vec!["A", "B", "D"]);
    }

    #[test]
    fn test_lfu_batch_eviction_spans_buckets() {
        // floor(4 * 0.5) = 2 victims, one from bucket 0 and one from bucket 1
        let cache = LfuCache::new(4, 0.5).unwrap();
        for key in ["a", "b", "c", "d"] {
            cache.put(key.to_string(), 0);
        }
        cache.get(&"b".to_string());
        cache.get(&"c".to_string());
        cache.get(&"c".to_string());
        cache.get(&"d".to_string());
        cache.get(&"d".to_string());

        cache.put("e".to_string(), 0);

        assert_eq!(cache.len(), 3);
        assert_eq!(keys(&cache, &["a", "b", "c", "d", "e"]), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_lfu_oldest_entry_in_bucket_goes_first() {
        let cache = LfuCache::new(3, 0.34).unwrap();
        cache.put("x".to_string(), 0);
        cache.put("y".to_string(), 0);
        cache.put("z".to_string(), 0);

        cache.put("w".to_string(), 0);

        assert!(!cache.contains(&"x".to_string()));
        assert_eq!(keys(&cache, &["x", "y", "z", "w"]), vec!["y", "z", "w"]);
    }

    #[test]
    fn test_lfu_top_bucket_uses_recency_tie_break() {
        // Capacity 2 -> max frequency 1
        let cache = LfuCache::new(2, 0.5).unwrap();
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);

        cache.get(&"a".to_string());
        cache.get(&"b".to_string());
        // Both pinned at the top bucket; "a" refreshed last
        cache.get(&"a".to_string());

        cache.put("c".to_string(), 3);

        assert!(cache.contains(&"a".to_string()));
        assert!(!cache.contains(&"b".to_string()));
        assert!(cache.contains(&"c".to_string()));
    }

    #[test]
    fn test_lfu_put_existing_keeps_frequency() {
        let cache = LfuCache::new(2, 0.5).unwrap();
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.get(&"a".to_string());

        assert_eq!(cache.put("b".to_string(), 20), Some(2));
        cache.put("c".to_string(), 3);

        // "b" stayed in bucket 0 despite the overwrite
        assert!(!cache.contains(&"b".to_string()));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn test_lfu_remove_advances_min_frequency() {
        let cache = LfuCache::new(3, 0.34).unwrap();
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.get(&"b".to_string());

        assert_eq!(cache.remove(&"a".to_string()), Some(1));
        cache.put("c".to_string(), 3);
        cache.put("d".to_string(), 4);
        cache.put("e".to_string(), 5);

        // Victim came from bucket 0 ("c"), not the promoted "b"
        assert!(cache.contains(&"b".to_string()));
        assert!(!cache.contains(&"c".to_string()));
    }

    #[test]
    fn test_lfu_small_factor_still_evicts_one() {
        let cache = LfuCache::new(2, 0.1).unwrap();
        assert_eq!(cache.eviction_batch(), 1);

        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("c".to_string(), 3);

        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lfu_rejects_invalid_configuration() {
        assert!(matches!(
            LfuCache::<String, u32>::new(0, 0.5),
            Err(CacheError::InvalidCapacity(0))
        ));
        assert!(matches!(
            LfuCache::<String, u32>::new(3, 0.0),
            Err(CacheError::InvalidEvictionFactor(_))
        ));
        assert!(matches!(
            LfuCache::<String, u32>::new(3, 1.0),
            Err(CacheError::InvalidEvictionFactor(_))
        ));
    }

    // ============================================================
    // SHARED CONTRACT
    // ============================================================

    fn engines() -> Vec<(&'static str, Arc<dyn CacheEngine<String, u32>>)> {
        vec![
            ("LRU", create_cache(EvictionAlgorithm::Lru, 4, 0.5).unwrap()),
            ("LFU", create_cache(EvictionAlgorithm::Lfu, 4, 0.5).unwrap()),
        ]
    }

    #[test]
    fn test_get_after_put_returns_value() {
        for (name, cache) in engines() {
            assert_eq!(cache.put("k".to_string(), 7), None, "{}", name);
            assert_eq!(cache.get(&"k".to_string()), Some(7), "{}", name);
        }
    }

    #[test]
    fn test_remove_then_contains_is_false() {
        for (name, cache) in engines() {
            cache.put("k".to_string(), 7);
            assert_eq!(cache.remove(&"k".to_string()), Some(7), "{}", name);
            assert!(!cache.contains(&"k".to_string()), "{}", name);
            assert!(cache.is_empty(), "{}", name);
        }
    }

    #[test]
    fn test_put_if_absent_on_present_key_returns_argument() {
        // Present key: the argument comes back and the stored value is untouched
        for (name, cache) in engines() {
            cache.put("k".to_string(), 1);
            assert_eq!(cache.put_if_absent("k".to_string(), 2), Some(2), "{}", name);
            assert_eq!(cache.get(&"k".to_string()), Some(1), "{}", name);
        }
    }

    #[test]
    fn test_put_if_absent_on_missing_key_inserts() {
        for (name, cache) in engines() {
            assert_eq!(cache.put_if_absent("k".to_string(), 3), None, "{}", name);
            assert_eq!(cache.get(&"k".to_string()), Some(3), "{}", name);
        }
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        for (name, cache) in engines() {
            for i in 0..50 {
                cache.put(format!("key-{}", i), i);
                assert!(cache.len() <= cache.capacity(), "{}", name);
            }
        }
    }

    #[test]
    fn test_concurrent_access_keeps_bounds() {
        let cache: Arc<dyn CacheEngine<String, u32>> =
            create_cache(EvictionAlgorithm::Lfu, 16, 0.25).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("t{}-{}", t, i % 40);
                        cache.put(key.clone(), i);
                        cache.get(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= 16);
    }

    // ============================================================
    // FACTORY TESTS
    // ============================================================

    #[test]
    fn test_algorithm_parsing_is_case_insensitive() {
        assert_eq!("lru".parse::<EvictionAlgorithm>(), Ok(EvictionAlgorithm::Lru));
        assert_eq!("LfU".parse::<EvictionAlgorithm>(), Ok(EvictionAlgorithm::Lfu));

        let err = "FIFO".parse::<EvictionAlgorithm>().unwrap_err();
        assert!(err.contains("either LFU or LRU"));
    }

    #[test]
    fn test_algorithm_serde() {
        let json = serde_json::to_string(&EvictionAlgorithm::Lfu).unwrap();
        assert_eq!(json, "\"LFU\"");

        let parsed: EvictionAlgorithm = serde_json::from_str("\"lru\"").unwrap();
        assert_eq!(parsed, EvictionAlgorithm::Lru);

        assert!(serde_json::from_str::<EvictionAlgorithm>("\"MRU\"").is_err());
    }

    #[test]
    fn test_factory_propagates_configuration_errors() {
        let result = create_cache::<String, u32>(EvictionAlgorithm::Lfu, 5, 1.5);
        assert!(matches!(result, Err(CacheError::InvalidEvictionFactor(_))));

        let result = create_cache::<String, u32>(EvictionAlgorithm::Lru, 0, 0.5);
        assert!(matches!(result, Err(CacheError::InvalidCapacity(0))));

        assert_eq!(
            crate::cache::validate_settings(EvictionAlgorithm::Lfu, 5, 0.0),
            Err(CacheError::InvalidEvictionFactor(0.0))
        );
        // LRU ignores the factor
        assert_eq!(crate::cache::validate_settings(EvictionAlgorithm::Lru, 5, 7.0), Ok(()));

        let oversized = crate::cache::MAX_CAPACITY + 1;
        let result = create_cache::<String, u32>(EvictionAlgorithm::Lfu, oversized, 0.5);
        assert!(matches!(result, Err(CacheError::InvalidCapacity(n)) if n == oversized));
    }
}
