//! Property-Based Tests for the Detection Cache
//!
//! Uses proptest to check eviction order, TTL rejection and capacity bounds.

use proptest::prelude::*;
use std::collections::HashMap;

use crate::cache::{DetectionCache, Fingerprint};

// == Test Configuration ==
const TEST_CAPACITY: usize = 10;
const TEST_TTL_MS: u64 = 2_000;

// == Strategies ==
/// Generates fingerprint keys from a small alphabet so overwrites happen
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,3}".prop_map(|s| s)
}

/// Generates (key, inserted_at) pairs with distinct timestamps
fn timed_inserts_strategy(max: usize) -> impl Strategy<Value = Vec<(String, u64)>> {
    prop::collection::vec((key_strategy(), 0u64..1_000_000), 1..max).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            // Make timestamps unique so the oldest entry is unambiguous
            .map(|(i, (key, t))| (key, t * 64 + i as u64))
            .collect()
    })
}

#[derive(Debug, Clone)]
enum CacheOp {
    Insert { key: String },
    Lookup { key: String },
    Clear,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => key_strategy().prop_map(|key| CacheOp::Insert { key }),
        4 => key_strategy().prop_map(|key| CacheOp::Lookup { key }),
        1 => Just(CacheOp::Clear),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any insert that pushes the size past the bound, the evicted entry is
    // the one with the minimum insertion time among current entries.
    #[test]
    fn prop_eviction_removes_minimum_insertion(inserts in timed_inserts_strategy(40)) {
        let mut cache = DetectionCache::new(TEST_CAPACITY, u64::MAX);
        let mut model: HashMap<String, u64> = HashMap::new();

        for (key, at) in inserts {
            model.insert(key.clone(), at);
            let expected_victim = if model.len() > TEST_CAPACITY {
                model.iter().min_by_key(|(_, t)| **t).map(|(k, _)| k.clone())
            } else {
                None
            };

            cache.insert_at(Fingerprint::from_raw(key), (), at);

            if let Some(victim) = expected_victim {
                model.remove(&victim);
                prop_assert!(!cache.contains(&Fingerprint::from_raw(victim.clone())),
                    "Expected '{}' to be evicted", victim);
            }

            prop_assert_eq!(cache.len(), model.len());
            for k in model.keys() {
                prop_assert!(cache.contains(&Fingerprint::from_raw(k.clone())));
            }
        }
    }

    // For any lookup at t >= inserted_at + TTL the lookup reports a miss.
    #[test]
    fn prop_lookup_after_ttl_misses(
        key in key_strategy(),
        inserted_at in 0u64..1_000_000,
        extra in 0u64..10_000
    ) {
        let mut cache = DetectionCache::new(TEST_CAPACITY, TEST_TTL_MS);
        cache.insert_at(Fingerprint::from_raw(key.clone()), "R".to_string(), inserted_at);

        let result = cache.lookup_at(&Fingerprint::from_raw(key), inserted_at + TEST_TTL_MS + extra);
        prop_assert!(result.is_none());
    }

    // For any lookup strictly inside the TTL window the stored value is served.
    #[test]
    fn prop_lookup_within_ttl_hits(
        key in key_strategy(),
        inserted_at in 0u64..1_000_000,
        offset in 0u64..TEST_TTL_MS
    ) {
        let mut cache = DetectionCache::new(TEST_CAPACITY, TEST_TTL_MS);
        cache.insert_at(Fingerprint::from_raw(key.clone()), "R".to_string(), inserted_at);

        let result = cache.lookup_at(&Fingerprint::from_raw(key), inserted_at + offset);
        prop_assert_eq!(result, Some("R".to_string()));
    }

    // clear() followed by any lookup misses for every inserted fingerprint.
    #[test]
    fn prop_clear_then_lookup_misses(inserts in timed_inserts_strategy(30)) {
        let mut cache = DetectionCache::new(TEST_CAPACITY, u64::MAX);
        let mut last_at = 0;
        for (key, at) in &inserts {
            cache.insert_at(Fingerprint::from_raw(key.clone()), (), *at);
            last_at = last_at.max(*at);
        }

        cache.clear();

        for (key, _) in inserts {
            prop_assert!(cache.lookup_at(&Fingerprint::from_raw(key), last_at).is_none());
        }
    }

    // For any operation sequence the size never exceeds the capacity and the
    // counters match what the caller observed.
    #[test]
    fn prop_capacity_and_counters(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let mut cache = DetectionCache::new(TEST_CAPACITY, TEST_TTL_MS);
        let mut hits = 0u64;
        let mut misses = 0u64;

        for (tick, op) in ops.into_iter().enumerate() {
            let now = tick as u64 * 100;
            match op {
                CacheOp::Insert { key } => {
                    cache.insert_at(Fingerprint::from_raw(key), tick, now);
                }
                CacheOp::Lookup { key } => {
                    match cache.lookup_at(&Fingerprint::from_raw(key), now) {
                        Some(_) => hits += 1,
                        None => misses += 1,
                    }
                }
                CacheOp::Clear => cache.clear(),
            }
            prop_assert!(cache.len() <= TEST_CAPACITY);
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, hits);
        prop_assert_eq!(stats.misses, misses);
        prop_assert_eq!(stats.total_entries, cache.len());
    }
}

// == Concurrent Access ==
// Mutation goes through Arc<RwLock<DetectionCache>>, as in the application state.

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_concurrent_inserts_respect_capacity(
        keys in prop::collection::vec(key_strategy(), 10..60)
    ) {
        use std::sync::Arc;
        use tokio::sync::RwLock;

        let cache = Arc::new(RwLock::new(DetectionCache::new(TEST_CAPACITY, 60_000)));

        tokio_test::block_on(async {
            let mut handles = vec![];
            for key in keys {
                let cache = Arc::clone(&cache);
                handles.push(tokio::spawn(async move {
                    let fingerprint = Fingerprint::from_raw(key.clone());
                    let mut guard = cache.write().await;
                    if guard.lookup(&fingerprint).is_none() {
                        guard.insert(fingerprint, key);
                    }
                }));
            }
            for handle in handles {
                handle.await.expect("Task should not panic");
            }
        });

        let guard = tokio_test::block_on(cache.read());
        prop_assert!(guard.len() <= TEST_CAPACITY);
        prop_assert_eq!(guard.stats().total_entries, guard.len());
    }
}
