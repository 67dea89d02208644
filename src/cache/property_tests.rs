//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the page cache key laws and store accounting.

use proptest::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::cache::{CacheElement, CachedPage, PageCacheKey, PageCacheStore};
use crate::http::PageResponse;

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 20;

// == Strategies ==
/// Distinct attribute names with small integer values.
fn attributes_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::hash_set("[a-z]{1,8}", 2..8).prop_flat_map(|names| {
        let names: Vec<String> = names.into_iter().collect();
        let len = names.len();
        (Just(names), prop::collection::vec(-1000i64..1000, len))
            .prop_map(|(names, values)| names.into_iter().zip(values).collect())
    })
}

fn key_of(attributes: &[(String, i64)]) -> PageCacheKey {
    let mut key = PageCacheKey::new();
    for (name, value) in attributes {
        key.set_attribute(name, value).unwrap();
    }
    key
}

fn hash_of(key: &PageCacheKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
enum StoreOp {
    Put { key: String, ttl_ms: u64 },
    Get { key: String },
    Clear,
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    let key = "[a-z]{1,3}";
    prop_oneof![
        (key, prop_oneof![Just(0u64), Just(60_000u64)])
            .prop_map(|(key, ttl_ms)| StoreOp::Put { key, ttl_ms }),
        key.prop_map(|key| StoreOp::Get { key }),
        Just(StoreOp::Clear),
    ]
}

fn page() -> CachedPage {
    CachedPage::snapshot(&PageResponse::new())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Reversing the insertion order of two or more attributes changes key
    // identity even though the set of pairs is the same.
    #[test]
    fn prop_key_is_order_sensitive(attributes in attributes_strategy()) {
        let forward = key_of(&attributes);
        let mut reversed_attributes = attributes.clone();
        reversed_attributes.reverse();
        let reversed = key_of(&reversed_attributes);

        prop_assert_ne!(&forward, &reversed);
        prop_assert_ne!(forward.as_cache_string(), reversed.as_cache_string());
        for (name, _) in &attributes {
            prop_assert_eq!(forward.get(name), reversed.get(name));
        }
    }

    // Setting an attribute again with its current value leaves equality,
    // hash and string form untouched.
    #[test]
    fn prop_same_value_reset_is_idempotent(attributes in attributes_strategy(), pick in any::<prop::sample::Index>()) {
        let original = key_of(&attributes);
        let mut again = original.clone();
        let (name, value) = &attributes[pick.index(attributes.len())];
        again.set_attribute(name, value).unwrap();

        prop_assert_eq!(&original, &again);
        prop_assert_eq!(hash_of(&original), hash_of(&again));
        prop_assert_eq!(original.as_cache_string(), again.as_cache_string());
        prop_assert_eq!(again.len(), attributes.len());
    }

    // Equal keys always hash equally.
    #[test]
    fn prop_equal_keys_hash_equally(attributes in attributes_strategy()) {
        let first = key_of(&attributes);
        let second = key_of(&attributes);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(hash_of(&first), hash_of(&second));
    }

    // Hits and misses count every lookup, the store never exceeds its
    // capacity and expired elements are never returned.
    #[test]
    fn prop_store_accounting(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let mut store = PageCacheStore::new(TEST_MAX_ENTRIES);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                StoreOp::Put { key, ttl_ms } => {
                    store.put(CacheElement::new(key, page(), Duration::from_millis(ttl_ms)));
                }
                StoreOp::Get { key } => match store.get(&key) {
                    Some(element) => {
                        prop_assert!(!element.is_expired());
                        expected_hits += 1;
                    }
                    None => {
                        expected_misses += 1;
                    }
                },
                StoreOp::Clear => {
                    store.clear();
                    prop_assert!(store.is_empty());
                }
            }
            prop_assert!(store.len() <= TEST_MAX_ENTRIES);
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.total_entries, store.len());
    }
}
