use super::*;
use std::sync::Arc;

fn sig(raw: &str) -> TagSignature {
    TagSignature::from(raw)
}

fn seed() -> Vec<(TagSignature, TagId)> {
    vec![(sig("archived"), TagId(1)), (sig("person:alice"), TagId(2))]
}

// Store double that refuses every operation.
struct DownStore;

impl KeyValueStore for DownStore {
    fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::new("connection refused"))
    }

    fn set(&self, _: String, _: String) -> Result<(), StoreError> {
        Err(StoreError::new("connection refused"))
    }
}

//
// MemoryTagIdCache
//

#[test]
fn memory_lookup_before_init_is_not_ready() {
    let cache = MemoryTagIdCache::new();

    assert_eq!(cache.lookup(&sig("archived")), Err(CacheError::NotReady));
    assert_eq!(cache.lookup_many(&[sig("archived")]), Err(CacheError::NotReady));
    assert!(!cache.is_ready());
}

#[test]
fn memory_resolves_and_misses() {
    let cache = MemoryTagIdCache::new();
    cache.init(seed()).unwrap();

    assert_eq!(cache.lookup(&sig("person:alice")), Ok(TagId(2)));
    let err = cache.lookup(&sig("person:bob")).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(cache.len(), 2);
}

#[test]
fn memory_lookup_many_omits_misses() {
    let cache = MemoryTagIdCache::new();
    cache.init(seed()).unwrap();

    let resolved = cache
        .lookup_many(&[sig("archived"), sig("missing"), sig("person:alice")])
        .unwrap();

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved.get(&sig("archived")), Some(&TagId(1)));
    assert!(!resolved.contains_key(&sig("missing")));
}

#[test]
fn memory_on_tag_created_is_an_idempotent_upsert() {
    let cache = MemoryTagIdCache::new();
    cache.init(seed()).unwrap();

    cache.on_tag_created(sig("color:red"), TagId(9)).unwrap();
    cache.on_tag_created(sig("color:red"), TagId(9)).unwrap();

    assert_eq!(cache.lookup(&sig("color:red")), Ok(TagId(9)));
    assert_eq!(cache.len(), 3);
}

#[test]
fn memory_reinit_keeps_tags_created_after_the_store_read() {
    let cache = MemoryTagIdCache::new();
    cache.init(seed()).unwrap();

    // created by another handler while a warm-up was reading the store
    cache.on_tag_created(sig("person:zoe"), TagId(99)).unwrap();
    cache.init(seed()).unwrap();

    assert_eq!(cache.lookup(&sig("person:zoe")), Ok(TagId(99)));
    assert_eq!(cache.lookup(&sig("archived")), Ok(TagId(1)));
    assert_eq!(cache.len(), 3);
}

#[test]
fn memory_accepts_writes_before_init() {
    let cache = MemoryTagIdCache::new();
    cache.on_tag_created(sig("color:red"), TagId(4)).unwrap();

    assert!(!cache.is_ready());
    assert_eq!(cache.lookup(&sig("color:red")), Err(CacheError::NotReady));

    cache.init(seed()).unwrap();
    assert_eq!(cache.lookup(&sig("color:red")), Ok(TagId(4)));
    assert_eq!(cache.len(), 3);
}

#[test]
fn memory_cache_is_shareable_across_threads() {
    let cache = Arc::new(MemoryTagIdCache::new());
    cache.init(Vec::new()).unwrap();

    let handles = (0..4_i64)
        .map(|n| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                cache
                    .on_tag_created(TagSignature::from(format!("t{n}")), TagId(n))
                    .unwrap();
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 4);
    assert_eq!(cache.lookup(&sig("t3")), Ok(TagId(3)));
}

//
// KeyValueTagIdCache
//

#[test]
fn kv_entries_are_prefixed_decimal_ids() {
    let cache = KeyValueTagIdCache::new(MemoryKeyValueStore::new(), "tag:");
    cache.init(seed()).unwrap();

    assert_eq!(
        cache.store().get("tag:person:alice").unwrap(),
        Some("2".to_string())
    );
    assert_eq!(cache.lookup(&sig("person:alice")), Ok(TagId(2)));
}

#[test]
fn kv_lookup_before_init_is_not_ready() {
    let cache = KeyValueTagIdCache::new(MemoryKeyValueStore::new(), "tag:");

    assert_eq!(cache.lookup(&sig("archived")), Err(CacheError::NotReady));
}

#[test]
fn kv_miss_is_not_found() {
    let cache = KeyValueTagIdCache::new(MemoryKeyValueStore::new(), "tag:");
    cache.init(Vec::new()).unwrap();

    assert_eq!(
        cache.lookup(&sig("ghost")),
        Err(CacheError::NotFound {
            signature: sig("ghost")
        })
    );
}

#[test]
fn kv_lookup_many_uses_one_batch() {
    let cache = KeyValueTagIdCache::new(MemoryKeyValueStore::new(), "t/");
    cache.init(seed()).unwrap();

    let resolved = cache
        .lookup_many(&[sig("person:alice"), sig("ghost"), sig("archived")])
        .unwrap();

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[&sig("archived")], TagId(1));
}

#[test]
fn kv_non_integer_entry_is_an_infrastructure_fault() {
    let store = MemoryKeyValueStore::new();
    store.set("tag:broken".to_string(), "abc".to_string()).unwrap();
    let cache = KeyValueTagIdCache::new(store, "tag:");
    cache.init(Vec::new()).unwrap();

    let err = cache.lookup(&sig("broken")).unwrap_err();

    assert_eq!(
        err,
        CacheError::InvalidEntry {
            key: "tag:broken".to_string(),
            value: "abc".to_string(),
        }
    );
    assert!(cache.lookup_many(&[sig("broken")]).is_err());
}

#[test]
fn kv_store_outage_is_unavailable() {
    let cache = KeyValueTagIdCache::new(DownStore, "tag:");
    cache.init(Vec::new()).unwrap();

    assert!(matches!(
        cache.lookup(&sig("archived")),
        Err(CacheError::Unavailable { .. })
    ));
    assert!(matches!(
        cache.lookup_many(&[sig("archived")]),
        Err(CacheError::Unavailable { .. })
    ));
    assert!(matches!(
        cache.on_tag_created(sig("archived"), TagId(1)),
        Err(CacheError::Unavailable { .. })
    ));
}

#[test]
fn kv_init_failure_leaves_cache_not_ready() {
    let cache = KeyValueTagIdCache::new(DownStore, "tag:");

    assert!(cache.init(seed()).is_err());
    assert!(!cache.is_ready());
}

#[test]
fn kv_prefix_comes_from_config() {
    let config = crate::config::CacheConfig {
        key_prefix: "gallery:tag:".to_string(),
    };
    let cache = KeyValueTagIdCache::from_config(MemoryKeyValueStore::new(), &config);
    cache.init(Vec::new()).unwrap();
    cache.on_tag_created(sig("x"), TagId(3)).unwrap();

    assert_eq!(
        cache.store().get("gallery:tag:x").unwrap(),
        Some("3".to_string())
    );
}

//
// default lookup_many
//

#[test]
fn default_lookup_many_skips_misses_and_propagates_faults() {
    struct LoopingCache(MemoryTagIdCache);

    impl TagIdCache for LoopingCache {
        fn init(&self, entries: Vec<(TagSignature, TagId)>) -> Result<(), CacheError> {
            self.0.init(entries)
        }

        fn lookup(&self, signature: &TagSignature) -> Result<TagId, CacheError> {
            self.0.lookup(signature)
        }

        fn on_tag_created(&self, signature: TagSignature, id: TagId) -> Result<(), CacheError> {
            self.0.on_tag_created(signature, id)
        }
    }

    let cache = LoopingCache(MemoryTagIdCache::new());
    assert_eq!(cache.lookup_many(&[sig("x")]), Err(CacheError::NotReady));

    cache.init(seed()).unwrap();
    let resolved = cache.lookup_many(&[sig("archived"), sig("ghost")]).unwrap();
    assert_eq!(resolved.len(), 1);
}
