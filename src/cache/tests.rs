use crate::cache::{cache_key, CacheStats, FileStore, MemoryStore, ResponseCache, SessionStore, Settings, DEFAULT_TTL};

use color_eyre::eyre::{Report, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), json!(v))).collect()
}

// ----------------------------------------------------------------------------
// Cache Key

#[test]
fn cache_key_deterministic() -> Result<(), Report> {
    let a = params(&[("output", "JSON"), ("assembly", "GRCh38")]);
    let b = params(&[("assembly", "GRCh38"), ("output", "JSON")]);
    assert_eq!(cache_key("variant", "1-55051215-G-GA", &a), cache_key("variant", "1-55051215-G-GA", &b));
    Ok(())
}

#[test]
fn cache_key_params_differ() -> Result<(), Report> {
    let grch38 = params(&[("assembly", "GRCh38")]);
    let grch37 = params(&[("assembly", "GRCh37")]);
    let none = BTreeMap::new();

    let keys = [
        cache_key("variant", "1-55051215-G-GA", &grch38),
        cache_key("variant", "1-55051215-G-GA", &grch37),
        cache_key("variant", "1-55051215-G-GA", &none),
    ];
    assert_ne!(keys[0], keys[1]);
    assert_ne!(keys[0], keys[2]);
    assert_ne!(keys[1], keys[2]);
    Ok(())
}

// ----------------------------------------------------------------------------
// Response Cache

#[test]
fn cache_hit_then_expired() -> Result<(), Report> {
    let mut cache = ResponseCache::new(MemoryStore::new());
    let key = "gene-details-NPHS2";

    cache.set(key, json!({"NCS": 0.8}), Duration::from_millis(100));
    let cached = cache.get(key).expect("entry should be cached");
    assert!(cached.source.from_cache);
    assert!(cached.source.cached_at.is_some());
    assert_eq!(cached.data, json!({"NCS": 0.8}));

    std::thread::sleep(Duration::from_millis(150));
    assert!(cache.get(key).is_none());
    assert!(cache.is_empty());

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.bypassed), (1, 1, 0));
    Ok(())
}

#[test]
fn cache_zero_ttl_never_expires() -> Result<(), Report> {
    let mut cache = ResponseCache::new(MemoryStore::new());
    let stored = cache.set("gene-scores-all", json!([1, 2, 3]), Duration::ZERO);
    assert!(!stored.source.from_cache);
    assert!(stored.source.cached_at.is_some());

    std::thread::sleep(Duration::from_millis(20));
    assert!(cache.get("gene-scores-all").is_some());
    Ok(())
}

#[test]
fn cache_disabled_bypasses() -> Result<(), Report> {
    let mut cache = ResponseCache::new(MemoryStore::new());
    cache.set_enabled(false);

    assert!(cache.get("variant-1-55051215-G-GA").is_none());
    let stored = cache.set("variant-1-55051215-G-GA", json!({"id": 1}), DEFAULT_TTL);
    assert_eq!(stored.data, json!({"id": 1}));
    assert!(!stored.source.from_cache);
    assert_eq!(stored.source.cached_at, None);

    cache.set_enabled(true);
    assert!(cache.get("variant-1-55051215-G-GA").is_none());

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.bypassed, stats.total_requests), (0, 1, 1, 2));
    Ok(())
}

#[test]
fn cache_clear_by_kind() -> Result<(), Report> {
    let mut cache = ResponseCache::new(MemoryStore::new());
    cache.set("gene-details-NPHS1", json!(1), DEFAULT_TTL);
    cache.set("gene-details-NPHS2", json!(2), DEFAULT_TTL);
    cache.set("variant-1-55051215-G-GA", json!(3), DEFAULT_TTL);
    cache.get("gene-details-NPHS1");

    assert_eq!(cache.clear(Some("gene-details")), 2);
    assert_eq!(cache.len(), 1);
    // counters survive a partial clear
    assert_eq!(cache.stats().hits, 1);

    assert_eq!(cache.clear(None), 1);
    assert_eq!(cache.stats(), CacheStats::default());
    Ok(())
}

#[test]
fn cache_stats_hit_rate() -> Result<(), Report> {
    let mut cache = ResponseCache::new(MemoryStore::new());
    cache.set("gene-details-PKD1", json!(1), DEFAULT_TTL);
    cache.get("gene-details-PKD1");
    cache.get("gene-details-PKD1");
    cache.get("gene-details-PKD1");
    cache.get("gene-details-PKD2");

    let stats = cache.stats();
    assert_eq!(stats.total_requests, 4);
    assert_eq!(stats.hit_rate, 75.0);
    assert_eq!(stats.item_count, 1);
    Ok(())
}

#[test]
fn cache_tolerates_quota_failure() -> Result<(), Report> {
    let mut cache = ResponseCache::new(MemoryStore::with_quota(16));
    let stored = cache.set("gene-details-COL4A5", json!({"symbol": "COL4A5", "NCS": 0.9}), DEFAULT_TTL);
    assert!(!stored.source.from_cache);

    // still served from memory
    assert!(cache.get("gene-details-COL4A5").is_some());
    Ok(())
}

#[test]
fn cache_restores_from_file() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;

    let mut cache = ResponseCache::new(FileStore::in_dir(dir.path()));
    cache.set("gene-details-NPHS1", json!({"NCS": 0.6}), DEFAULT_TTL);
    drop(cache);

    let mut cache = ResponseCache::new(FileStore::in_dir(dir.path()));
    let cached = cache.get("gene-details-NPHS1").expect("entry should be restored");
    assert_eq!(cached.data, json!({"NCS": 0.6}));

    cache.clear(None);
    let store = FileStore::in_dir(dir.path());
    assert_eq!(store.load()?, Some("{}".to_string()));
    Ok(())
}

#[test]
fn cache_ignores_corrupt_store() -> Result<(), Report> {
    let mut store = MemoryStore::new();
    store.save("not json")?;
    let cache = ResponseCache::new(store);
    assert!(cache.is_empty());
    Ok(())
}

// ----------------------------------------------------------------------------
// Settings

#[test]
fn settings_round_trip() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("state").join("settings.json");

    assert_eq!(Settings::read(&path)?, Settings { cache_enabled: true });

    Settings { cache_enabled: false }.write(&path)?;
    assert_eq!(Settings::read(&path)?, Settings { cache_enabled: false });
    Ok(())
}
