//! Response cache with per-entry expiry, persisted to a session store.

pub mod settings;
pub mod store;
#[cfg(test)]
mod tests;

#[doc(inline)]
pub use settings::{Settings, SETTINGS_FILE};
#[doc(inline)]
pub use store::{FileStore, MemoryStore, SessionStore};

use chrono::{DateTime, Utc};
use color_eyre::eyre::{Report, Result, WrapErr};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Expiry used when a caller has no resource-specific TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

// ----------------------------------------------------------------------------
// Cache Key
// ----------------------------------------------------------------------------

/// Returns the fingerprint of a request: `<kind>-<id>`, followed by
/// `-<params>` as compact JSON when there are any parameters.
///
/// Parameters are ordered by name, so the key does not depend on insertion order.
///
/// ## Examples
///
/// ```rust
/// use ncscore::cache::cache_key;
/// use serde_json::json;
/// use std::collections::BTreeMap;
///
/// let mut params = BTreeMap::new();
/// assert_eq!(cache_key("gene-details", "NPHS1", &params), "gene-details-NPHS1");
///
/// params.insert("output".to_string(), json!("JSON"));
/// params.insert("assembly".to_string(), json!("GRCh38"));
/// assert_eq!(
///     cache_key("variant", "1-55051215-G-GA", &params),
///     r#"variant-1-55051215-G-GA-{"assembly":"GRCh38","output":"JSON"}"#
/// );
/// ```
pub fn cache_key(kind: &str, id: &str, params: &BTreeMap<String, Value>) -> String {
    let key = format!("{kind}-{id}");
    if params.is_empty() {
        return key;
    }
    // serializing string keys and json values cannot fail
    let params = serde_json::to_string(params).unwrap_or_default();
    format!("{key}-{params}")
}

// ----------------------------------------------------------------------------
// Cache Entry
// ----------------------------------------------------------------------------

/// A cached payload.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CacheEntry {
    pub data: Value,
    pub cached_at: DateTime<Utc>,
    /// `None` never expires.
    pub expires: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match self.expires {
            Some(expires) => now <= expires,
            None => true,
        }
    }
}

/// Where a returned value came from.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Source {
    pub from_cache: bool,
    /// When the value was stored, `None` if it was never stored.
    pub cached_at: Option<DateTime<Utc>>,
}

/// A value annotated with its [`Source`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub data: T,
    pub source: Source,
}

impl<T> Sourced<T> {
    /// A value that was not stored in the cache.
    pub fn fresh(data: T) -> Self {
        Sourced { data, source: Source::default() }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced { data: f(self.data), source: self.source }
    }

    pub fn try_map<U>(self, f: impl FnOnce(T) -> Result<U, Report>) -> Result<Sourced<U>, Report> {
        Ok(Sourced { data: f(self.data)?, source: self.source })
    }
}

// ----------------------------------------------------------------------------
// Cache Stats
// ----------------------------------------------------------------------------

/// Snapshot of the cache counters.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub bypassed: u64,
    pub total_requests: u64,
    /// Percentage of requests served from the cache.
    pub hit_rate: f64,
    pub item_count: usize,
}

impl Display for CacheStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} items, {} requests ({} hits, {} misses, {} bypassed), hit rate {:.1}%",
            self.item_count, self.total_requests, self.hits, self.misses, self.bypassed, self.hit_rate
        )
    }
}

// ----------------------------------------------------------------------------
// Response Cache
// ----------------------------------------------------------------------------

/// Key/value cache of API responses.
///
/// Every mutation is written through to the [`SessionStore`]. Persistence
/// failures are logged and otherwise ignored, the in-memory cache keeps working.
///
/// ## Examples
///
/// ```rust
/// use ncscore::cache::{MemoryStore, ResponseCache, DEFAULT_TTL};
/// use serde_json::json;
///
/// let mut cache = ResponseCache::new(MemoryStore::new());
/// assert!(cache.get("gene-details-NPHS1").is_none());
///
/// let stored = cache.set("gene-details-NPHS1", json!({"NCS": 0.6}), DEFAULT_TTL);
/// assert!(!stored.source.from_cache);
///
/// let cached = cache.get("gene-details-NPHS1").unwrap();
/// assert!(cached.source.from_cache);
/// assert_eq!(cached.data, json!({"NCS": 0.6}));
/// assert_eq!(cache.stats().hits, 1);
/// ```
#[derive(Debug)]
pub struct ResponseCache<S = MemoryStore> {
    store: S,
    entries: BTreeMap<String, CacheEntry>,
    enabled: bool,
    hits: u64,
    misses: u64,
    bypassed: u64,
}

impl<S: SessionStore> ResponseCache<S> {
    /// Create an enabled cache, restoring any entries already in the store.
    pub fn new(store: S) -> Self {
        let entries = match Self::restore(&store) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to restore the response cache, starting empty: {e}");
                BTreeMap::new()
            }
        };
        debug!("Restored {} cache entries.", entries.len());
        ResponseCache { store, entries, enabled: true, hits: 0, misses: 0, bypassed: 0 }
    }

    fn restore(store: &S) -> Result<BTreeMap<String, CacheEntry>, Report> {
        match store.load()? {
            Some(contents) => serde_json::from_str(&contents).wrap_err("Failed to parse the stored response cache."),
            None => Ok(BTreeMap::new()),
        }
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(&self.entries)
            .wrap_err("Failed to serialize the response cache.")
            .and_then(|contents| self.store.save(&contents));
        if let Err(e) = result {
            warn!("Failed to persist the response cache, continuing without persistence: {e}");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn the cache on or off. Entries are kept while disabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        debug!("Response cache enabled: {enabled}");
        self.enabled = enabled;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached payload, or `None` if the cache is disabled or the entry
    /// is missing or expired. Expired entries are evicted.
    pub fn get(&mut self, key: &str) -> Option<Sourced<Value>> {
        if !self.enabled {
            self.bypassed += 1;
            return None;
        }

        let now = Utc::now();
        let valid = match self.entries.get(key) {
            Some(entry) => entry.is_valid(now),
            None => {
                debug!("Cache miss: {key}");
                self.misses += 1;
                return None;
            }
        };

        if !valid {
            debug!("Cache entry expired: {key}");
            self.entries.remove(key);
            self.persist();
            self.misses += 1;
            return None;
        }

        debug!("Cache hit: {key}");
        self.hits += 1;
        self.entries.get(key).map(|entry| Sourced {
            data: entry.data.clone(),
            source: Source { from_cache: true, cached_at: Some(entry.cached_at) },
        })
    }

    /// Store `data` under `key`, expiring after `ttl` ([`Duration::ZERO`] never expires).
    ///
    /// Returns the data with fresh provenance. When the cache is disabled nothing
    /// is stored and `cached_at` is `None`.
    pub fn set(&mut self, key: &str, data: Value, ttl: Duration) -> Sourced<Value> {
        if !self.enabled {
            return Sourced::fresh(data);
        }

        let cached_at = Utc::now();
        let expires = match ttl.is_zero() {
            true => None,
            false => match chrono::Duration::from_std(ttl) {
                Ok(ttl) => cached_at.checked_add_signed(ttl),
                Err(_) => None,
            },
        };

        let entry = CacheEntry { data: data.clone(), cached_at, expires };
        self.entries.insert(key.to_string(), entry);
        self.persist();

        Sourced { data, source: Source { from_cache: false, cached_at: Some(cached_at) } }
    }

    /// Remove entries of one kind (keys starting with `<kind>-`), or everything.
    ///
    /// Clearing everything also resets the counters. Returns the number of
    /// removed entries.
    pub fn clear(&mut self, kind: Option<&str>) -> usize {
        let before = self.entries.len();
        match kind {
            Some(kind) => {
                let prefix = format!("{kind}-");
                self.entries.retain(|key, _| !key.starts_with(&prefix));
            }
            None => {
                self.entries.clear();
                self.hits = 0;
                self.misses = 0;
                self.bypassed = 0;
            }
        }
        self.persist();
        before - self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let total_requests = self.hits + self.misses + self.bypassed;
        let hit_rate = match total_requests {
            0 => 0.0,
            total => self.hits as f64 / total as f64 * 100.0,
        };
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            bypassed: self.bypassed,
            total_requests,
            hit_rate,
            item_count: self.entries.len(),
        }
    }
}
