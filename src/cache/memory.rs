//! In-memory result cache with TTL expiry and LRU eviction

use super::{CacheConfig, CacheEntry, CacheKey, CacheStats, ResultCache};
use crate::error::{Error, Result};
use log::debug;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Thread-safe in-memory cache; clones share the same storage
#[derive(Clone)]
pub struct MemoryCache {
    data: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    config: CacheConfig,
    stats: Arc<RwLock<CacheStats>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let stats = CacheStats {
            max_entries: config.max_entries as u64,
            ..Default::default()
        };

        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            config,
            stats: Arc::new(RwLock::new(stats)),
        }
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self::with_config(CacheConfig {
            max_entries,
            ..Default::default()
        })
    }

    pub fn len(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let mut data = match self.data.write() {
            Ok(data) => data,
            Err(_) => return 0,
        };
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired());
        let removed = before - data.len();

        if removed > 0 {
            debug!("Cleaned up {} expired cache entries", removed);
            self.record(|stats| stats.expired_cleanups += removed as u64);
        }
        removed
    }

    fn record<F>(&self, update: F)
    where
        F: FnOnce(&mut CacheStats),
    {
        if self.config.enable_stats {
            if let Ok(mut stats) = self.stats.write() {
                update(&mut stats);
            }
        }
    }

    fn evict_lru(&self, data: &mut HashMap<CacheKey, CacheEntry>) {
        let lru_key = data
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone());

        if let Some(key) = lru_key {
            data.remove(&key);
            self.record(|stats| stats.evictions += 1);
            debug!("Evicted LRU cache entry: {}", key);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &str) -> Option<JsonValue> {
        let hit = match self.data.write() {
            Ok(mut data) => match data.get_mut(key) {
                Some(entry) if entry.is_expired() => {
                    data.remove(key);
                    debug!("Cache entry '{}' expired", key);
                    None
                }
                Some(entry) => {
                    entry.mark_accessed();
                    Some(entry.value.clone())
                }
                None => None,
            },
            Err(_) => None,
        };

        match hit {
            Some(_) => self.record(|stats| stats.hits += 1),
            None => self.record(|stats| stats.misses += 1),
        }
        hit
    }

    fn put(&self, key: &str, value: JsonValue, ttl: Option<Duration>) -> Result<()> {
        let ttl = ttl.or(self.config.default_ttl);
        let mut data = self
            .data
            .write()
            .map_err(|_| Error::Cache("Failed to acquire write lock for cache".into()))?;

        if !data.contains_key(key) {
            while !data.is_empty() && data.len() >= self.config.max_entries {
                self.evict_lru(&mut data);
            }
        }
        data.insert(key.to_string(), CacheEntry::new(value, ttl));
        let entries = data.len() as u64;
        self.record(|stats| stats.entries = entries);

        debug!("Cached entry '{}' (TTL: {:?})", key, ttl);
        Ok(())
    }

    fn remove(&self, key: &str) -> Option<JsonValue> {
        let mut data = self.data.write().ok()?;
        let removed = data.remove(key).map(|entry| entry.value);
        let entries = data.len() as u64;
        self.record(|stats| stats.entries = entries);
        removed
    }

    fn clear(&self) {
        if let Ok(mut data) = self.data.write() {
            data.clear();
        }
        self.record(|stats| stats.entries = 0);
    }

    fn stats(&self) -> CacheStats {
        let mut stats = self
            .stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default();
        stats.entries = self.len() as u64;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_put_get_remove() {
        let cache = MemoryCache::new();
        cache.put("users:all", json!([{"id": 1}]), None).unwrap();

        assert_eq!(cache.get("users:all"), Some(json!([{"id": 1}])));
        assert_eq!(cache.remove("users:all"), Some(json!([{"id": 1}])));
        assert_eq!(cache.get("users:all"), None);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = MemoryCache::with_capacity(2);
        cache.put("a", json!(1), None).unwrap();
        thread::sleep(Duration::from_millis(10));
        cache.put("b", json!(2), None).unwrap();
        thread::sleep(Duration::from_millis(10));
        // Touch `a` so `b` becomes least recently used
        assert_eq!(cache.get("a"), Some(json!(1)));
        thread::sleep(Duration::from_millis(10));
        cache.put("c", json!(3), None).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(json!(1)));
        assert_eq!(cache.get("c"), Some(json!(3)));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = MemoryCache::with_capacity(1);
        cache.put("a", json!(1), None).unwrap();
        cache.put("a", json!(2), None).unwrap();
        assert_eq!(cache.get("a"), Some(json!(2)));
    }

    #[test]
    fn test_ttl_expiration() {
        let cache = MemoryCache::new();
        cache
            .put("short", json!("v"), Some(Duration::from_millis(50)))
            .unwrap();
        cache.put("long", json!("v"), None).unwrap();
        assert_eq!(cache.get("short"), Some(json!("v")));

        thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats() {
        let cache = MemoryCache::new();
        cache.put("k", json!(1), None).unwrap();
        cache.get("k");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }
}
