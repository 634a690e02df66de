//! Result caching for the `*_and_cache` terminals
//!
//! A query result (rows, a single row or a single value) is stored as JSON
//! under a caller-chosen key. Caches are pluggable through [`ResultCache`];
//! [`MemoryCache`] is the in-process implementation.

pub mod memory;

pub use memory::MemoryCache;

use crate::error::Result;
use serde_json::Value as JsonValue;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Cache key type
pub type CacheKey = String;

/// Cached value with expiry and access bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: JsonValue,
    pub created_at: u64,
    pub expires_at: Option<u64>,
    pub access_count: u64,
    pub last_access: u64,
}

impl CacheEntry {
    pub fn new(value: JsonValue, ttl: Option<Duration>) -> Self {
        let now = current_timestamp();
        Self {
            value,
            created_at: now,
            expires_at: ttl.map(|d| now + d.as_millis() as u64),
            access_count: 1,
            last_access: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => current_timestamp() >= expires_at,
            None => false,
        }
    }

    pub fn mark_accessed(&mut self) {
        self.access_count += 1;
        self.last_access = current_timestamp();
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction
    pub max_entries: usize,
    /// TTL applied when a put does not give one (None = no expiration)
    pub default_ttl: Option<Duration>,
    pub enable_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: Some(Duration::from_secs(3600)),
            enable_stats: true,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub max_entries: u64,
    pub evictions: u64,
    pub expired_cleanups: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Store for query results keyed by caller-chosen strings
pub trait ResultCache: Send + Sync {
    /// Cached value for `key`, if present and not expired
    fn get(&self, key: &str) -> Option<JsonValue>;

    /// Store `value`; `ttl` of None falls back to the cache default
    fn put(&self, key: &str, value: JsonValue, ttl: Option<Duration>) -> Result<()>;

    fn remove(&self, key: &str) -> Option<JsonValue>;

    fn clear(&self);

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Current timestamp in milliseconds since the Unix epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
