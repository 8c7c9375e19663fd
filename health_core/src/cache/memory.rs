use crate::collaborators::{CacheClearer, StaleDataCleaner};
use crate::config::CacheConfig;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(data: serde_json::Value, ttl: Option<Duration>) -> Self {
        let now = Utc::now();
        let expires_at = ttl.map(|duration| {
            now + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::seconds(300))
        });

        Self {
            data,
            expires_at,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() > expires_at,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub current_size: usize,
    pub max_size: usize,
    pub clears: u64,
}

impl CacheStats {
    pub fn new(max_size: usize) -> Self {
        Self {
            hits: 0,
            misses: 0,
            current_size: 0,
            max_size,
            clears: 0,
        }
    }
}

/// In-memory LRU cache with TTLs. Registered with the engine as both a
/// cache to clear and a store to prune during maintenance.
#[derive(Debug, Clone)]
pub struct CacheManager {
    name: String,
    cache: Arc<RwLock<LruCache<String, CacheEntry>>>,
    config: CacheConfig,
    stats: Arc<RwLock<CacheStats>>,
}

impl CacheManager {
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_size).unwrap_or(FALLBACK_CAPACITY);

        Self {
            name: name.into(),
            cache: Arc::new(RwLock::new(LruCache::new(capacity))),
            stats: Arc::new(RwLock::new(CacheStats::new(config.max_size))),
            config,
        }
    }

    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut cache = self.cache.write();

        let lookup = cache
            .get(key)
            .map(|entry| (entry.is_expired(), entry.data.clone()));

        let value = match lookup {
            Some((true, _)) => {
                cache.pop(key);
                debug!("Cache entry expired for key: {}", key);
                None
            }
            Some((false, data)) => match serde_json::from_value(data) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Failed to deserialize cached value for key {}: {}", key, e);
                    cache.pop(key);
                    None
                }
            },
            None => None,
        };

        if self.config.enable_stats {
            let mut stats = self.stats.write();
            if value.is_some() {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }

        value
    }

    pub fn set<T>(&self, key: &str, value: &T) -> Result<(), serde_json::Error>
    where
        T: Serialize,
    {
        let ttl = Some(Duration::from_secs(self.config.default_ttl_seconds));
        self.set_with_ttl(key, value, ttl)
    }

    pub fn set_with_ttl<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<(), serde_json::Error>
    where
        T: Serialize,
    {
        let data = serde_json::to_value(value)?;
        self.insert_entry(key, CacheEntry::new(data, ttl));
        debug!("Cached value for key: {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.cache.write().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
        if self.config.enable_stats {
            self.stats.write().clears += 1;
        }
        debug!("Cleared all entries from cache '{}'", self.name);
    }

    /// Drops entries created before `cutoff`. Returns how many were removed.
    pub fn remove_created_before(&self, cutoff: DateTime<Utc>) -> u64 {
        let mut cache = self.cache.write();
        let stale: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.created_at < cutoff || entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            cache.pop(key);
        }
        stale.len() as u64
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.current_size = self.cache.read().len();
        stats
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    fn insert_entry(&self, key: &str, entry: CacheEntry) {
        self.cache.write().put(key.to_string(), entry);
    }
}

#[async_trait::async_trait]
impl CacheClearer for CacheManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn clear_cache(&self) -> crate::Result<()> {
        self.clear();
        Ok(())
    }
}

#[async_trait::async_trait]
impl StaleDataCleaner for CacheManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn cleanup_older_than(&self, days: u32) -> crate::Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let removed = self.remove_created_before(cutoff);
        debug!("Removed {} entries older than {} days from cache '{}'", removed, days, self.name);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn cache() -> CacheManager {
        CacheManager::new("test", CacheConfig::default())
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache = cache();

        cache.set("test_key", &"test_value").unwrap();
        let value: Option<String> = cache.get("test_key");
        assert_eq!(value, Some("test_value".to_string()));

        let missing: Option<String> = cache.get("missing_key");
        assert_eq!(missing, None);

        assert!(cache.remove("test_key"));
        let removed: Option<String> = cache.get("test_key");
        assert_eq!(removed, None);
    }

    #[test]
    fn test_cache_ttl() {
        let cache = cache();

        cache
            .set_with_ttl("ttl_key", &"ttl_value", Some(Duration::from_millis(20)))
            .unwrap();
        let value: Option<String> = cache.get("ttl_key");
        assert_eq!(value, Some("ttl_value".to_string()));

        thread::sleep(Duration::from_millis(50));

        let expired: Option<String> = cache.get("ttl_key");
        assert_eq!(expired, None);
    }

    #[test]
    fn test_cache_stats() {
        let cache = cache();

        cache.set("key1", &"value1").unwrap();
        let _: Option<String> = cache.get("key1");
        let _: Option<String> = cache.get("key1");
        let _: Option<String> = cache.get("missing");
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.clears, 1);
        assert_eq!(stats.current_size, 0);
    }

    #[tokio::test]
    async fn test_clear_cache_capability() {
        let cache = cache();
        cache.set("a", &1).unwrap();
        cache.set("b", &2).unwrap();

        cache.clear_cache().await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_older_than_keeps_fresh_entries() {
        let cache = cache();
        cache.insert_entry(
            "old",
            CacheEntry {
                data: serde_json::json!("stale"),
                expires_at: None,
                created_at: Utc::now() - chrono::Duration::days(45),
            },
        );
        cache.set("fresh", &"new").unwrap();

        let removed = cache.cleanup_older_than(30).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        let fresh: Option<String> = cache.get("fresh");
        assert_eq!(fresh, Some("new".to_string()));
    }
}
