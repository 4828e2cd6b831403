//! In-memory cache implementation using moka

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::{Cache, CacheTag};
use crate::domain::DomainError;

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Upper bound on any entry's lifetime
    pub default_ttl: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            default_ttl: Duration::from_secs(3600),
        }
    }
}

impl InMemoryCacheConfig {
    /// Creates a new configuration with specified max capacity
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Sets the default TTL
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: String,
    /// Millis since epoch
    expires_at: u64,
}

/// In-memory cache with per-entry TTLs and a tag index
///
/// The tag index maps each tag to the keys stored under it. Invalidating a
/// tag removes those keys from moka and forgets the mapping; stale index
/// entries for keys moka already evicted are harmless.
#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
    tags: Mutex<HashMap<CacheTag, HashSet<String>>>,
    config: InMemoryCacheConfig,
}

impl InMemoryCache {
    /// Creates a new in-memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    /// Creates a new in-memory cache with the given configuration
    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.default_ttl)
            .build();

        Self {
            cache,
            tags: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &InMemoryCacheConfig {
        &self.config
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn is_expired(entry: &CacheEntry) -> bool {
        Self::current_time_millis() > entry.expires_at
    }

    fn lock_tags(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<CacheTag, HashSet<String>>>, DomainError> {
        self.tags
            .lock()
            .map_err(|_| DomainError::cache("Cache tag index lock poisoned"))
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.cache.get(key).await {
            Some(entry) if Self::is_expired(&entry) => {
                self.cache.remove(key).await;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data)),
            None => Ok(None),
        }
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        tags: &[CacheTag],
        ttl: Duration,
    ) -> Result<(), DomainError> {
        {
            let mut index = self.lock_tags()?;
            for tag in tags {
                index
                    .entry(tag.clone())
                    .or_default()
                    .insert(key.to_string());
            }
        }

        let entry = CacheEntry {
            data: value.to_string(),
            expires_at: Self::current_time_millis() + ttl.as_millis() as u64,
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn invalidate_tags(&self, tags: &[CacheTag]) -> Result<usize, DomainError> {
        let keys: HashSet<String> = {
            let mut index = self.lock_tags()?;
            tags.iter()
                .filter_map(|tag| index.remove(tag))
                .flatten()
                .collect()
        };

        let mut removed = 0;
        for key in keys {
            if self.cache.remove(&key).await.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.lock_tags()?.clear();
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;
    use crate::domain::ids::TeamId;
    use crate::domain::principal::PrincipalRef;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", &[], Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = InMemoryCache::new();

        let result: Option<String> = cache.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", &[], Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.delete("key1").await.unwrap());
        assert!(!cache.delete("key1").await.unwrap());
        assert!(cache.get::<String>("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", &[], Duration::from_millis(50))
            .await
            .unwrap();
        assert!(cache.get::<String>("key1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.get::<String>("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_tags_removes_tagged_entries_only() {
        let cache = InMemoryCache::new();
        let team_id = TeamId::generate();
        let team = CacheTag::team(&team_id);
        let user = CacheTag::user(&PrincipalRef::user("7"));

        cache
            .set("team", &1, &[team.clone()], Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("members", &2, &[team.clone(), user.clone()], Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("user-teams", &3, &[user.clone()], Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("untagged", &4, &[], Duration::from_secs(60))
            .await
            .unwrap();

        let removed = cache.invalidate_tags(&[team]).await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get::<i32>("team").await.unwrap().is_none());
        assert!(cache.get::<i32>("members").await.unwrap().is_none());
        assert_eq!(cache.get::<i32>("user-teams").await.unwrap(), Some(3));
        assert_eq!(cache.get::<i32>("untagged").await.unwrap(), Some(4));

        // Re-invalidating an already flushed tag is a no-op
        let removed = cache.invalidate_tags(&[CacheTag::team(&team_id)]).await.unwrap();
        assert_eq!(removed, 0);

        let removed = cache.invalidate_tags(&[user]).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = InMemoryCache::new();
        let tag = CacheTag::team(&TeamId::generate());

        cache
            .set("key1", &"value1", &[tag.clone()], Duration::from_secs(60))
            .await
            .unwrap();

        cache.clear().await.unwrap();

        assert!(cache.get::<String>("key1").await.unwrap().is_none());
        assert_eq!(cache.invalidate_tags(&[tag]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_complex_types() {
        let cache = InMemoryCache::new();

        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct TestData {
            name: String,
            values: Vec<i32>,
        }

        let data = TestData {
            name: "test".to_string(),
            values: vec![1, 2, 3],
        };

        cache
            .set("complex", &data, &[], Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<TestData> = cache.get("complex").await.unwrap();
        assert_eq!(result, Some(data));
    }

    #[test]
    fn test_config() {
        let config = InMemoryCacheConfig::default()
            .with_max_capacity(100)
            .with_default_ttl(Duration::from_secs(300));

        let cache = InMemoryCache::with_config(config);

        assert_eq!(cache.config().max_capacity, 100);
        assert_eq!(cache.config().default_ttl, Duration::from_secs(300));
    }
}
