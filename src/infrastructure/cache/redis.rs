//! Redis cache implementation

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::cache::{Cache, CacheTag};
use crate::domain::DomainError;

/// Configuration for Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
        }
    }
}

impl RedisCacheConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Set holding the (prefixed) keys stored under `tag`
    fn tag_key(&self, tag: &CacheTag) -> String {
        self.prefix_key(&format!("tag:{}", tag))
    }
}

/// Redis cache implementation
///
/// Each tag is a Redis set of the keys stored under it. Writes add the key
/// to its tag sets in the same MULTI block; invalidation reads the set and
/// deletes its members together with the set itself.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    /// Creates a new Redis cache connection
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let prefixed_key = self.config.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: Option<String> = conn.get(&prefixed_key).await.map_err(|e| {
            DomainError::cache(format!("Failed to get key '{}': {}", key, e))
        })?;

        Ok(result)
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        tags: &[CacheTag],
        ttl: Duration,
    ) -> Result<(), DomainError> {
        let prefixed_key = self.config.prefix_key(key);
        let mut conn = self.connection.clone();
        let ttl_secs = ttl.as_secs().max(1);

        let mut pipe = redis::pipe();
        pipe.atomic().set_ex(&prefixed_key, value, ttl_secs).ignore();
        for tag in tags {
            let tag_key = self.config.tag_key(tag);
            pipe.sadd(&tag_key, &prefixed_key).ignore();
            // Tag sets outlive their newest member so invalidation still finds it
            pipe.expire(&tag_key, ttl_secs as i64).ignore();
        }

        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to set key '{}': {}", key, e)))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.config.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i32 = conn.del(&prefixed_key).await.map_err(|e| {
            DomainError::cache(format!("Failed to delete key '{}': {}", key, e))
        })?;

        Ok(deleted > 0)
    }

    async fn invalidate_tags(&self, tags: &[CacheTag]) -> Result<usize, DomainError> {
        let mut conn = self.connection.clone();
        let mut total_deleted = 0usize;

        for tag in tags {
            let tag_key = self.config.tag_key(tag);

            let keys: Vec<String> = conn.smembers(&tag_key).await.map_err(|e| {
                DomainError::cache(format!("Failed to read tag '{}': {}", tag, e))
            })?;

            if !keys.is_empty() {
                let deleted: i32 = conn.del(&keys).await.map_err(|e| {
                    DomainError::cache(format!("Failed to delete keys for tag '{}': {}", tag, e))
                })?;
                total_deleted += deleted as usize;
            }

            let _: i32 = conn.del(&tag_key).await.map_err(|e| {
                DomainError::cache(format!("Failed to delete tag '{}': {}", tag, e))
            })?;
        }

        Ok(total_deleted)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();

        let Some(_) = &self.config.key_prefix else {
            redis::cmd("FLUSHDB")
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to flush database: {}", e)))?;
            return Ok(());
        };

        // Use SCAN to find our keys (safer than KEYS for production)
        let pattern = self.config.prefix_key("*");
        let mut cursor = 0u64;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to scan keys: {}", e)))?;

            if !keys.is_empty() {
                let _: i32 = conn
                    .del(&keys)
                    .await
                    .map_err(|e| DomainError::cache(format!("Failed to delete keys: {}", e)))?;
            }

            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;
    use crate::domain::ids::TeamId;

    // Note: These tests require a running Redis instance

    fn get_test_config() -> RedisCacheConfig {
        RedisCacheConfig::new("redis://127.0.0.1:6379").with_key_prefix("pmp-teams-test")
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_set_and_get() {
        let cache = RedisCache::new(get_test_config()).await.unwrap();

        cache
            .set("key1", &"value1", &[], Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));

        // Cleanup
        cache.delete("key1").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_invalidate_tags() {
        let cache = RedisCache::new(get_test_config()).await.unwrap();
        let tag = CacheTag::team(&TeamId::generate());

        cache
            .set("tagged", &1, &[tag.clone()], Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("untagged", &2, &[], Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.invalidate_tags(&[tag]).await.unwrap(), 1);
        assert!(cache.get::<i32>("tagged").await.unwrap().is_none());
        assert_eq!(cache.get::<i32>("untagged").await.unwrap(), Some(2));

        cache.delete("untagged").await.unwrap();
    }

    #[test]
    fn test_key_prefix() {
        let config = RedisCacheConfig::new("redis://localhost").with_key_prefix("myapp");
        let tag = CacheTag::team(&TeamId::generate());

        assert_eq!(config.prefix_key("teams:team:1"), "myapp:teams:team:1");
        assert_eq!(config.tag_key(&tag), format!("myapp:tag:{}", tag));
        assert_eq!(RedisCacheConfig::new("redis://localhost").prefix_key("k"), "k");
    }
}
