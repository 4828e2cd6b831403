//! Cache trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::key::CacheTag;
use crate::domain::DomainError;

/// Key-value cache with TTLs and tag-based invalidation
///
/// This trait uses JSON strings internally to be dyn-compatible.
/// Use the helper methods for typed get/set operations.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Gets a raw JSON value from the cache
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Sets a raw JSON value, associating it with `tags`
    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        tags: &[CacheTag],
        ttl: Duration,
    ) -> Result<(), DomainError>;

    /// Deletes a value from the cache
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Drops every entry carrying any of `tags`; returns the number of entries removed
    async fn invalidate_tags(&self, tags: &[CacheTag]) -> Result<usize, DomainError>;

    /// Clears all entries from the cache
    async fn clear(&self) -> Result<(), DomainError>;
}

/// Extension trait providing typed get/set operations
pub trait CacheExt: Cache {
    /// Gets a typed value from the cache
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::cache(format!("Failed to deserialize cache value: {}", e))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Sets a typed value in the cache with tags and a TTL
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        tags: &'a [CacheTag],
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::cache(format!("Failed to serialize cache value: {}", e))
            })?;
            self.set_raw(key, &data, tags, ttl).await
        }
    }
}

// Blanket implementation for all types implementing Cache
impl<T: Cache + ?Sized> CacheExt for T {}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// Mock cache for testing; records invalidations and can be told to fail
    #[derive(Debug, Default)]
    pub struct MockCache {
        entries: Mutex<HashMap<String, (String, HashSet<CacheTag>)>>,
        invalidated: Mutex<Vec<CacheTag>>,
        error: Mutex<Option<String>>,
    }

    impl MockCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.error.lock().unwrap() = Some(error.into());
            self
        }

        /// Every tag passed to `invalidate_tags`, in call order
        pub fn invalidated_tags(&self) -> Vec<CacheTag> {
            self.invalidated.lock().unwrap().clone()
        }

        fn check_error(&self) -> Result<(), DomainError> {
            if let Some(error) = self.error.lock().unwrap().clone() {
                return Err(DomainError::cache(error));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Cache for MockCache {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
            self.check_error()?;
            let entries = self.entries.lock().unwrap();
            Ok(entries.get(key).map(|(json, _)| json.clone()))
        }

        async fn set_raw(
            &self,
            key: &str,
            value: &str,
            tags: &[CacheTag],
            _ttl: Duration,
        ) -> Result<(), DomainError> {
            self.check_error()?;
            self.entries.lock().unwrap().insert(
                key.to_string(),
                (value.to_string(), tags.iter().cloned().collect()),
            );
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, DomainError> {
            self.check_error()?;
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }

        async fn invalidate_tags(&self, tags: &[CacheTag]) -> Result<usize, DomainError> {
            self.invalidated.lock().unwrap().extend(tags.iter().cloned());
            self.check_error()?;

            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|_, (_, entry_tags)| !tags.iter().any(|t| entry_tags.contains(t)));
            Ok(before - entries.len())
        }

        async fn clear(&self) -> Result<(), DomainError> {
            self.check_error()?;
            self.entries.lock().unwrap().clear();
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::ids::TeamId;

        #[tokio::test]
        async fn test_mock_cache_set_get() {
            let cache = MockCache::new();
            cache
                .set("key1", &"value1", &[], Duration::from_secs(60))
                .await
                .unwrap();

            let result: Option<String> = cache.get("key1").await.unwrap();
            assert_eq!(result, Some("value1".to_string()));
        }

        #[tokio::test]
        async fn test_mock_cache_invalidate_tags() {
            let cache = MockCache::new();
            let team = CacheTag::team(&TeamId::generate());
            let other = CacheTag::team(&TeamId::generate());

            cache
                .set("a", &1, &[team.clone()], Duration::from_secs(60))
                .await
                .unwrap();
            cache
                .set("b", &2, &[other], Duration::from_secs(60))
                .await
                .unwrap();

            let removed = cache.invalidate_tags(&[team.clone()]).await.unwrap();
            assert_eq!(removed, 1);
            assert!(cache.get::<i32>("a").await.unwrap().is_none());
            assert_eq!(cache.get::<i32>("b").await.unwrap(), Some(2));
            assert_eq!(cache.invalidated_tags(), vec![team]);
        }

        #[tokio::test]
        async fn test_mock_cache_with_error() {
            let cache = MockCache::new().with_error("Test error");

            let result: Result<Option<String>, _> = cache.get("key").await;
            assert!(result.is_err());
        }
    }
}
