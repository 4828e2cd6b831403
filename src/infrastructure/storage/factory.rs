//! Storage factory for runtime storage selection

use std::sync::Arc;

use tracing::info;

use crate::config::StorageSettings;
use crate::domain::store::TeamStore;
use crate::domain::DomainError;

use super::in_memory::InMemoryTeamStore;
use super::migrations::run_storage_migrations;
use super::postgres::{PostgresConfig, PostgresTeamStore};

/// Supported storage types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// PostgreSQL storage
    Postgres,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// In-memory storage configuration
    InMemory,
    /// PostgreSQL storage configuration
    Postgres(PostgresConfig),
}

impl StorageConfig {
    /// Creates an in-memory storage configuration
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Creates a PostgreSQL configuration from a URL
    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::Postgres(PostgresConfig::new(url))
    }

    /// Resolves the configured backend
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, DomainError> {
        match StorageType::from_str(&settings.backend) {
            Some(StorageType::InMemory) => Ok(Self::InMemory),
            Some(StorageType::Postgres) => {
                let url = settings.postgres_url.clone().ok_or_else(|| {
                    DomainError::configuration("storage.postgres_url is required for postgres")
                })?;
                Ok(Self::Postgres(
                    PostgresConfig::new(url).with_max_connections(settings.max_connections),
                ))
            }
            None => Err(DomainError::configuration(format!(
                "Unknown storage backend '{}'",
                settings.backend
            ))),
        }
    }

    /// Returns the storage type
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }
}

/// Factory for creating team stores
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates a store for `config`, running migrations for PostgreSQL
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn TeamStore>, DomainError> {
        match config {
            StorageConfig::InMemory => {
                info!("Using in-memory team store");
                Ok(Arc::new(InMemoryTeamStore::new()))
            }
            StorageConfig::Postgres(pg_config) => {
                info!("Using PostgreSQL team store");
                let store = PostgresTeamStore::connect(pg_config).await?;
                run_storage_migrations(store.pool()).await?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!(StorageType::from_str("memory"), Some(StorageType::InMemory));
        assert_eq!(StorageType::from_str("in-memory"), Some(StorageType::InMemory));
        assert_eq!(StorageType::from_str("postgres"), Some(StorageType::Postgres));
        assert_eq!(StorageType::from_str("pg"), Some(StorageType::Postgres));
        assert_eq!(StorageType::from_str("unknown"), None);
    }

    #[test]
    fn test_from_settings() {
        let mut settings = StorageSettings::default();
        assert_eq!(
            StorageConfig::from_settings(&settings).unwrap().storage_type(),
            StorageType::InMemory
        );

        settings.backend = "postgres".to_string();
        assert!(StorageConfig::from_settings(&settings).is_err());

        settings.postgres_url = Some("postgres://localhost/test".to_string());
        settings.max_connections = 4;
        match StorageConfig::from_settings(&settings).unwrap() {
            StorageConfig::Postgres(pg) => assert_eq!(pg.max_connections, 4),
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_in_memory() {
        let store = StorageFactory::create(&StorageConfig::in_memory()).await.unwrap();
        assert!(store.list_teams().await.unwrap().is_empty());
    }
}
