use serde::Deserialize;

use super::teams::TeamsConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub notifications: NotificationSettings,
    pub teams: TeamsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `memory` or `postgres`
    pub backend: String,
    pub postgres_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `memory` or `redis`
    pub backend: String,
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub max_capacity: u64,
    /// TTL of cached team and member-list projections
    pub projection_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    #[default]
    Log,
    Webhook,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub channel: NotificationChannel,
    pub webhook_url: Option<String>,
    /// HMAC secret used to sign webhook bodies
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            postgres_url: None,
            max_connections: 10,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: None,
            key_prefix: "pmp-teams".to_string(),
            max_capacity: 10_000,
            projection_ttl_secs: 300,
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            channel: NotificationChannel::default(),
            webhook_url: None,
            webhook_secret: None,
            timeout_secs: 10,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
