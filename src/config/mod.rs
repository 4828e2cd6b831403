//! Application configuration

mod app_config;
mod teams;

pub use app_config::{
    AppConfig, CacheSettings, LogFormat, LoggingConfig, NotificationChannel,
    NotificationSettings, StorageSettings,
};
pub use teams::{
    FeatureToggles, InvitationConfig, LimitsConfig, PipelineConfig, TeamsConfig,
};
