//! PMP Teams
//!
//! Team management core:
//! - Team lifecycle (draft, active, suspended, archived) driven by a
//!   permission-guarded state machine
//! - Memberships with roles and per-member capabilities
//! - Email invitations with expiry, resend limits and reminders
//! - Every operation runs through a validate / authorize / execute / after
//!   pipeline with atomic commits, cache invalidation and domain events

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use mockable::DefaultClock;
use tracing::info;

use domain::principal::PrincipalDirectory;
use infrastructure::{
    action::{ActionEnv, ActionPipeline},
    analytics::AnalyticsService,
    cache::{CacheConfig, CacheFactory},
    events::InProcessEventBus,
    maintenance::MaintenanceService,
    notification::NotifierFactory,
    principal::InMemoryPrincipalDirectory,
    storage::{StorageConfig, StorageFactory},
    team::TeamService,
};

/// Wired services sharing one set of adapters
#[derive(Debug, Clone)]
pub struct TeamsEngine {
    pub teams: TeamService,
    pub maintenance: MaintenanceService,
    pub analytics: AnalyticsService,
}

/// Builds the engine with an empty in-memory principal directory
pub async fn build_engine(config: &AppConfig) -> anyhow::Result<TeamsEngine> {
    build_engine_with_directory(config, Arc::new(InMemoryPrincipalDirectory::new())).await
}

/// Builds the engine from configuration, resolving principals through `directory`
pub async fn build_engine_with_directory(
    config: &AppConfig,
    directory: Arc<dyn PrincipalDirectory>,
) -> anyhow::Result<TeamsEngine> {
    let storage_config = StorageConfig::from_settings(&config.storage)?;
    info!("Storage backend: {:?}", storage_config.storage_type());
    let store = StorageFactory::create(&storage_config).await?;

    let cache_config = CacheConfig::from_settings(&config.cache)?;
    info!("Cache backend: {:?}", cache_config.cache_type);
    let cache = CacheFactory::new().create(&cache_config).await?;

    let notifier = NotifierFactory::create(&config.notifications)?;
    let events = Arc::new(InProcessEventBus::new());

    let env = ActionEnv::new(
        store,
        cache,
        events,
        notifier,
        directory,
        config.teams.clone(),
        Arc::new(DefaultClock),
    );

    let maintenance = MaintenanceService::new(&env);
    let analytics = AnalyticsService::new(&env);
    let teams = TeamService::new(
        ActionPipeline::new(env),
        Duration::from_secs(config.cache.projection_ttl_secs),
    );

    Ok(TeamsEngine {
        teams,
        maintenance,
        analytics,
    })
}
