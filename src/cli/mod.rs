//! CLI module for PMP Teams
//!
//! Subcommands:
//! - `migrate`: apply (or revert) the PostgreSQL schema migrations
//! - `create-team`: create a team in draft status
//! - `maintenance`: invitation expiry, counter repair, inactive team
//!   archiving and cleanup of soft-deleted teams
//! - `analytics`: team and global statistics

pub mod analytics;
pub mod maintenance;
pub mod migrate;
pub mod team;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// PMP Teams - team lifecycle, membership and invitation management
#[derive(Parser)]
#[command(name = "pmp-teams")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply database migrations
    Migrate(migrate::MigrateArgs),

    /// Create a team owned by the given principal
    CreateTeam(team::CreateTeamArgs),

    /// Run a maintenance job
    #[command(subcommand)]
    Maintenance(maintenance::MaintenanceCommand),

    /// Print team statistics
    Analytics(analytics::AnalyticsArgs),
}

/// Loads `.env`, the layered configuration and the log subscriber
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);
    Ok(config)
}
