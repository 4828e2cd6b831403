//! Migrate command - applies the PostgreSQL schema

use clap::Args;
use tracing::info;

use crate::infrastructure::storage::{connect_pool, Migrator, PostgresMigrator, StorageConfig};

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Revert the most recent migration instead of applying pending ones
    #[arg(long)]
    pub revert: bool,
}

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let StorageConfig::Postgres(pg_config) = StorageConfig::from_settings(&config.storage)? else {
        anyhow::bail!(
            "Migrations need the postgres backend; storage.backend is '{}'",
            config.storage.backend
        );
    };

    let migrator = PostgresMigrator::new(connect_pool(&pg_config).await?);
    if args.revert {
        migrator.revert().await?;
    } else {
        migrator.run().await?;
    }

    match migrator.version().await? {
        Some(version) => info!(version, "Schema is at version {}", version),
        None => info!("No migrations applied"),
    }
    Ok(())
}
