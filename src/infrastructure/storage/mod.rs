//! Storage infrastructure - Team store implementations

mod factory;
mod in_memory;
pub mod migrations;
mod postgres;

pub use factory::{StorageConfig, StorageFactory, StorageType};
pub use in_memory::InMemoryTeamStore;
pub use migrations::{run_storage_migrations, Migration, Migrator, PostgresMigrator};
pub use postgres::{connect_pool, PostgresConfig, PostgresTeamStore};
