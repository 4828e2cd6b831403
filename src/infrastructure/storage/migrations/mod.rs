//! Database migrations for the PostgreSQL team store

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::domain::DomainError;

/// Trait for running database migrations
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Runs all pending migrations
    async fn run(&self) -> Result<(), DomainError>;

    /// Reverts the last migration
    async fn revert(&self) -> Result<(), DomainError>;

    /// Returns the current migration version
    async fn version(&self) -> Result<Option<i64>, DomainError>;
}

/// PostgreSQL migrator using sqlx embedded migrations
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the migrations table if it doesn't exist
    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                success BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    /// Runs a single migration
    pub async fn run_migration(&self, migration: &Migration) -> Result<(), DomainError> {
        self.ensure_migrations_table().await?;

        // Check if already applied
        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)",
        )
        .bind(migration.version)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))?;

        if applied {
            return Ok(());
        }

        // Run the migration
        sqlx::raw_sql(&migration.up)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        // Record the migration
        sqlx::query(
            "INSERT INTO _migrations (version, description) VALUES ($1, $2)",
        )
        .bind(migration.version)
        .bind(&migration.description)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::storage(format!("Failed to record migration {}: {}", migration.version, e))
        })?;

        Ok(())
    }

    /// Reverts a single migration
    pub async fn revert_migration(&self, migration: &Migration) -> Result<(), DomainError> {
        self.ensure_migrations_table().await?;

        // Check if applied
        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)",
        )
        .bind(migration.version)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))?;

        if !applied {
            return Ok(());
        }

        // Run the down migration
        sqlx::raw_sql(&migration.down)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to revert migration {}: {}",
                    migration.version, e
                ))
            })?;

        // Remove the migration record
        sqlx::query("DELETE FROM _migrations WHERE version = $1")
            .bind(migration.version)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to remove migration record {}: {}",
                    migration.version, e
                ))
            })?;

        Ok(())
    }

    /// Returns the latest applied migration version
    pub async fn current_version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        let version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version) FROM _migrations WHERE success = TRUE",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get migration version: {}", e)))?;

        Ok(version)
    }

    /// Returns all applied migration versions
    pub async fn applied_versions(&self) -> Result<Vec<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        let versions: Vec<i64> = sqlx::query_scalar(
            "SELECT version FROM _migrations WHERE success = TRUE ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get applied migrations: {}", e)))?;

        Ok(versions)
    }
}

/// Represents a database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version (timestamp-based recommended)
    pub version: i64,
    /// Human-readable description
    pub description: String,
    /// SQL to run when applying the migration
    pub up: String,
    /// SQL to run when reverting the migration
    pub down: String,
}

impl Migration {
    pub fn new(
        version: i64,
        description: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

/// Schema for teams, memberships, invitations and the activity log
pub fn storage_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create teams table",
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id UUID PRIMARY KEY,
                slug VARCHAR(255) NOT NULL,
                members_count INTEGER NOT NULL DEFAULT 0,
                version BIGINT NOT NULL DEFAULT 0,
                deleted_at TIMESTAMPTZ,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE UNIQUE INDEX IF NOT EXISTS teams_slug_unique
                ON teams(slug) WHERE deleted_at IS NULL;
            CREATE INDEX IF NOT EXISTS idx_teams_created_at ON teams(created_at);
            "#,
            r#"
            DROP TABLE IF EXISTS teams;
            "#,
        ),
        Migration::new(
            2,
            "Create memberships table",
            r#"
            CREATE TABLE IF NOT EXISTS memberships (
                id UUID PRIMARY KEY,
                team_id UUID NOT NULL REFERENCES teams(id),
                user_kind VARCHAR(100) NOT NULL,
                user_id VARCHAR(255) NOT NULL,
                status VARCHAR(20) NOT NULL,
                version BIGINT NOT NULL DEFAULT 0,
                data JSONB NOT NULL,
                joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE UNIQUE INDEX IF NOT EXISTS memberships_team_user_unique
                ON memberships(team_id, user_kind, user_id) WHERE status <> 'removed';
            CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships(user_kind, user_id);
            "#,
            r#"
            DROP TABLE IF EXISTS memberships;
            "#,
        ),
        Migration::new(
            3,
            "Create invitations tables",
            r#"
            CREATE TABLE IF NOT EXISTS invitations (
                id UUID PRIMARY KEY,
                team_id UUID NOT NULL REFERENCES teams(id),
                email VARCHAR(255) NOT NULL,
                token VARCHAR(255) NOT NULL,
                status VARCHAR(20) NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                version BIGINT NOT NULL DEFAULT 0,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE UNIQUE INDEX IF NOT EXISTS invitations_pending_team_email_unique
                ON invitations(team_id, email) WHERE status = 'pending';
            CREATE INDEX IF NOT EXISTS idx_invitations_token ON invitations(token);
            CREATE INDEX IF NOT EXISTS idx_invitations_expiry
                ON invitations(expires_at) WHERE status = 'pending';

            CREATE TABLE IF NOT EXISTS invitation_tokens (
                token VARCHAR(255) NOT NULL,
                invitation_id UUID NOT NULL REFERENCES invitations(id),
                issued_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT invitation_tokens_unique PRIMARY KEY (token)
            );
            "#,
            r#"
            DROP TABLE IF EXISTS invitation_tokens;
            DROP TABLE IF EXISTS invitations;
            "#,
        ),
        Migration::new(
            4,
            "Create activity log table",
            r#"
            CREATE TABLE IF NOT EXISTS team_activity (
                id UUID PRIMARY KEY,
                team_id UUID NOT NULL,
                data JSONB NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_team_activity_team
                ON team_activity(team_id, recorded_at);
            "#,
            r#"
            DROP TABLE IF EXISTS team_activity;
            "#,
        ),
        Migration::new(
            5,
            "Index team owners and deletions",
            r#"
            CREATE INDEX IF NOT EXISTS idx_teams_owner
                ON teams((data->'owner'->>'kind'), (data->'owner'->>'id'))
                WHERE deleted_at IS NULL;
            CREATE INDEX IF NOT EXISTS idx_teams_deleted_at
                ON teams(deleted_at) WHERE deleted_at IS NOT NULL;
            "#,
            r#"
            DROP INDEX IF EXISTS idx_teams_deleted_at;
            DROP INDEX IF EXISTS idx_teams_owner;
            "#,
        ),
    ]
}

/// Runs all pending storage migrations
pub async fn run_storage_migrations(pool: &PgPool) -> Result<(), DomainError> {
    PostgresMigrator::new(pool.clone()).run().await
}

#[async_trait]
impl Migrator for PostgresMigrator {
    async fn run(&self) -> Result<(), DomainError> {
        for migration in storage_migrations() {
            self.run_migration(&migration).await?;
        }
        Ok(())
    }

    async fn revert(&self) -> Result<(), DomainError> {
        let Some(current) = self.current_version().await? else {
            return Ok(());
        };

        match storage_migrations().iter().find(|m| m.version == current) {
            Some(migration) => self.revert_migration(migration).await,
            None => Err(DomainError::storage(format!(
                "Applied migration {} is unknown to this build",
                current
            ))),
        }
    }

    async fn version(&self) -> Result<Option<i64>, DomainError> {
        self.current_version().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creation() {
        let migration = Migration::new(1, "Test migration", "CREATE TABLE test", "DROP TABLE test");

        assert_eq!(migration.version, 1);
        assert_eq!(migration.description, "Test migration");
        assert_eq!(migration.up, "CREATE TABLE test");
        assert_eq!(migration.down, "DROP TABLE test");
    }

    #[test]
    fn test_storage_migrations_order() {
        let migrations = storage_migrations();

        assert!(!migrations.is_empty());

        // Verify migrations are in order
        for i in 1..migrations.len() {
            assert!(
                migrations[i].version > migrations[i - 1].version,
                "Migrations should be in ascending order"
            );
        }
    }

    #[test]
    fn test_unique_indexes_match_constraint_names() {
        use crate::domain::store::constraints;

        let sql: String = storage_migrations().into_iter().map(|m| m.up).collect();
        for name in [
            constraints::TEAM_SLUG,
            constraints::MEMBERSHIP,
            constraints::PENDING_INVITATION,
            constraints::INVITATION_TOKEN,
        ] {
            assert!(sql.contains(name), "missing constraint {name}");
        }
    }

    #[test]
    fn test_storage_migrations_content() {
        let migrations = storage_migrations();

        // Verify all migrations have required content
        for migration in migrations {
            assert!(!migration.description.is_empty());
            assert!(!migration.up.is_empty());
            assert!(!migration.down.is_empty());
        }
    }
}
