//! PostgreSQL team store with connection pooling

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::domain::activity::ActivityRecord;
use crate::domain::ids::{InvitationId, TeamId};
use crate::domain::invitation::Invitation;
use crate::domain::membership::Membership;
use crate::domain::principal::PrincipalRef;
use crate::domain::store::{constraints, ChangeSet, TeamStore, Write};
use crate::domain::team::Team;
use crate::domain::DomainError;

/// PostgreSQL storage configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/pmp_teams".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

/// Opens a pool for `config`
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, DomainError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
}

/// PostgreSQL team store
///
/// Entities are stored as JSONB alongside the key columns the unique
/// indexes need. A commit runs every staged write in one transaction and
/// translates SQLSTATE 23505 into `DomainError::UniqueViolation`.
#[derive(Debug, Clone)]
pub struct PostgresTeamStore {
    pool: PgPool,
}

impl PostgresTeamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        Ok(Self::new(connect_pool(config).await?))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_one_data<T: DeserializeOwned>(
        &self,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Option<T>, DomainError> {
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(|row| decode_data(&row)).transpose()
    }

    async fn fetch_all_data<T: DeserializeOwned>(
        &self,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<T>, DomainError> {
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx_error)?;
        rows.iter().map(decode_data::<T>).collect()
    }
}

fn decode_data<T: DeserializeOwned>(row: &PgRow) -> Result<T, DomainError> {
    let data: serde_json::Value = row.get("data");
    serde_json::from_value(data)
        .map_err(|e| DomainError::storage(format!("Failed to deserialize entity: {}", e)))
}

fn encode<T: serde::Serialize>(entity: &T) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(entity)
        .map_err(|e| DomainError::storage(format!("Failed to serialize entity: {}", e)))
}

fn map_sqlx_error(error: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db) = &error {
        if db.code().as_deref() == Some("23505") {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            return DomainError::unique_violation(constraint, db.message().to_string());
        }
    }
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DomainError::unavailable(format!("PostgreSQL unavailable: {}", error))
        }
        other => DomainError::storage(format!("PostgreSQL error: {}", other)),
    }
}

async fn apply(tx: &mut Transaction<'_, Postgres>, write: Write) -> Result<(), DomainError> {
    match write {
        Write::InsertTeam(team) => {
            sqlx::query(
                "INSERT INTO teams (id, slug, members_count, version, data, created_at, updated_at, deleted_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(team.id().as_uuid())
            .bind(team.slug())
            .bind(team.members_count() as i32)
            .bind(team.version() as i64)
            .bind(encode(&team)?)
            .bind(team.created_at())
            .bind(team.updated_at())
            .bind(team.deleted_at())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        Write::UpdateTeam {
            team,
            expected_version,
        } => {
            let result = sqlx::query(
                "UPDATE teams SET slug = $2, \
                    data = jsonb_set(jsonb_set($3::jsonb, '{members_count}', to_jsonb(members_count)), \
                                     '{version}', to_jsonb(version + 1)), \
                    version = version + 1, updated_at = $4, deleted_at = $6 \
                 WHERE id = $1 AND version = $5",
            )
            .bind(team.id().as_uuid())
            .bind(team.slug())
            .bind(encode(&team)?)
            .bind(team.updated_at())
            .bind(expected_version as i64)
            .bind(team.deleted_at())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

            if result.rows_affected() == 0 {
                return Err(missing_or_stale(tx, "teams", team.id().as_uuid(), "Team").await);
            }
        }
        Write::AdjustMembers {
            team_id,
            delta,
            ceiling,
        } => {
            let result = sqlx::query(
                "UPDATE teams SET members_count = members_count + $2, \
                    data = jsonb_set(data, '{members_count}', to_jsonb(members_count + $2)) \
                 WHERE id = $1 AND members_count + $2 >= 0 \
                   AND ($3::int IS NULL OR $2 <= 0 OR members_count + $2 <= $3)",
            )
            .bind(team_id.as_uuid())
            .bind(delta)
            .bind(ceiling.map(|c| c as i32))
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

            if result.rows_affected() == 0 {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM teams WHERE id = $1)")
                        .bind(team_id.as_uuid())
                        .fetch_one(&mut **tx)
                        .await
                        .map_err(map_sqlx_error)?;
                return Err(if exists {
                    DomainError::limit_exceeded(format!(
                        "Team '{}' cannot change its member count by {}",
                        team_id, delta
                    ))
                } else {
                    DomainError::not_found(format!("Team '{}' not found", team_id))
                });
            }
        }
        Write::SetMemberCount { team_id, count } => {
            sqlx::query(
                "UPDATE teams SET members_count = $2, \
                    data = jsonb_set(data, '{members_count}', to_jsonb($2)) \
                 WHERE id = $1",
            )
            .bind(team_id.as_uuid())
            .bind(count as i32)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        Write::InsertMembership(membership) => {
            sqlx::query(
                "INSERT INTO memberships (id, team_id, user_kind, user_id, status, version, data, joined_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(membership.id().as_uuid())
            .bind(membership.team_id().as_uuid())
            .bind(&membership.user().kind)
            .bind(&membership.user().id)
            .bind(membership.status().as_str())
            .bind(membership.version() as i64)
            .bind(encode(&membership)?)
            .bind(membership.joined_at())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        Write::UpdateMembership {
            membership,
            expected_version,
        } => {
            let result = sqlx::query(
                "UPDATE memberships SET status = $2, \
                    data = jsonb_set($3::jsonb, '{version}', to_jsonb(version + 1)), \
                    version = version + 1 \
                 WHERE id = $1 AND version = $4",
            )
            .bind(membership.id().as_uuid())
            .bind(membership.status().as_str())
            .bind(encode(&membership)?)
            .bind(expected_version as i64)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

            if result.rows_affected() == 0 {
                return Err(
                    missing_or_stale(tx, "memberships", membership.id().as_uuid(), "Membership")
                        .await,
                );
            }
        }
        Write::InsertInvitation(invitation) => {
            sqlx::query(
                "INSERT INTO invitations (id, team_id, email, token, status, expires_at, version, data, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(invitation.id().as_uuid())
            .bind(invitation.team_id().as_uuid())
            .bind(invitation.email())
            .bind(invitation.token())
            .bind(invitation.status().as_str())
            .bind(invitation.expires_at())
            .bind(invitation.version() as i64)
            .bind(encode(&invitation)?)
            .bind(invitation.created_at())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

            record_token(tx, &invitation).await?;
        }
        Write::UpdateInvitation {
            invitation,
            expected_version,
        } => {
            let result = sqlx::query(
                "UPDATE invitations SET token = $2, status = $3, expires_at = $4, \
                    data = jsonb_set($5::jsonb, '{version}', to_jsonb(version + 1)), \
                    version = version + 1 \
                 WHERE id = $1 AND version = $6",
            )
            .bind(invitation.id().as_uuid())
            .bind(invitation.token())
            .bind(invitation.status().as_str())
            .bind(invitation.expires_at())
            .bind(encode(&invitation)?)
            .bind(expected_version as i64)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

            if result.rows_affected() == 0 {
                return Err(
                    missing_or_stale(tx, "invitations", invitation.id().as_uuid(), "Invitation")
                        .await,
                );
            }

            record_token(tx, &invitation).await?;
        }
        Write::AppendActivity(record) => {
            sqlx::query(
                "INSERT INTO team_activity (id, team_id, data, recorded_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(record.id.as_uuid())
            .bind(record.team_id.as_uuid())
            .bind(encode(&record)?)
            .bind(record.recorded_at)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        Write::PurgeTeam(team_id) => {
            let deleted: Option<bool> =
                sqlx::query_scalar("SELECT deleted_at IS NOT NULL FROM teams WHERE id = $1 FOR UPDATE")
                    .bind(team_id.as_uuid())
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(map_sqlx_error)?;
            match deleted {
                Some(true) => {}
                Some(false) => {
                    return Err(DomainError::conflict(format!(
                        "Team '{}' is not deleted and cannot be purged",
                        team_id
                    )));
                }
                None => {
                    return Err(DomainError::not_found(format!("Team '{}' not found", team_id)));
                }
            }

            for statement in [
                "DELETE FROM team_activity WHERE team_id = $1",
                "DELETE FROM invitation_tokens WHERE invitation_id IN \
                    (SELECT id FROM invitations WHERE team_id = $1)",
                "DELETE FROM invitations WHERE team_id = $1",
                "DELETE FROM memberships WHERE team_id = $1",
                "DELETE FROM teams WHERE id = $1",
            ] {
                sqlx::query(statement)
                    .bind(team_id.as_uuid())
                    .execute(&mut **tx)
                    .await
                    .map_err(map_sqlx_error)?;
            }
        }
    }
    Ok(())
}

/// Registers the invitation's current token; a token held by another
/// invitation, past or present, is a unique violation
async fn record_token(
    tx: &mut Transaction<'_, Postgres>,
    invitation: &Invitation,
) -> Result<(), DomainError> {
    let owner: Option<uuid::Uuid> =
        sqlx::query_scalar("SELECT invitation_id FROM invitation_tokens WHERE token = $1")
            .bind(invitation.token())
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

    match owner {
        Some(id) if &id == invitation.id().as_uuid() => Ok(()),
        Some(_) => Err(DomainError::unique_violation(
            constraints::INVITATION_TOKEN,
            "Invitation token already issued",
        )),
        None => {
            sqlx::query("INSERT INTO invitation_tokens (token, invitation_id) VALUES ($1, $2)")
                .bind(invitation.token())
                .bind(invitation.id().as_uuid())
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;
            Ok(())
        }
    }
}

async fn missing_or_stale(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    id: &uuid::Uuid,
    entity: &str,
) -> DomainError {
    let query = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table);
    match sqlx::query_scalar::<_, bool>(&query)
        .bind(id)
        .fetch_one(&mut **tx)
        .await
    {
        Ok(true) => DomainError::stale_write(format!("{} '{}' changed since it was read", entity, id)),
        Ok(false) => DomainError::not_found(format!("{} '{}' not found", entity, id)),
        Err(e) => map_sqlx_error(e),
    }
}

#[async_trait]
impl TeamStore for PostgresTeamStore {
    async fn find_team(&self, id: &TeamId) -> Result<Option<Team>, DomainError> {
        self.fetch_one_data(
            sqlx::query("SELECT data FROM teams WHERE id = $1 AND deleted_at IS NULL")
                .bind(id.as_uuid()),
        )
        .await
    }

    async fn find_team_by_slug(&self, slug: &str) -> Result<Option<Team>, DomainError> {
        self.fetch_one_data(
            sqlx::query("SELECT data FROM teams WHERE slug = $1 AND deleted_at IS NULL").bind(slug),
        )
        .await
    }

    async fn list_teams(&self) -> Result<Vec<Team>, DomainError> {
        self.fetch_all_data(sqlx::query(
            "SELECT data FROM teams WHERE deleted_at IS NULL ORDER BY created_at",
        ))
        .await
    }

    async fn list_teams_owned_by(&self, owner: &PrincipalRef) -> Result<Vec<Team>, DomainError> {
        self.fetch_all_data(
            sqlx::query(
                "SELECT data FROM teams \
                 WHERE deleted_at IS NULL AND data->'owner'->>'kind' = $1 AND data->'owner'->>'id' = $2 \
                 ORDER BY created_at",
            )
            .bind(&owner.kind)
            .bind(&owner.id),
        )
        .await
    }

    async fn list_deleted_teams(&self, before: DateTime<Utc>) -> Result<Vec<Team>, DomainError> {
        self.fetch_all_data(
            sqlx::query(
                "SELECT data FROM teams WHERE deleted_at IS NOT NULL AND deleted_at < $1 \
                 ORDER BY deleted_at",
            )
            .bind(before),
        )
        .await
    }

    async fn find_membership(
        &self,
        team: &TeamId,
        user: &PrincipalRef,
    ) -> Result<Option<Membership>, DomainError> {
        self.fetch_one_data(
            sqlx::query(
                "SELECT data FROM memberships \
                 WHERE team_id = $1 AND user_kind = $2 AND user_id = $3 AND status <> 'removed'",
            )
            .bind(team.as_uuid())
            .bind(&user.kind)
            .bind(&user.id),
        )
        .await
    }

    async fn list_memberships(&self, team: &TeamId) -> Result<Vec<Membership>, DomainError> {
        self.fetch_all_data(
            sqlx::query(
                "SELECT data FROM memberships WHERE team_id = $1 AND status <> 'removed' \
                 ORDER BY joined_at",
            )
            .bind(team.as_uuid()),
        )
        .await
    }

    async fn list_memberships_for(&self, user: &PrincipalRef) -> Result<Vec<Membership>, DomainError> {
        self.fetch_all_data(
            sqlx::query(
                "SELECT data FROM memberships \
                 WHERE user_kind = $1 AND user_id = $2 AND status <> 'removed' ORDER BY joined_at",
            )
            .bind(&user.kind)
            .bind(&user.id),
        )
        .await
    }

    async fn find_invitation(&self, id: &InvitationId) -> Result<Option<Invitation>, DomainError> {
        self.fetch_one_data(
            sqlx::query("SELECT data FROM invitations WHERE id = $1").bind(id.as_uuid()),
        )
        .await
    }

    async fn find_invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, DomainError> {
        self.fetch_one_data(sqlx::query("SELECT data FROM invitations WHERE token = $1").bind(token))
            .await
    }

    async fn find_pending_invitation(
        &self,
        team: &TeamId,
        email: &str,
    ) -> Result<Option<Invitation>, DomainError> {
        self.fetch_one_data(
            sqlx::query(
                "SELECT data FROM invitations WHERE team_id = $1 AND email = $2 AND status = 'pending'",
            )
            .bind(team.as_uuid())
            .bind(email),
        )
        .await
    }

    async fn list_invitations(&self, team: &TeamId) -> Result<Vec<Invitation>, DomainError> {
        self.fetch_all_data(
            sqlx::query("SELECT data FROM invitations WHERE team_id = $1 ORDER BY created_at")
                .bind(team.as_uuid()),
        )
        .await
    }

    async fn token_exists(&self, token: &str) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM invitation_tokens WHERE token = $1)")
            .bind(token)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_expired_invitations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, DomainError> {
        self.fetch_all_data(
            sqlx::query(
                "SELECT data FROM invitations WHERE status = 'pending' AND expires_at < $1 \
                 ORDER BY expires_at",
            )
            .bind(cutoff),
        )
        .await
    }

    async fn list_activity(&self, team: &TeamId) -> Result<Vec<ActivityRecord>, DomainError> {
        self.fetch_all_data(
            sqlx::query("SELECT data FROM team_activity WHERE team_id = $1 ORDER BY recorded_at")
                .bind(team.as_uuid()),
        )
        .await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for write in changes.into_writes() {
            // Dropping the transaction on error rolls it back.
            apply(&mut tx, write).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }
}
