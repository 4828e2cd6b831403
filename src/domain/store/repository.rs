//! Team store trait

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use super::changeset::ChangeSet;
use crate::domain::activity::ActivityRecord;
use crate::domain::ids::{InvitationId, TeamId};
use crate::domain::invitation::Invitation;
use crate::domain::membership::Membership;
use crate::domain::principal::PrincipalRef;
use crate::domain::team::Team;
use crate::domain::DomainError;

/// Names of the unique constraints a store must enforce
pub mod constraints {
    /// Slug among non-deleted teams
    pub const TEAM_SLUG: &str = "teams_slug_unique";
    /// (team, user) among non-removed memberships
    pub const MEMBERSHIP: &str = "memberships_team_user_unique";
    /// (team, email) among pending invitations
    pub const PENDING_INVITATION: &str = "invitations_pending_team_email_unique";
    /// Every token ever issued, including replaced ones
    pub const INVITATION_TOKEN: &str = "invitation_tokens_unique";
}

/// Transactional storage for teams, memberships, invitations and activity
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TeamStore: Send + Sync + Debug {
    /// Non-deleted team by id
    async fn find_team(&self, id: &TeamId) -> Result<Option<Team>, DomainError>;

    /// Non-deleted team by slug
    async fn find_team_by_slug(&self, slug: &str) -> Result<Option<Team>, DomainError>;

    /// All non-deleted teams
    async fn list_teams(&self) -> Result<Vec<Team>, DomainError>;

    /// Non-deleted teams whose owner reference is `owner`
    async fn list_teams_owned_by(&self, owner: &PrincipalRef) -> Result<Vec<Team>, DomainError>;

    /// Soft-deleted teams whose deletion happened before `before`
    async fn list_deleted_teams(&self, before: DateTime<Utc>) -> Result<Vec<Team>, DomainError>;

    /// The non-removed membership of `user` in `team`, if any
    async fn find_membership(
        &self,
        team: &TeamId,
        user: &PrincipalRef,
    ) -> Result<Option<Membership>, DomainError>;

    /// Non-removed memberships of a team
    async fn list_memberships(&self, team: &TeamId) -> Result<Vec<Membership>, DomainError>;

    /// Non-removed memberships held by a principal across teams
    async fn list_memberships_for(&self, user: &PrincipalRef) -> Result<Vec<Membership>, DomainError>;

    async fn find_invitation(&self, id: &InvitationId) -> Result<Option<Invitation>, DomainError>;

    /// Looks up by the invitation's current token
    async fn find_invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, DomainError>;

    async fn find_pending_invitation(
        &self,
        team: &TeamId,
        email: &str,
    ) -> Result<Option<Invitation>, DomainError>;

    async fn list_invitations(&self, team: &TeamId) -> Result<Vec<Invitation>, DomainError>;

    /// True if the token was ever issued, including tokens replaced by a resend
    async fn token_exists(&self, token: &str) -> Result<bool, DomainError>;

    /// Pending invitations whose `expires_at` is before `cutoff`
    async fn list_expired_invitations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, DomainError>;

    /// Activity records for a team, oldest first
    async fn list_activity(&self, team: &TeamId) -> Result<Vec<ActivityRecord>, DomainError>;

    /// Applies every write or none
    async fn commit(&self, changes: ChangeSet) -> Result<(), DomainError>;
}
