//! Invitation lifecycle manager
//!
//! Owns token issuance and the pending → accepted / declined / cancelled /
//! expired transitions. Mutations are staged into the caller's `ChangeSet`
//! so they commit together with the rest of an operation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::TeamsConfig;
use crate::domain::action::{ActionError, ConflictCode};
use crate::domain::ids::InvitationId;
use crate::domain::invitation::{Invitation, TokenGenerator};
use crate::domain::membership::Membership;
use crate::domain::permission::TeamRole;
use crate::domain::principal::PrincipalRef;
use crate::domain::store::{ChangeSet, TeamStore};
use crate::domain::team::Team;
use crate::domain::DomainError;

/// Candidate tokens drawn before giving up
const MAX_TOKEN_ATTEMPTS: usize = 10;

/// Normalized parameters for a new invitation
#[derive(Debug, Clone)]
pub struct InvitationRequest {
    /// Already normalized address
    pub email: String,
    pub role: TeamRole,
    /// Empty means the role's default capabilities
    pub permissions: Vec<String>,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InvitationManager {
    store: Arc<dyn TeamStore>,
    generator: Arc<dyn TokenGenerator>,
    config: Arc<TeamsConfig>,
}

impl InvitationManager {
    pub fn new(
        store: Arc<dyn TeamStore>,
        generator: Arc<dyn TokenGenerator>,
        config: Arc<TeamsConfig>,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    /// `now + ttl` when a programmatic ttl is given, else the configured default
    pub fn expiry_for(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> DateTime<Utc> {
        now + ttl.unwrap_or_else(|| self.config.invitation_ttl())
    }

    /// Draws tokens until one has never been issued
    pub async fn issue_token(&self) -> Result<String, DomainError> {
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let candidate = self.generator.generate();
            if !self.store.token_exists(&candidate).await? {
                return Ok(candidate);
            }
            warn!(attempt, "Invitation token collision, drawing again");
        }

        Err(DomainError::unavailable(format!(
            "Could not issue a unique invitation token after {} attempts",
            MAX_TOKEN_ATTEMPTS
        )))
    }

    /// Stages a new pending invitation for `team`
    pub async fn create(
        &self,
        team: &Team,
        request: InvitationRequest,
        inviter: &PrincipalRef,
        now: DateTime<Utc>,
        changes: &mut ChangeSet,
    ) -> Result<Invitation, ActionError> {
        if self
            .store
            .find_pending_invitation(team.id(), &request.email)
            .await?
            .is_some()
        {
            return Err(ActionError::conflict(
                ConflictCode::DuplicatePendingInvitation,
                format!("A pending invitation for '{}' already exists", request.email),
            ));
        }

        let ceiling = team.member_ceiling(self.config.limits.max_members_per_team);
        if team.members_count() >= ceiling {
            return Err(ActionError::conflict(
                ConflictCode::MemberLimitReached,
                format!("Team has reached its limit of {} members", ceiling),
            ));
        }

        let pending = self
            .store
            .list_invitations(team.id())
            .await?
            .iter()
            .filter(|inv| inv.is_pending())
            .count();
        if pending >= self.config.invitations.max_pending_per_team as usize {
            return Err(ActionError::forbidden_on(
                "email",
                format!(
                    "Team already has {} pending invitations",
                    self.config.invitations.max_pending_per_team
                ),
            ));
        }

        let permissions = if request.permissions.is_empty() {
            self.config.roles.names_for(&request.role)
        } else {
            request.permissions
        };

        let token = self.issue_token().await?;
        let invitation = Invitation::new(
            *team.id(),
            request.email,
            token,
            request.role,
            permissions,
            inviter.clone(),
            request.expires_at,
            now,
        )
        .with_message(request.message)
        .with_tenant(team.tenant().cloned());

        debug!(
            team_id = %team.id(),
            invitation_id = %invitation.id(),
            expires_at = %invitation.expires_at(),
            "Staging invitation"
        );
        changes.insert_invitation(invitation.clone());
        Ok(invitation)
    }

    /// The invitation behind `token` if it is still pending and unexpired
    pub async fn find_actionable(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Invitation, ActionError> {
        let invitation = self
            .store
            .find_invitation_by_token(token)
            .await?
            .ok_or_else(|| ActionError::invalid_invitation("Invitation not found"))?;

        if !invitation.is_pending() {
            return Err(ActionError::invalid_invitation(format!(
                "Invitation is {}",
                invitation.status()
            )));
        }
        if invitation.is_past_expiry(now) {
            return Err(ActionError::invalid_invitation("Invitation has expired"));
        }

        Ok(invitation)
    }

    /// Marks the invitation accepted and stages the membership it grants
    pub async fn accept(
        &self,
        token: &str,
        user: &PrincipalRef,
        now: DateTime<Utc>,
        changes: &mut ChangeSet,
    ) -> Result<(Invitation, Membership), ActionError> {
        let mut invitation = self.find_actionable(token, now).await?;

        let team = self
            .store
            .find_team(invitation.team_id())
            .await?
            .ok_or_else(|| ActionError::not_found("Team not found"))?;

        if self.store.find_membership(team.id(), user).await?.is_some() {
            return Err(ActionError::conflict(
                ConflictCode::AlreadyMember,
                format!("{} is already a member of this team", user),
            ));
        }

        let membership = Membership::new(
            *team.id(),
            user.clone(),
            invitation.role().clone(),
            invitation.permissions().to_vec(),
            now,
        )
        .with_tenant(invitation.tenant().cloned())
        .with_invited_by(invitation.invited_by().clone());

        invitation.accept(user.clone(), now);

        let ceiling = team.member_ceiling(self.config.limits.max_members_per_team);
        changes
            .update_invitation(invitation.clone())
            .insert_membership(membership.clone())
            .adjust_members(*team.id(), 1, Some(ceiling));

        Ok((invitation, membership))
    }

    pub async fn decline(
        &self,
        token: &str,
        now: DateTime<Utc>,
        changes: &mut ChangeSet,
    ) -> Result<Invitation, ActionError> {
        let mut invitation = self.find_actionable(token, now).await?;
        invitation.decline(now);
        changes.update_invitation(invitation.clone());
        Ok(invitation)
    }

    /// Withdraws a pending invitation; expired-by-time invitations may be cancelled too
    pub async fn cancel(
        &self,
        id: &InvitationId,
        now: DateTime<Utc>,
        changes: &mut ChangeSet,
    ) -> Result<Invitation, ActionError> {
        let mut invitation = self.load(id).await?;
        if !invitation.is_pending() {
            return Err(ActionError::invalid_invitation(format!(
                "Invitation is {}",
                invitation.status()
            )));
        }

        invitation.cancel(now);
        changes.update_invitation(invitation.clone());
        Ok(invitation)
    }

    /// Issues a fresh token and expiry.
    ///
    /// The resend limit applies regardless of elapsed time; the cooldown is
    /// measured from the last send.
    pub async fn resend(
        &self,
        id: &InvitationId,
        now: DateTime<Utc>,
        changes: &mut ChangeSet,
    ) -> Result<Invitation, ActionError> {
        let mut invitation = self.load(id).await?;
        if !invitation.is_pending() {
            return Err(ActionError::invalid_invitation(format!(
                "Only pending invitations can be resent; this one is {}",
                invitation.status()
            )));
        }

        let limit = self.config.invitations.resend_limit;
        if invitation.resend_count() >= limit {
            return Err(ActionError::conflict(
                ConflictCode::ResendLimitExceeded,
                format!("Invitation has already been resent {} times", limit),
            ));
        }

        let next_allowed = invitation.last_sent_at() + self.config.resend_cooldown();
        if now < next_allowed {
            return Err(ActionError::conflict(
                ConflictCode::ResendTooSoon,
                format!("Invitation can be resent after {}", next_allowed.to_rfc3339()),
            ));
        }

        let token = self.issue_token().await?;
        invitation.reissue(token, self.expiry_for(None, now), now);
        changes.update_invitation(invitation.clone());
        Ok(invitation)
    }

    /// Pending invitations that expired more than `older_than_days` ago
    pub async fn list_expired(
        &self,
        older_than_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, DomainError> {
        let cutoff = now - Duration::days(older_than_days.max(0));
        self.store.list_expired_invitations(cutoff).await
    }

    /// Marks expired invitations as `expired`; with `dry_run` only reports them
    pub async fn expire_sweep(
        &self,
        older_than_days: i64,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, DomainError> {
        let mut expired = self.list_expired(older_than_days, now).await?;
        if dry_run || expired.is_empty() {
            info!(count = expired.len(), dry_run, "Expired invitation sweep");
            return Ok(expired);
        }

        let mut changes = ChangeSet::new();
        for invitation in &mut expired {
            invitation.expire(now);
            changes.update_invitation(invitation.clone());
        }
        self.store.commit(changes).await?;

        info!(count = expired.len(), "Marked invitations as expired");
        Ok(expired)
    }

    async fn load(&self, id: &InvitationId) -> Result<Invitation, ActionError> {
        self.store
            .find_invitation(id)
            .await?
            .ok_or_else(|| ActionError::not_found(format!("Invitation '{}' not found", id)))
    }
}
