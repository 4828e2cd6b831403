//! Inviter-side invitation management: cancel and resend

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::TeamsConfig;
use crate::domain::action::{ActionContext, ActionError, FieldErrors, SubAction};
use crate::domain::cache::CacheTag;
use crate::domain::event::EventKind;
use crate::domain::ids::InvitationId;
use crate::domain::invitation::Invitation;
use crate::domain::permission::capabilities as cap;
use crate::domain::store::ChangeSet;
use crate::domain::team::Team;

use super::invite_member::{delivery_sub_actions, IssuedInvitation};
use super::pipeline::{Action, ActionEnv, Executed};
use super::support::{activity, ensure_not_archived, event, load_team, require_any};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvitationIdInput {
    pub invitation_id: String,
}

impl InvitationIdInput {
    pub fn new(invitation_id: impl Into<String>) -> Self {
        Self {
            invitation_id: invitation_id.into(),
        }
    }
}

fn parse_invitation_id(input: InvitationIdInput) -> Result<InvitationId, FieldErrors> {
    InvitationId::parse(input.invitation_id.trim())
        .map_err(|e| FieldErrors::single("invitation_id", e.to_string()))
}

/// The inviter may always manage their own invitation; anyone else needs an
/// invite or member-management capability on the team.
async fn authorize_manager(
    env: &ActionEnv,
    ctx: &ActionContext,
    id: &InvitationId,
) -> Result<(Invitation, Team), ActionError> {
    let invitation = env
        .store
        .find_invitation(id)
        .await?
        .ok_or_else(|| ActionError::not_found(format!("Invitation '{}' not found", id)))?;
    let team = load_team(env, ctx, invitation.team_id()).await?;

    if invitation.invited_by() != &ctx.actor {
        require_any(
            env,
            ctx,
            &team,
            &[cap::INVITE_TEAM_MEMBER, cap::MANAGE_TEAM_MEMBERS],
        )
        .await?;
    }
    Ok((invitation, team))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CancelInvitation;

#[async_trait]
impl Action for CancelInvitation {
    type Input = InvitationIdInput;
    type Normalized = InvitationId;
    type Output = Invitation;

    fn name(&self) -> &'static str {
        "cancel_invitation"
    }

    fn validate(
        &self,
        input: InvitationIdInput,
        _ctx: &ActionContext,
        _config: &TeamsConfig,
    ) -> Result<InvitationId, FieldErrors> {
        parse_invitation_id(input)
    }

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        id: &InvitationId,
    ) -> Result<(), ActionError> {
        authorize_manager(env, ctx, id).await.map(|_| ())
    }

    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        id: &InvitationId,
        changes: &mut ChangeSet,
    ) -> Result<Executed<Invitation>, ActionError> {
        let invitation = env.invitations.cancel(id, ctx.now, changes).await?;

        let team_id = *invitation.team_id();
        let payload = json!({
            "invitation_id": invitation.id(),
            "email": invitation.email(),
            "cancelled_by": ctx.actor,
        });
        changes.append_activity(activity(
            ctx,
            team_id,
            "invitation",
            invitation.id(),
            "invitation_cancelled",
            payload.clone(),
        ));

        Ok(Executed::new(
            invitation,
            event(ctx, EventKind::InvitationCancelled, team_id, payload),
            vec![CacheTag::team(&team_id)],
        ))
    }

    fn success_message(&self, invitation: &Invitation) -> String {
        format!("Invitation for {} cancelled", invitation.email())
    }
}

/// Reissues a pending invitation with a new token and expiry, subject to the
/// resend limit and cooldown
#[derive(Debug, Clone, Copy, Default)]
pub struct ResendInvitation;

#[async_trait]
impl Action for ResendInvitation {
    type Input = InvitationIdInput;
    type Normalized = InvitationId;
    type Output = IssuedInvitation;

    fn name(&self) -> &'static str {
        "resend_invitation"
    }

    fn validate(
        &self,
        input: InvitationIdInput,
        _ctx: &ActionContext,
        _config: &TeamsConfig,
    ) -> Result<InvitationId, FieldErrors> {
        parse_invitation_id(input)
    }

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        id: &InvitationId,
    ) -> Result<(), ActionError> {
        let (_, team) = authorize_manager(env, ctx, id).await?;
        ensure_not_archived(&team, "invitation_id")
    }

    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        id: &InvitationId,
        changes: &mut ChangeSet,
    ) -> Result<Executed<IssuedInvitation>, ActionError> {
        let invitation = env.invitations.resend(id, ctx.now, changes).await?;
        let team = load_team(env, ctx, invitation.team_id()).await?;

        let payload = json!({
            "invitation_id": invitation.id(),
            "email": invitation.email(),
            "role": invitation.role(),
            "expires_at": invitation.expires_at(),
            "resent": true,
            "resend_count": invitation.resend_count(),
        });
        changes.append_activity(activity(
            ctx,
            *team.id(),
            "invitation",
            invitation.id(),
            "invitation_resent",
            payload.clone(),
        ));

        Ok(Executed::new(
            IssuedInvitation {
                invitation,
                team_name: team.name().to_string(),
            },
            event(ctx, EventKind::InvitationSent, *team.id(), payload),
            vec![CacheTag::team(team.id())],
        ))
    }

    fn after(
        &self,
        env: &ActionEnv,
        _ctx: &ActionContext,
        _id: &InvitationId,
        issued: &IssuedInvitation,
    ) -> Vec<SubAction> {
        delivery_sub_actions(env, issued)
    }

    fn success_message(&self, issued: &IssuedInvitation) -> String {
        format!("Invitation resent to {}", issued.invitation.email())
    }
}
