//! Invitee responses: accept and decline

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::TeamsConfig;
use crate::domain::action::{ActionContext, ActionError, FieldErrors, SubAction};
use crate::domain::cache::CacheTag;
use crate::domain::event::EventKind;
use crate::domain::invitation::{normalize_email, Invitation};
use crate::domain::membership::Membership;
use crate::domain::notification::NotificationKind;
use crate::domain::store::ChangeSet;

use super::follow_ups::{notifications_enabled, notify_principals};
use super::pipeline::{Action, ActionEnv, Executed};
use super::support::{activity, ensure_not_archived, event, load_team};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvitationTokenInput {
    pub token: String,
}

impl InvitationTokenInput {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

fn validate_token(input: InvitationTokenInput) -> Result<String, FieldErrors> {
    let token = input.token.trim().to_string();
    if token.is_empty() {
        return Err(FieldErrors::single("token", "Token is required"));
    }
    Ok(token)
}

/// Joins the team behind an invitation token
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptInvitation;

/// What accepting an invitation produced
#[derive(Debug, Clone)]
pub struct AcceptedInvitation {
    pub invitation: Invitation,
    pub membership: Membership,
}

#[async_trait]
impl Action for AcceptInvitation {
    type Input = InvitationTokenInput;
    type Normalized = String;
    type Output = AcceptedInvitation;

    fn name(&self) -> &'static str {
        "accept_invitation"
    }

    fn validate(
        &self,
        input: InvitationTokenInput,
        _ctx: &ActionContext,
        _config: &TeamsConfig,
    ) -> Result<String, FieldErrors> {
        validate_token(input)
    }

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        token: &String,
    ) -> Result<(), ActionError> {
        let invitation = env.invitations.find_actionable(token, ctx.now).await?;
        let team = load_team(env, ctx, invitation.team_id()).await?;
        ensure_not_archived(&team, "token")?;

        let profile = env
            .directory
            .lookup(&ctx.actor)
            .await?
            .ok_or_else(|| ActionError::not_found(format!("User '{}' not found", ctx.actor)))?;
        let matches = profile
            .email
            .as_deref()
            .is_some_and(|email| normalize_email(email) == invitation.email());
        if !matches {
            return Err(ActionError::forbidden_on(
                "token",
                "This invitation was issued to a different email address",
            ));
        }
        Ok(())
    }

    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        token: &String,
        changes: &mut ChangeSet,
    ) -> Result<Executed<AcceptedInvitation>, ActionError> {
        let (invitation, membership) = env
            .invitations
            .accept(token, &ctx.actor, ctx.now, changes)
            .await?;

        let team_id = *invitation.team_id();
        let payload = json!({
            "invitation_id": invitation.id(),
            "membership_id": membership.id(),
            "user": ctx.actor,
            "role": membership.role(),
            "invited_by": invitation.invited_by(),
        });
        changes.append_activity(activity(
            ctx,
            team_id,
            "invitation",
            invitation.id(),
            "invitation_accepted",
            payload.clone(),
        ));

        Ok(Executed::new(
            AcceptedInvitation {
                invitation,
                membership,
            },
            event(ctx, EventKind::InvitationAccepted, team_id, payload),
            vec![CacheTag::team(&team_id), CacheTag::user(&ctx.actor)],
        ))
    }

    fn after(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        _token: &String,
        accepted: &AcceptedInvitation,
    ) -> Vec<SubAction> {
        if !notifications_enabled(env) {
            return Vec::new();
        }

        vec![notify_principals(
            env,
            "notify_inviter",
            NotificationKind::InvitationAccepted,
            *accepted.invitation.team_id(),
            vec![accepted.invitation.invited_by().clone()],
            json!({ "user": ctx.actor, "email": accepted.invitation.email() }),
        )]
    }

    fn success_message(&self, accepted: &AcceptedInvitation) -> String {
        format!("Joined the team as {}", accepted.membership.role())
    }
}

/// Turns an invitation down; only the token holder can do this
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineInvitation;

#[async_trait]
impl Action for DeclineInvitation {
    type Input = InvitationTokenInput;
    type Normalized = String;
    type Output = Invitation;

    fn name(&self) -> &'static str {
        "decline_invitation"
    }

    fn validate(
        &self,
        input: InvitationTokenInput,
        _ctx: &ActionContext,
        _config: &TeamsConfig,
    ) -> Result<String, FieldErrors> {
        validate_token(input)
    }

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        token: &String,
    ) -> Result<(), ActionError> {
        env.invitations.find_actionable(token, ctx.now).await?;
        Ok(())
    }

    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        token: &String,
        changes: &mut ChangeSet,
    ) -> Result<Executed<Invitation>, ActionError> {
        let invitation = env.invitations.decline(token, ctx.now, changes).await?;

        let team_id = *invitation.team_id();
        let payload = json!({
            "invitation_id": invitation.id(),
            "email": invitation.email(),
        });
        changes.append_activity(activity(
            ctx,
            team_id,
            "invitation",
            invitation.id(),
            "invitation_declined",
            payload.clone(),
        ));

        Ok(Executed::new(
            invitation,
            event(ctx, EventKind::InvitationRejected, team_id, payload),
            vec![CacheTag::team(&team_id)],
        ))
    }

    fn success_message(&self, _invitation: &Invitation) -> String {
        "Invitation declined".to_string()
    }
}
