//! InviteMember operation

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::config::TeamsConfig;
use crate::domain::action::{ActionContext, ActionError, ConflictCode, FieldErrors, SubAction};
use crate::domain::cache::CacheTag;
use crate::domain::event::EventKind;
use crate::domain::ids::TeamId;
use crate::domain::invitation::{normalize_email, validate_email, validate_message, Invitation};
use crate::domain::permission::{capabilities as cap, TeamRole};
use crate::domain::store::ChangeSet;
use crate::infrastructure::invitation::InvitationRequest;

use super::follow_ups::{notifications_enabled, schedule_invitation_reminder, send_invitation_email};
use super::pipeline::{Action, ActionEnv, Executed};
use super::support::{activity, ensure_not_archived, event, load_team, parse_team_id, require_any};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InviteMemberInput {
    pub team_id: String,
    pub email: String,
    /// Defaults to the configured default role
    pub role: Option<String>,
    /// Empty or omitted means the role's defaults
    pub permissions: Option<Vec<String>>,
    pub message: Option<String>,
    /// Explicit expiry; must be in the future
    pub expires_at: Option<DateTime<Utc>>,
    /// Lifetime in seconds from now, used when `expires_at` is absent
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct InvitationDraft {
    team_id: TeamId,
    request: InvitationRequest,
}

/// An invitation together with the team name its email refers to
#[derive(Debug, Clone)]
pub struct IssuedInvitation {
    pub invitation: Invitation,
    pub team_name: String,
}

/// Email then reminder; the reminder only goes out if the email did
pub(crate) fn delivery_sub_actions(env: &ActionEnv, issued: &IssuedInvitation) -> Vec<SubAction> {
    if !notifications_enabled(env) {
        return Vec::new();
    }

    let mut sub_actions = vec![send_invitation_email(env, &issued.invitation, &issued.team_name)];
    sub_actions.extend(schedule_invitation_reminder(
        env,
        &issued.invitation,
        &issued.team_name,
    ));
    sub_actions
}

/// Offers team membership to an email address
#[derive(Debug, Clone, Copy, Default)]
pub struct InviteMember;

#[async_trait]
impl Action for InviteMember {
    type Input = InviteMemberInput;
    type Normalized = InvitationDraft;
    type Output = IssuedInvitation;

    fn name(&self) -> &'static str {
        "invite_member"
    }

    fn validate(
        &self,
        input: InviteMemberInput,
        ctx: &ActionContext,
        config: &TeamsConfig,
    ) -> Result<InvitationDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        let team_id = parse_team_id(&input.team_id, "team_id", &mut errors);

        let email = normalize_email(&input.email);
        if let Err(e) = validate_email(&email) {
            errors.add("email", e.to_string());
        }

        let role = input
            .role
            .as_deref()
            .map(|r| TeamRole::from(r.trim()))
            .unwrap_or_else(|| config.default_role());
        if !config.is_invitable(&role) {
            errors.add("role", format!("Role '{}' cannot be granted by invitation", role));
        }

        let message = input
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        if let Some(Err(e)) = message.as_deref().map(validate_message) {
            errors.add("message", e.to_string());
        }

        let expires_at = match (input.expires_at, input.ttl_seconds) {
            (Some(at), _) if at <= ctx.now => {
                errors.add("expires_at", "Must be in the future");
                at
            }
            (Some(at), _) => at,
            (None, Some(seconds)) => ctx.now + Duration::seconds(seconds),
            (None, None) => ctx.now + config.invitation_ttl(),
        };

        let permissions = input
            .permissions
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        match team_id {
            Some(team_id) if errors.is_empty() => Ok(InvitationDraft {
                team_id,
                request: InvitationRequest {
                    email,
                    role,
                    permissions,
                    message,
                    expires_at,
                },
            }),
            _ => Err(errors),
        }
    }

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &InvitationDraft,
    ) -> Result<(), ActionError> {
        let team = load_team(env, ctx, &input.team_id).await?;
        ensure_not_archived(&team, "team_id")?;
        require_any(
            env,
            ctx,
            &team,
            &[cap::INVITE_TEAM_MEMBER, cap::MANAGE_TEAM_MEMBERS],
        )
        .await?;

        if let Some(profile) = env.directory.find_by_email(&input.request.email).await? {
            if env
                .store
                .find_membership(team.id(), &profile.reference)
                .await?
                .is_some()
            {
                return Err(ActionError::conflict(
                    ConflictCode::AlreadyMember,
                    format!("{} is already a member of this team", input.request.email),
                ));
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &InvitationDraft,
        changes: &mut ChangeSet,
    ) -> Result<Executed<IssuedInvitation>, ActionError> {
        let team = load_team(env, ctx, &input.team_id).await?;
        let invitation = env
            .invitations
            .create(&team, input.request.clone(), &ctx.actor, ctx.now, changes)
            .await?;

        let payload = json!({
            "invitation_id": invitation.id(),
            "email": invitation.email(),
            "role": invitation.role(),
            "expires_at": invitation.expires_at(),
            "resent": false,
        });
        changes.append_activity(activity(
            ctx,
            *team.id(),
            "invitation",
            invitation.id(),
            "invitation_sent",
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
        _input: &InvitationDraft,
        issued: &IssuedInvitation,
    ) -> Vec<SubAction> {
        delivery_sub_actions(env, issued)
    }

    fn success_message(&self, issued: &IssuedInvitation) -> String {
        format!("Invitation sent to {}", issued.invitation.email())
    }
}
