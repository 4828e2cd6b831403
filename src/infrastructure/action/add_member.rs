//! AddMember operation

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::TeamsConfig;
use crate::domain::action::{ActionContext, ActionError, ConflictCode, FieldErrors, SubAction};
use crate::domain::cache::CacheTag;
use crate::domain::event::EventKind;
use crate::domain::ids::TeamId;
use crate::domain::membership::Membership;
use crate::domain::notification::NotificationKind;
use crate::domain::permission::{capabilities as cap, TeamRole};
use crate::domain::principal::PrincipalRef;
use crate::domain::store::ChangeSet;
use crate::domain::team::Team;

use super::follow_ups::{notifications_enabled, notify_principals};
use super::pipeline::{Action, ActionEnv, Executed};
use super::support::{activity, ensure_not_archived, event, load_team, parse_team_id, require_any};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddMemberInput {
    pub team_id: String,
    /// Principal reference in `kind:id` form
    pub user: String,
    /// Defaults to the configured default role
    pub role: Option<String>,
    /// Overrides the role's default capabilities
    pub permissions: Option<Vec<String>>,
    /// Defaults to `true`
    pub send_notification: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewMember {
    team_id: TeamId,
    user: PrincipalRef,
    role: TeamRole,
    permissions: Vec<String>,
    notify: bool,
}

pub(crate) fn parse_principal(raw: &str, field: &str, errors: &mut FieldErrors) -> Option<PrincipalRef> {
    let parsed = PrincipalRef::parse(raw.trim());
    if parsed.is_none() {
        errors.add(field, format!("'{}' is not a principal reference (expected kind:id)", raw));
    }
    parsed
}

fn member_limit(team: &Team, config: &TeamsConfig) -> Result<u32, ActionError> {
    let ceiling = team.member_ceiling(config.limits.max_members_per_team);
    if team.members_count() >= ceiling {
        return Err(ActionError::conflict(
            ConflictCode::MemberLimitReached,
            format!("Team has reached its limit of {} members", ceiling),
        ));
    }
    Ok(ceiling)
}

/// Adds a principal to a team directly, without an invitation
#[derive(Debug, Clone, Copy, Default)]
pub struct AddMember;

#[async_trait]
impl Action for AddMember {
    type Input = AddMemberInput;
    type Normalized = NewMember;
    type Output = Membership;

    fn name(&self) -> &'static str {
        "add_member"
    }

    fn validate(
        &self,
        input: AddMemberInput,
        _ctx: &ActionContext,
        config: &TeamsConfig,
    ) -> Result<NewMember, FieldErrors> {
        let mut errors = FieldErrors::new();
        let team_id = parse_team_id(&input.team_id, "team_id", &mut errors);
        let user = parse_principal(&input.user, "user", &mut errors);

        let role = input
            .role
            .as_deref()
            .map(|r| TeamRole::from(r.trim()))
            .unwrap_or_else(|| config.default_role());
        if !config.roles.is_known(&role) {
            errors.add("role", format!("Unknown role '{}'", role));
        }

        let permissions = match input.permissions {
            Some(permissions) => permissions
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            None => config.roles.names_for(&role),
        };

        match (team_id, user) {
            (Some(team_id), Some(user)) if errors.is_empty() => Ok(NewMember {
                team_id,
                user,
                role,
                permissions,
                notify: input.send_notification.unwrap_or(true),
            }),
            _ => Err(errors),
        }
    }

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &NewMember,
    ) -> Result<(), ActionError> {
        let team = load_team(env, ctx, &input.team_id).await?;
        ensure_not_archived(&team, "team_id")?;
        let capabilities =
            require_any(env, ctx, &team, &[cap::ADD_TEAM_MEMBER, cap::MANAGE_TEAM_MEMBERS]).await?;
        if input.role.is_owner() && !capabilities.is_everything() {
            return Err(ActionError::forbidden("Only an owner can add another owner"));
        }

        if env.directory.lookup(&input.user).await?.is_none() {
            return Err(ActionError::not_found(format!("User '{}' not found", input.user)));
        }
        if env.store.find_membership(team.id(), &input.user).await?.is_some() {
            return Err(ActionError::conflict(
                ConflictCode::AlreadyMember,
                format!("{} is already a member of this team", input.user),
            ));
        }
        member_limit(&team, &env.config)?;
        Ok(())
    }

    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &NewMember,
        changes: &mut ChangeSet,
    ) -> Result<Executed<Membership>, ActionError> {
        let team = load_team(env, ctx, &input.team_id).await?;
        let ceiling = member_limit(&team, &env.config)?;

        let membership = Membership::new(
            *team.id(),
            input.user.clone(),
            input.role.clone(),
            input.permissions.clone(),
            ctx.now,
        )
        .with_tenant(team.tenant().cloned())
        .with_invited_by(ctx.actor.clone());

        let payload = json!({
            "membership_id": membership.id(),
            "user": input.user,
            "role": input.role,
            "added_by": ctx.actor,
        });

        // The unique (team, user) slot and the ceiling are both enforced again
        // by the store at commit.
        changes
            .insert_membership(membership.clone())
            .adjust_members(*team.id(), 1, Some(ceiling))
            .append_activity(activity(
                ctx,
                *team.id(),
                "membership",
                membership.id(),
                "member_added",
                payload.clone(),
            ));

        Ok(Executed::new(
            membership,
            event(ctx, EventKind::MemberJoined, *team.id(), payload),
            vec![CacheTag::team(team.id()), CacheTag::user(&input.user)],
        ))
    }

    fn after(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &NewMember,
        membership: &Membership,
    ) -> Vec<SubAction> {
        if !input.notify || !notifications_enabled(env) {
            return Vec::new();
        }

        vec![notify_principals(
            env,
            "notify_member",
            NotificationKind::MemberAdded,
            *membership.team_id(),
            vec![membership.user().clone()],
            json!({ "role": membership.role(), "added_by": ctx.actor }),
        )]
    }

    fn success_message(&self, membership: &Membership) -> String {
        format!("{} added as {}", membership.user(), membership.role())
    }
}
