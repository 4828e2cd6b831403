//! RemoveMember operation, including ownership hand-over

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

use super::add_member::parse_principal;
use super::follow_ups::{notifications_enabled, notify_principals};
use super::pipeline::{Action, ActionEnv, Executed};
use super::support::{activity, ensure_not_archived, event, load_team, parse_team_id, require_any};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoveMemberInput {
    pub team_id: String,
    /// Principal reference in `kind:id` form
    pub user: String,
    pub transfer_ownership: bool,
    /// Member who takes over the owner role; required with `transfer_ownership`
    pub new_owner_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Removal {
    team_id: TeamId,
    user: PrincipalRef,
    new_owner: Option<PrincipalRef>,
}

/// What RemoveMember returns
#[derive(Debug, Clone)]
pub struct RemovedMember {
    pub membership: Membership,
    /// Set when ownership moved to another member
    pub new_owner: Option<Membership>,
    pub self_removal: bool,
}

/// Removes a membership. An owner-role membership can only go when its
/// owner role is handed to another active member in the same commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveMember;

impl RemoveMember {
    async fn load_membership(
        env: &ActionEnv,
        team: &Team,
        user: &PrincipalRef,
    ) -> Result<Membership, ActionError> {
        env.store
            .find_membership(team.id(), user)
            .await?
            .ok_or_else(|| ActionError::not_found(format!("{} is not a member of this team", user)))
    }

    /// Enforces the owner rule; returns the successor's membership when ownership moves
    async fn successor(
        env: &ActionEnv,
        team: &Team,
        membership: &Membership,
        new_owner: Option<&PrincipalRef>,
    ) -> Result<Option<Membership>, ActionError> {
        match (membership.role().is_owner(), new_owner) {
            (false, None) => Ok(None),
            (false, Some(_)) => Err(ActionError::forbidden_on(
                "transfer_ownership",
                "Only an owner membership can hand over ownership",
            )),
            (true, None) => Err(ActionError::conflict(
                ConflictCode::LastOwner,
                "An owner cannot be removed without transferring ownership to another active member",
            )),
            (true, Some(new_owner)) => match env.store.find_membership(team.id(), new_owner).await? {
                Some(successor) if successor.is_active() => Ok(Some(successor)),
                _ => Err(ActionError::forbidden_on(
                    "new_owner_id",
                    format!("{} is not an active member of this team", new_owner),
                )),
            },
        }
    }
}

#[async_trait]
impl Action for RemoveMember {
    type Input = RemoveMemberInput;
    type Normalized = Removal;
    type Output = RemovedMember;

    fn name(&self) -> &'static str {
        "remove_member"
    }

    fn validate(
        &self,
        input: RemoveMemberInput,
        _ctx: &ActionContext,
        _config: &TeamsConfig,
    ) -> Result<Removal, FieldErrors> {
        let mut errors = FieldErrors::new();
        let team_id = parse_team_id(&input.team_id, "team_id", &mut errors);
        let user = parse_principal(&input.user, "user", &mut errors);

        let new_owner = match (input.transfer_ownership, input.new_owner_id.as_deref()) {
            (true, Some(raw)) => parse_principal(raw, "new_owner_id", &mut errors),
            (true, None) => {
                errors.add("new_owner_id", "Required when transferring ownership");
                None
            }
            (false, Some(_)) => {
                errors.add("transfer_ownership", "Must be set when naming a new owner");
                None
            }
            (false, None) => None,
        };
        if new_owner.is_some() && new_owner == user {
            errors.add("new_owner_id", "Cannot transfer ownership to the member being removed");
        }

        match (team_id, user) {
            (Some(team_id), Some(user)) if errors.is_empty() => Ok(Removal {
                team_id,
                user,
                new_owner,
            }),
            _ => Err(errors),
        }
    }

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &Removal,
    ) -> Result<(), ActionError> {
        let team = load_team(env, ctx, &input.team_id).await?;
        ensure_not_archived(&team, "team_id")?;

        if input.user != ctx.actor {
            require_any(
                env,
                ctx,
                &team,
                &[cap::REMOVE_TEAM_MEMBER, cap::MANAGE_TEAM_MEMBERS],
            )
            .await?;
        }

        let membership = Self::load_membership(env, &team, &input.user).await?;
        Self::successor(env, &team, &membership, input.new_owner.as_ref()).await?;
        Ok(())
    }

    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &Removal,
        changes: &mut ChangeSet,
    ) -> Result<Executed<RemovedMember>, ActionError> {
        let mut team = load_team(env, ctx, &input.team_id).await?;
        let mut membership = Self::load_membership(env, &team, &input.user).await?;
        let successor = Self::successor(env, &team, &membership, input.new_owner.as_ref()).await?;

        let previous_role = membership.role().clone();
        membership.remove(ctx.now);
        changes
            .update_membership(membership.clone())
            .adjust_members(*team.id(), -1, None);

        let mut tags = vec![CacheTag::team(team.id()), CacheTag::user(&input.user)];
        let new_owner = match successor {
            Some(mut successor) => {
                successor.change_role(
                    TeamRole::Owner,
                    env.permissions.roles().names_for(&TeamRole::Owner),
                    ctx.now,
                );
                changes.update_membership(successor.clone());
                if team.is_owned_by(&input.user) {
                    team.set_owner(Some(successor.user().clone()), ctx.now);
                    changes.update_team(team.clone());
                }
                tags.push(CacheTag::user(successor.user()));
                Some(successor)
            }
            None => None,
        };

        let self_removal = input.user == ctx.actor;
        let payload = json!({
            "membership_id": membership.id(),
            "user": input.user,
            "role": previous_role,
            "removed_by": ctx.actor,
            "new_owner": new_owner.as_ref().map(|m| m.user()),
        });
        changes.append_activity(activity(
            ctx,
            *team.id(),
            "membership",
            membership.id(),
            if self_removal { "member_left" } else { "member_removed" },
            payload.clone(),
        ));

        let kind = if self_removal {
            EventKind::MemberLeft
        } else {
            EventKind::MemberRemoved
        };

        Ok(Executed::new(
            RemovedMember {
                membership,
                new_owner,
                self_removal,
            },
            event(ctx, kind, *team.id(), payload),
            tags,
        ))
    }

    fn after(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        _input: &Removal,
        removed: &RemovedMember,
    ) -> Vec<SubAction> {
        if !notifications_enabled(env) {
            return Vec::new();
        }

        let team_id = *removed.membership.team_id();
        let mut sub_actions = Vec::new();
        if !removed.self_removal {
            sub_actions.push(notify_principals(
                env,
                "notify_removed_member",
                NotificationKind::MemberRemoved,
                team_id,
                vec![removed.membership.user().clone()],
                json!({ "removed_by": ctx.actor }),
            ));
        }
        if let Some(new_owner) = &removed.new_owner {
            sub_actions.push(notify_principals(
                env,
                "notify_new_owner",
                NotificationKind::OwnershipTransferred,
                team_id,
                vec![new_owner.user().clone()],
                json!({ "previous_owner": removed.membership.user() }),
            ));
        }
        sub_actions
    }

    fn success_message(&self, removed: &RemovedMember) -> String {
        format!("{} removed from the team", removed.membership.user())
    }
}
