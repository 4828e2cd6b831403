//! Helpers shared by the concrete actions

use serde_json::Value;

use crate::domain::action::{ActionContext, ActionError, FieldErrors};
use crate::domain::activity::ActivityRecord;
use crate::domain::event::{DomainEvent, EventKind};
use crate::domain::ids::TeamId;
use crate::domain::permission::CapabilitySet;
use crate::domain::team::{Team, TeamStatus};

use super::pipeline::ActionEnv;

/// Parses an id field, attaching the failure to `field`
pub(crate) fn parse_team_id(raw: &str, field: &str, errors: &mut FieldErrors) -> Option<TeamId> {
    match TeamId::parse(raw.trim()) {
        Ok(id) => Some(id),
        Err(e) => {
            errors.add(field, e.to_string());
            None
        }
    }
}

/// Fresh read of a team visible to the caller.
///
/// With tenancy enabled a team from another tenant is reported as missing.
pub(crate) async fn load_team(
    env: &ActionEnv,
    ctx: &ActionContext,
    id: &TeamId,
) -> Result<Team, ActionError> {
    let team = env
        .store
        .find_team(id)
        .await?
        .filter(|team| !team.is_deleted())
        .ok_or_else(|| ActionError::not_found(format!("Team '{}' not found", id)))?;

    if env.config.features.tenancy && ctx.tenant.is_some() && team.tenant() != ctx.tenant.as_ref() {
        return Err(ActionError::not_found(format!("Team '{}' not found", id)));
    }

    Ok(team)
}

/// Resolves the actor's capabilities and requires at least one of `any_of`
pub(crate) async fn require_any(
    env: &ActionEnv,
    ctx: &ActionContext,
    team: &Team,
    any_of: &[&str],
) -> Result<CapabilitySet, ActionError> {
    let capabilities = env.permissions.resolve_for_team(team, &ctx.actor).await?;
    if capabilities.allows_any(any_of) {
        Ok(capabilities)
    } else {
        Err(ActionError::forbidden(format!(
            "Requires one of: {}",
            any_of.join(", ")
        )))
    }
}

/// Archived teams accept no membership or settings changes
pub(crate) fn ensure_not_archived(team: &Team, field: &str) -> Result<(), ActionError> {
    if team.status() == TeamStatus::Archived {
        Err(ActionError::forbidden_on(field, "Team is archived"))
    } else {
        Ok(())
    }
}

pub(crate) fn event(ctx: &ActionContext, kind: EventKind, team_id: TeamId, payload: Value) -> DomainEvent {
    DomainEvent::new(kind, team_id, ctx.actor.clone(), payload, ctx.now)
}

pub(crate) fn activity(
    ctx: &ActionContext,
    team_id: TeamId,
    subject_type: &str,
    subject_id: impl ToString,
    action: &str,
    properties: Value,
) -> ActivityRecord {
    ActivityRecord::new(
        team_id,
        subject_type,
        subject_id,
        ctx.actor.clone(),
        action,
        properties,
        ctx.now,
    )
}
