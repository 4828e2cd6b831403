//! UpdateTeam operation

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::TeamsConfig;
use crate::domain::action::{ActionContext, ActionError, FieldErrors, SubAction};
use crate::domain::cache::CacheTag;
use crate::domain::event::EventKind;
use crate::domain::ids::TeamId;
use crate::domain::notification::NotificationKind;
use crate::domain::permission::capabilities as cap;
use crate::domain::store::ChangeSet;
use crate::domain::team::{validate_team_description, validate_team_name, Team, TeamType};

use super::follow_ups::{notifications_enabled, notify_team_members};
use super::pipeline::{Action, ActionEnv, Executed};
use super::support::{activity, ensure_not_archived, event, load_team, parse_team_id, require_any};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTeamInput {
    pub team_id: String,
    pub name: Option<String>,
    /// An empty string clears the description
    pub description: Option<String>,
    pub team_type: Option<String>,
    /// Deep-merged into the existing settings
    pub settings: Option<Map<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct TeamUpdate {
    team_id: TeamId,
    name: Option<String>,
    description: Option<Option<String>>,
    team_type: Option<TeamType>,
    settings: Option<Map<String, Value>>,
}

/// Edits a team's descriptive fields and settings; a new name regenerates the slug
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateTeam;

#[async_trait]
impl Action for UpdateTeam {
    type Input = UpdateTeamInput;
    type Normalized = TeamUpdate;
    type Output = Team;

    fn name(&self) -> &'static str {
        "update_team"
    }

    fn validate(
        &self,
        input: UpdateTeamInput,
        _ctx: &ActionContext,
        _config: &TeamsConfig,
    ) -> Result<TeamUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();
        let team_id = parse_team_id(&input.team_id, "team_id", &mut errors);

        let name = input.name.map(|n| n.trim().to_string());
        if let Some(Err(e)) = name.as_deref().map(validate_team_name) {
            errors.add("name", e.to_string());
        }

        let description = input.description.map(|d| {
            let d = d.trim().to_string();
            (!d.is_empty()).then_some(d)
        });
        if let Some(Some(Err(e))) = description
            .as_ref()
            .map(|d| d.as_deref().map(validate_team_description))
        {
            errors.add("description", e.to_string());
        }

        let team_type = match input.team_type.as_deref().map(str::parse::<TeamType>) {
            None => None,
            Some(Ok(team_type)) => Some(team_type),
            Some(Err(e)) => {
                errors.add("team_type", e.to_string());
                None
            }
        };

        let empty = name.is_none()
            && description.is_none()
            && input.team_type.is_none()
            && input.settings.is_none();
        if empty {
            errors.add(FieldErrors::GENERAL, "Nothing to update");
        }

        match team_id {
            Some(team_id) if errors.is_empty() => Ok(TeamUpdate {
                team_id,
                name,
                description,
                team_type,
                settings: input.settings,
            }),
            _ => Err(errors),
        }
    }

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &TeamUpdate,
    ) -> Result<(), ActionError> {
        let team = load_team(env, ctx, &input.team_id).await?;
        ensure_not_archived(&team, "team_id")?;
        require_any(env, ctx, &team, &[cap::UPDATE_TEAM, cap::MANAGE_TEAM]).await?;
        Ok(())
    }

    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &TeamUpdate,
        changes: &mut ChangeSet,
    ) -> Result<Executed<Team>, ActionError> {
        let mut team = load_team(env, ctx, &input.team_id).await?;
        ensure_not_archived(&team, "team_id")?;

        let mut changed = Vec::new();
        if let Some(name) = &input.name {
            if name != team.name() {
                team.rename(name, ctx.now)
                    .map_err(|e| FieldErrors::single("name", e.to_string()))?;
                changed.push("name");
            }
        }
        if let Some(description) = &input.description {
            team.set_description(description.clone(), ctx.now);
            changed.push("description");
        }
        if let Some(team_type) = input.team_type {
            team.set_type(team_type, ctx.now);
            changed.push("team_type");
        }
        if let Some(settings) = &input.settings {
            team.merge_settings(settings.clone(), ctx.now);
            changed.push("settings");
        }
        team.record_activity(ctx.now);

        let payload = json!({
            "changes": changed,
            "name": team.name(),
            "slug": team.slug(),
        });

        changes.update_team(team.clone()).append_activity(activity(
            ctx,
            *team.id(),
            "team",
            team.id(),
            "updated",
            payload.clone(),
        ));

        Ok(Executed::new(
            team.clone(),
            event(ctx, EventKind::TeamUpdated, *team.id(), payload),
            vec![CacheTag::team(team.id())],
        ))
    }

    fn after(
        &self,
        env: &ActionEnv,
        _ctx: &ActionContext,
        _input: &TeamUpdate,
        team: &Team,
    ) -> Vec<SubAction> {
        if !notifications_enabled(env) {
            return Vec::new();
        }

        vec![notify_team_members(
            env,
            NotificationKind::TeamUpdated,
            *team.id(),
            json!({ "name": team.name(), "slug": team.slug() }),
        )]
    }

    fn success_message(&self, team: &Team) -> String {
        format!("Team '{}' updated", team.name())
    }
}
