//! CreateTeam operation

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::TeamsConfig;
use crate::domain::action::{ActionContext, ActionError, FieldErrors, SubAction};
use crate::domain::cache::CacheTag;
use crate::domain::event::EventKind;
use crate::domain::ids::TeamId;
use crate::domain::membership::Membership;
use crate::domain::notification::NotificationKind;
use crate::domain::permission::TeamRole;
use crate::domain::principal::PrincipalRef;
use crate::domain::store::ChangeSet;
use crate::domain::team::{validate_team_description, validate_team_name, Team, TeamType};

use super::follow_ups::{initialize_team_defaults, notifications_enabled, notify_principals};
use super::pipeline::{Action, ActionEnv, Executed};
use super::support::{activity, event};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTeamInput {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `project`
    pub team_type: Option<String>,
    /// Configured defaults are filled in underneath after commit
    pub settings: Option<Map<String, Value>>,
    /// Owning principal; the creator when omitted
    pub owner: Option<PrincipalRef>,
}

#[derive(Debug, Clone)]
pub struct NewTeam {
    name: String,
    description: Option<String>,
    team_type: TeamType,
    settings: Map<String, Value>,
    owner: Option<PrincipalRef>,
}

/// Creates a team in `draft` with the creator as its first owner member
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateTeam;

#[async_trait]
impl Action for CreateTeam {
    type Input = CreateTeamInput;
    type Normalized = NewTeam;
    type Output = Team;

    fn name(&self) -> &'static str {
        "create_team"
    }

    fn validate(
        &self,
        input: CreateTeamInput,
        _ctx: &ActionContext,
        _config: &TeamsConfig,
    ) -> Result<NewTeam, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = input.name.trim().to_string();
        if let Err(e) = validate_team_name(&name) {
            errors.add("name", e.to_string());
        }

        let description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(Err(e)) = description.as_deref().map(validate_team_description) {
            errors.add("description", e.to_string());
        }

        let team_type = match input.team_type.as_deref().map(str::parse::<TeamType>) {
            None => TeamType::Project,
            Some(Ok(team_type)) => team_type,
            Some(Err(e)) => {
                errors.add("team_type", e.to_string());
                TeamType::Project
            }
        };

        errors.into_result(NewTeam {
            name,
            description,
            team_type,
            settings: input.settings.unwrap_or_default(),
            owner: input.owner,
        })
    }

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &NewTeam,
    ) -> Result<(), ActionError> {
        if env.config.features.tenancy && ctx.tenant.is_none() {
            return Err(ActionError::forbidden("A tenant scope is required to create teams"));
        }

        if let Some(owner) = input.owner.as_ref().filter(|owner| **owner != ctx.actor) {
            if env.directory.lookup(owner).await?.is_none() {
                return Err(ActionError::not_found(format!("Owner '{}' not found", owner)));
            }
        }

        Ok(())
    }

    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &NewTeam,
        changes: &mut ChangeSet,
    ) -> Result<Executed<Team>, ActionError> {
        let owner = input.owner.clone().unwrap_or_else(|| ctx.actor.clone());

        let mut team = Team::new(TeamId::generate(), &input.name, input.team_type, ctx.now)
            .map_err(|e| FieldErrors::single("name", e.to_string()))?
            .with_owner(owner.clone())
            .with_settings(input.settings.clone());
        if let Some(description) = &input.description {
            team = team.with_description(description);
        }
        if let Some(tenant) = &ctx.tenant {
            team = team.with_tenant(tenant.clone());
        }
        team.record_activity(ctx.now);
        // The creator's membership lands in the same commit as the row itself.
        team.set_members_count(1);

        let membership = Membership::new(
            *team.id(),
            ctx.actor.clone(),
            TeamRole::Owner,
            env.permissions.roles().names_for(&TeamRole::Owner),
            ctx.now,
        )
        .with_tenant(ctx.tenant.clone());

        let payload = json!({
            "name": team.name(),
            "slug": team.slug(),
            "team_type": team.team_type(),
            "owner": owner,
        });

        changes
            .insert_team(team.clone())
            .insert_membership(membership)
            .append_activity(activity(
                ctx,
                *team.id(),
                "team",
                team.id(),
                "created",
                payload.clone(),
            ));

        let mut tags = vec![CacheTag::team(team.id()), CacheTag::user(&ctx.actor)];
        if owner != ctx.actor {
            tags.push(CacheTag::user(&owner));
        }

        Ok(Executed::new(
            team.clone(),
            event(ctx, EventKind::TeamCreated, *team.id(), payload),
            tags,
        ))
    }

    fn after(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        _input: &NewTeam,
        team: &Team,
    ) -> Vec<SubAction> {
        let mut sub_actions = vec![initialize_team_defaults(env, *team.id(), ctx.now)];
        if notifications_enabled(env) {
            sub_actions.push(notify_principals(
                env,
                "notify_creator",
                NotificationKind::TeamCreated,
                *team.id(),
                vec![ctx.actor.clone()],
                json!({ "name": team.name(), "slug": team.slug() }),
            ));
        }
        sub_actions
    }

    fn success_message(&self, team: &Team) -> String {
        format!("Team '{}' created", team.name())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::action::{ActionOutcome, ConflictCode};
    use crate::domain::cache::{Cache, MockCache};
    use crate::domain::store::TeamStore;
    use crate::domain::team::TeamStatus;
    use crate::infrastructure::testing::TestEngine;

    fn input(name: &str) -> CreateTeamInput {
        CreateTeamInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_team_in_draft_with_owner_membership() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");

        let team = engine
            .pipeline()
            .run(&CreateTeam, alice.clone(), input("  Platform Team "))
            .await
            .into_result()
            .unwrap();

        assert_eq!(team.name(), "Platform Team");
        assert_eq!(team.slug(), "platform-team");
        assert_eq!(team.status(), TeamStatus::Draft);
        assert!(team.is_owned_by(&alice.principal));

        let stored = engine.reload(&team).await;
        assert_eq!(stored.members_count(), 1);
        assert_eq!(stored.settings()["visibility"], "private");

        let membership = engine
            .store()
            .find_membership(team.id(), &alice.principal)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(membership.role(), &TeamRole::Owner);

        assert_eq!(engine.event_kinds(), vec![EventKind::TeamCreated]);
        assert_eq!(engine.store().list_activity(team.id()).await.unwrap().len(), 1);
        assert_eq!(engine.notifications()[0].kind, NotificationKind::TeamCreated);
    }

    #[tokio::test]
    async fn test_settings_merge_over_defaults() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        let mut settings = Map::new();
        settings.insert("limits".into(), json!({ "max_members": 5 }));

        let team = engine
            .pipeline()
            .run(
                &CreateTeam,
                alice,
                CreateTeamInput {
                    settings: Some(settings),
                    team_type: Some("department".into()),
                    ..input("Finance")
                },
            )
            .await
            .into_result()
            .unwrap();

        let stored = engine.reload(&team).await;
        assert_eq!(stored.member_ceiling(100), 5);
        assert_eq!(stored.settings()["limits"]["max_files"], 1000);
        assert_eq!(stored.team_type(), TeamType::Department);
    }

    #[tokio::test]
    async fn test_defaults_failure_does_not_undo_creation() {
        let cache = Arc::new(MockCache::new().with_error("redis down"));
        let engine = TestEngine::builder().cache(cache as Arc<dyn Cache>).build().await;
        let alice = engine.user("alice");

        let outcome = engine.pipeline().run(&CreateTeam, alice, input("Platform")).await;

        assert!(outcome.is_success());
        let failed: Vec<_> = outcome
            .warnings()
            .iter()
            .map(|w| (w.sub_action.as_str(), w.fatal))
            .collect();
        assert_eq!(
            failed,
            vec![("invalidate_cache", false), ("initialize_team_defaults", false)]
        );

        let stored = engine.reload(outcome.data().unwrap()).await;
        assert_eq!(stored.settings()["visibility"], "private");
        assert_eq!(engine.notifications()[0].kind, NotificationKind::TeamCreated);
    }

    #[tokio::test]
    async fn test_validation_reports_each_field() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");

        let outcome = engine
            .pipeline()
            .run(
                &CreateTeam,
                alice,
                CreateTeamInput {
                    name: "ab".into(),
                    description: Some("x".repeat(1001)),
                    team_type: Some("guild".into()),
                    ..Default::default()
                },
            )
            .await;

        match outcome {
            ActionOutcome::Failure { error, errors } => {
                assert_eq!(error.kind(), "validation_failed");
                assert!(errors.get("name").is_some());
                assert!(errors.get("description").is_some());
                assert!(errors.get("team_type").is_some());
            }
            ActionOutcome::Success { .. } => panic!("expected validation failure"),
        }
        assert!(engine.events().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        engine.draft_team(&alice, "Platform").await;

        let outcome = engine.pipeline().run(&CreateTeam, alice, input("platform")).await;

        assert_eq!(
            outcome.error().and_then(ActionError::conflict_code),
            Some(ConflictCode::SlugTaken)
        );
    }

    #[tokio::test]
    async fn test_tenancy_requires_scope() {
        let mut config = TeamsConfig::default();
        config.features.tenancy = true;
        let engine = TestEngine::builder().config(config).build().await;
        let alice = engine.user("alice");

        let outcome = engine.pipeline().run(&CreateTeam, alice.clone(), input("Scoped")).await;
        assert_eq!(outcome.error().map(ActionError::kind), Some("forbidden"));

        let scoped = alice.with_tenant(crate::domain::ids::TenantId::new("acme"));
        let team = engine
            .pipeline()
            .run(&CreateTeam, scoped, input("Scoped"))
            .await
            .into_result()
            .unwrap();
        assert_eq!(team.tenant().map(|t| t.as_str()), Some("acme"));
    }

    #[tokio::test]
    async fn test_unknown_owner_not_found() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");

        let outcome = engine
            .pipeline()
            .run(
                &CreateTeam,
                alice,
                CreateTeamInput {
                    owner: Some(PrincipalRef::new("organization", "ghost")),
                    ..input("Orphan")
                },
            )
            .await;

        assert_eq!(outcome.error().map(ActionError::kind), Some("not_found"));
    }
}
