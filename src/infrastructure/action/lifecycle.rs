//! Lifecycle transitions: activate, suspend, resume, archive, restore
//!
//! One action type parameterized by `TransitionName`. The state machine is
//! consulted twice: once in authorize against a fresh read, and again when
//! the transition is applied in execute, so a state change that slipped in
//! between is still rejected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::TeamsConfig;
use crate::domain::action::{ActionContext, ActionError, ConflictCode, FieldErrors, SubAction};
use crate::domain::cache::CacheTag;
use crate::domain::event::EventKind;
use crate::domain::ids::TeamId;
use crate::domain::lifecycle::{TransitionError, TransitionName};
use crate::domain::membership::MembershipStatus;
use crate::domain::notification::NotificationKind;
use crate::domain::store::ChangeSet;
use crate::domain::team::Team;

use super::follow_ups::{notifications_enabled, notify_team_members};
use super::pipeline::{Action, ActionEnv, Executed};
use super::support::{activity, event, load_team, parse_team_id};

const MAX_REASON_LENGTH: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionTeamInput {
    pub team_id: String,
    pub reason: Option<String>,
    /// Archive only; `false` also archives every active membership. Defaults to `true`.
    pub preserve_data: Option<bool>,
    /// Suspend only; must lie in the future
    pub suspension_until: Option<DateTime<Utc>>,
}

impl TransitionTeamInput {
    pub fn new(team_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            ..Default::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransitionRequest {
    team_id: TeamId,
    reason: Option<String>,
    preserve_data: bool,
    suspension_until: Option<DateTime<Utc>>,
}

/// Moves a team along one named edge of the lifecycle table
#[derive(Debug, Clone, Copy)]
pub struct TransitionTeam {
    transition: TransitionName,
}

impl TransitionTeam {
    pub fn new(transition: TransitionName) -> Self {
        Self { transition }
    }

    pub fn activate() -> Self {
        Self::new(TransitionName::Activate)
    }

    pub fn suspend() -> Self {
        Self::new(TransitionName::Suspend)
    }

    pub fn resume() -> Self {
        Self::new(TransitionName::Resume)
    }

    pub fn archive() -> Self {
        Self::new(TransitionName::Archive)
    }

    pub fn restore() -> Self {
        Self::new(TransitionName::Restore)
    }

    pub fn transition(&self) -> TransitionName {
        self.transition
    }

    fn event_kind(&self) -> EventKind {
        match self.transition {
            TransitionName::Activate | TransitionName::Resume => EventKind::TeamActivated,
            TransitionName::Suspend => EventKind::TeamSuspended,
            TransitionName::Archive => EventKind::TeamArchived,
            TransitionName::Restore => EventKind::TeamRestored,
        }
    }
}

fn transition_error(error: TransitionError) -> ActionError {
    match error {
        TransitionError::InvalidTransition { .. } => {
            ActionError::conflict(ConflictCode::InvalidTransition, error.to_string())
        }
        TransitionError::Forbidden { .. } => ActionError::forbidden(error.to_string()),
    }
}

#[async_trait]
impl Action for TransitionTeam {
    type Input = TransitionTeamInput;
    type Normalized = TransitionRequest;
    type Output = Team;

    fn name(&self) -> &'static str {
        match self.transition {
            TransitionName::Activate => "activate_team",
            TransitionName::Suspend => "suspend_team",
            TransitionName::Resume => "resume_team",
            TransitionName::Archive => "archive_team",
            TransitionName::Restore => "restore_team",
        }
    }

    fn validate(
        &self,
        input: TransitionTeamInput,
        ctx: &ActionContext,
        _config: &TeamsConfig,
    ) -> Result<TransitionRequest, FieldErrors> {
        let mut errors = FieldErrors::new();
        let team_id = parse_team_id(&input.team_id, "team_id", &mut errors);

        let reason = input
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if reason.as_ref().is_some_and(|r| r.len() > MAX_REASON_LENGTH) {
            errors.add(
                "reason",
                format!("Reason cannot exceed {} characters", MAX_REASON_LENGTH),
            );
        }

        if input.preserve_data.is_some() && self.transition != TransitionName::Archive {
            errors.add("preserve_data", "Only applies when archiving");
        }

        if let Some(until) = input.suspension_until {
            if self.transition != TransitionName::Suspend {
                errors.add("suspension_until", "Only applies when suspending");
            } else if until <= ctx.now {
                errors.add("suspension_until", "Must be in the future");
            }
        }

        match team_id {
            Some(team_id) if errors.is_empty() => Ok(TransitionRequest {
                team_id,
                reason,
                preserve_data: input.preserve_data.unwrap_or(true),
                suspension_until: input.suspension_until,
            }),
            _ => Err(errors),
        }
    }

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &TransitionRequest,
    ) -> Result<(), ActionError> {
        if !env.config.features.workflows {
            return Err(ActionError::forbidden("Team lifecycle workflows are disabled"));
        }

        let team = load_team(env, ctx, &input.team_id).await?;
        let capabilities = env.permissions.resolve_for_team(&team, &ctx.actor).await?;
        env.state_machine
            .evaluate(self.transition, team.status(), &capabilities)
            .map_err(transition_error)?;
        Ok(())
    }

    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &TransitionRequest,
        changes: &mut ChangeSet,
    ) -> Result<Executed<Team>, ActionError> {
        let mut team = load_team(env, ctx, &input.team_id).await?;
        let capabilities = env.permissions.resolve_for_team(&team, &ctx.actor).await?;

        let mut details = Map::new();
        match self.transition {
            TransitionName::Archive => {
                details.insert("preserve_data".into(), Value::from(input.preserve_data));
            }
            TransitionName::Suspend => {
                if let Some(until) = input.suspension_until {
                    details.insert("suspension_until".into(), Value::from(until.to_rfc3339()));
                }
            }
            _ => {}
        }

        let previous = env
            .state_machine
            .apply(
                &mut team,
                self.transition,
                &capabilities,
                &ctx.actor,
                input.reason.as_deref(),
                details.clone(),
                ctx.now,
            )
            .map_err(transition_error)?;
        changes.update_team(team.clone());

        let mut tags = vec![CacheTag::team(team.id())];
        let cascade = match self.transition {
            TransitionName::Archive if !input.preserve_data => Some(MembershipStatus::Active),
            TransitionName::Restore => Some(MembershipStatus::Archived),
            _ => None,
        };
        if let Some(from) = cascade {
            for mut membership in env.store.list_memberships(team.id()).await? {
                if membership.status() != from {
                    continue;
                }
                if from == MembershipStatus::Active {
                    membership.archive(ctx.now);
                } else {
                    membership.reactivate(ctx.now);
                }
                tags.push(CacheTag::user(membership.user()));
                changes.update_membership(membership);
            }
            debug!(
                team_id = %team.id(),
                transition = %self.transition,
                memberships = tags.len() - 1,
                "Cascading membership status"
            );
        }

        let mut payload = json!({
            "transition": self.transition,
            "previous_status": previous,
            "status": team.status(),
            "reason": input.reason,
        });
        if let Value::Object(map) = &mut payload {
            map.extend(details);
        }

        changes.append_activity(activity(
            ctx,
            *team.id(),
            "team",
            team.id(),
            self.transition.as_str(),
            payload.clone(),
        ));

        Ok(Executed::new(
            team.clone(),
            event(ctx, self.event_kind(), *team.id(), payload),
            tags,
        ))
    }

    fn after(
        &self,
        env: &ActionEnv,
        _ctx: &ActionContext,
        input: &TransitionRequest,
        team: &Team,
    ) -> Vec<SubAction> {
        if !notifications_enabled(env) {
            return Vec::new();
        }

        vec![notify_team_members(
            env,
            NotificationKind::TeamStatusChanged,
            *team.id(),
            json!({
                "name": team.name(),
                "transition": self.transition,
                "status": team.status(),
                "reason": input.reason,
            }),
        )]
    }

    fn success_message(&self, team: &Team) -> String {
        format!("Team '{}' is now {}", team.name(), team.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::Actor;
    use crate::domain::permission::{capabilities as cap, TeamRole};
    use crate::domain::store::TeamStore;
    use crate::domain::team::TeamStatus;
    use crate::infrastructure::testing::TestEngine;
    use chrono::Duration;
    use mockable::Clock;

    async fn run(
        engine: &TestEngine,
        action: TransitionTeam,
        actor: &Actor,
        input: TransitionTeamInput,
    ) -> Result<Team, ActionError> {
        engine
            .pipeline()
            .run(&action, actor.clone(), input)
            .await
            .into_result()
    }

    #[tokio::test]
    async fn test_activate_records_audit() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        let team = engine.draft_team(&alice, "Core").await;

        let team = run(
            &engine,
            TransitionTeam::activate(),
            &alice,
            TransitionTeamInput::new(team.id().to_string()).with_reason("launch"),
        )
        .await
        .unwrap();

        assert_eq!(team.status(), TeamStatus::Active);
        let stored = engine.reload(&team).await;
        let audit = stored.lifecycle_record("activate").unwrap();
        assert_eq!(audit["previous_status"], "draft");
        assert_eq!(audit["actor"], "user:alice");
        assert_eq!(audit["reason"], "launch");
        assert_eq!(
            engine.event_kinds(),
            vec![EventKind::TeamCreated, EventKind::TeamActivated]
        );
    }

    #[tokio::test]
    async fn test_archive_from_draft_is_invalid_transition() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        let team = engine.draft_team(&alice, "Core").await;

        let err = run(
            &engine,
            TransitionTeam::archive(),
            &alice,
            TransitionTeamInput::new(team.id().to_string()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.conflict_code(), Some(ConflictCode::InvalidTransition));
        assert_eq!(engine.reload(&team).await.status(), TeamStatus::Draft);
    }

    #[tokio::test]
    async fn test_plain_member_cannot_suspend() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        let bob = engine.user("bob");
        let carol = engine.user("carol");
        let team = engine.active_team(&alice, "Core").await;
        engine.add_member(&alice, &team, &bob, TeamRole::Member).await.into_result().unwrap();
        engine.add_member(&alice, &team, &carol, TeamRole::Admin).await.into_result().unwrap();

        let err = run(
            &engine,
            TransitionTeam::suspend(),
            &bob,
            TransitionTeamInput::new(team.id().to_string()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "forbidden");
        assert!(err.to_string().contains(cap::SUSPEND_TEAM));

        let team = run(
            &engine,
            TransitionTeam::suspend(),
            &carol,
            TransitionTeamInput::new(team.id().to_string()),
        )
        .await
        .unwrap();
        assert_eq!(team.status(), TeamStatus::Suspended);
    }

    #[tokio::test]
    async fn test_suspend_then_resume() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        let team = engine.active_team(&alice, "Core").await;
        let until = engine.clock().utc() + Duration::days(14);

        let suspended = run(
            &engine,
            TransitionTeam::suspend(),
            &alice,
            TransitionTeamInput {
                suspension_until: Some(until),
                ..TransitionTeamInput::new(team.id().to_string())
            },
        )
        .await
        .unwrap();
        assert_eq!(
            suspended.lifecycle_record("suspend").unwrap()["suspension_until"],
            until.to_rfc3339()
        );

        let resumed = run(
            &engine,
            TransitionTeam::resume(),
            &alice,
            TransitionTeamInput::new(team.id().to_string()),
        )
        .await
        .unwrap();
        assert_eq!(resumed.status(), TeamStatus::Active);

        let last = engine.events().pop().unwrap();
        assert_eq!(last.kind, EventKind::TeamActivated);
        assert_eq!(last.payload["transition"], "resume");
        assert_eq!(last.payload["previous_status"], "suspended");
    }

    #[tokio::test]
    async fn test_transition_inputs_are_scoped() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        let team = engine.active_team(&alice, "Core").await;

        let err = run(
            &engine,
            TransitionTeam::suspend(),
            &alice,
            TransitionTeamInput {
                preserve_data: Some(false),
                suspension_until: Some(engine.clock().utc() - Duration::hours(1)),
                ..TransitionTeamInput::new(team.id().to_string())
            },
        )
        .await
        .unwrap_err();

        let errors = err.field_errors();
        assert!(errors.get("preserve_data").is_some());
        assert!(errors.get("suspension_until").is_some());

        let err = run(
            &engine,
            TransitionTeam::activate(),
            &alice,
            TransitionTeamInput::new("not-an-id"),
        )
        .await
        .unwrap_err();
        assert!(err.field_errors().get("team_id").is_some());
    }

    #[tokio::test]
    async fn test_archive_cascade_and_restore() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        let bob = engine.user("bob");
        let team = engine.active_team(&alice, "Core").await;
        engine.add_member(&alice, &team, &bob, TeamRole::Admin).await.into_result().unwrap();

        run(
            &engine,
            TransitionTeam::archive(),
            &alice,
            TransitionTeamInput {
                preserve_data: Some(false),
                ..TransitionTeamInput::new(team.id().to_string())
            },
        )
        .await
        .unwrap();

        let membership = engine
            .store()
            .find_membership(team.id(), &bob.principal)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(membership.status(), MembershipStatus::Archived);
        assert!(engine
            .env()
            .permissions
            .resolve(team.id(), &bob.principal)
            .await
            .unwrap()
            .is_empty());
        let stored = engine.reload(&team).await;
        assert_eq!(stored.members_count(), 2);
        assert_eq!(stored.lifecycle_record("archive").unwrap()["preserve_data"], false);

        run(
            &engine,
            TransitionTeam::restore(),
            &alice,
            TransitionTeamInput::new(team.id().to_string()),
        )
        .await
        .unwrap();

        let membership = engine
            .store()
            .find_membership(team.id(), &bob.principal)
            .await
            .unwrap()
            .unwrap();
        assert!(membership.is_active());
        assert_eq!(engine.reload(&team).await.status(), TeamStatus::Active);
    }

    #[tokio::test]
    async fn test_archive_preserves_memberships_by_default() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        let bob = engine.user("bob");
        let team = engine.active_team(&alice, "Core").await;
        engine.add_member(&alice, &team, &bob, TeamRole::Member).await.into_result().unwrap();

        run(
            &engine,
            TransitionTeam::archive(),
            &alice,
            TransitionTeamInput::new(team.id().to_string()),
        )
        .await
        .unwrap();

        let membership = engine
            .store()
            .find_membership(team.id(), &bob.principal)
            .await
            .unwrap()
            .unwrap();
        assert!(membership.is_active());
    }

    #[tokio::test]
    async fn test_workflows_toggle() {
        let mut config = TeamsConfig::default();
        config.features.workflows = false;
        let engine = TestEngine::builder().config(config).build().await;
        let alice = engine.user("alice");
        let team = engine.draft_team(&alice, "Core").await;

        let err = run(
            &engine,
            TransitionTeam::activate(),
            &alice,
            TransitionTeamInput::new(team.id().to_string()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }

    #[tokio::test]
    async fn test_members_notified_of_status_change() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        let team = engine.active_team(&alice, "Core").await;

        let status_changes: Vec<_> = engine
            .notifications()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::TeamStatusChanged)
            .collect();
        assert_eq!(status_changes.len(), 1);
        assert_eq!(status_changes[0].team_id, *team.id());
    }
}
