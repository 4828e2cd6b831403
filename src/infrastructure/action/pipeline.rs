//! Four-phase action pipeline
//!
//! Every mutating operation runs the same sequence:
//!
//! 1. `validate` normalizes the raw input without touching any collaborator.
//! 2. `authorize` checks capabilities and entity state against fresh reads.
//! 3. `execute` stages writes into a `ChangeSet` under the configured
//!    timeout; the `ChangeSet` is then committed atomically.
//! 4. After commit: cache tags are flushed, the single domain event is
//!    published and the operation's sub-actions run in order.
//!
//! Failures in phases 1-3 become the sole `Failure` outcome. Anything that
//! goes wrong after commit is reported as a warning on the `Success`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{debug, info, warn};

use crate::config::TeamsConfig;
use crate::domain::action::{
    ActionContext, ActionError, ActionOutcome, Actor, FieldErrors, SideEffectWarning, SubAction,
};
use crate::domain::cache::{Cache, CacheTag};
use crate::domain::event::{DomainEvent, EventBus};
use crate::domain::lifecycle::StateMachine;
use crate::domain::notification::Notifier;
use crate::domain::principal::PrincipalDirectory;
use crate::domain::store::{ChangeSet, TeamStore};
use crate::infrastructure::invitation::{InvitationManager, RandomTokenGenerator};
use crate::infrastructure::observability::{record_action, record_side_effect_failure};
use crate::infrastructure::permission::PermissionResolver;

/// Collaborators and configuration shared by every action
#[derive(Clone)]
pub struct ActionEnv {
    pub store: Arc<dyn TeamStore>,
    pub cache: Arc<dyn Cache>,
    pub events: Arc<dyn EventBus>,
    pub notifier: Arc<dyn Notifier>,
    pub directory: Arc<dyn PrincipalDirectory>,
    pub permissions: PermissionResolver,
    pub invitations: InvitationManager,
    pub state_machine: Arc<StateMachine>,
    pub config: Arc<TeamsConfig>,
    pub clock: Arc<dyn Clock + Send + Sync>,
}

impl ActionEnv {
    /// Wires the resolver, invitation manager and state machine from `config`
    pub fn new(
        store: Arc<dyn TeamStore>,
        cache: Arc<dyn Cache>,
        events: Arc<dyn EventBus>,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn PrincipalDirectory>,
        config: TeamsConfig,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let config = Arc::new(config);
        let generator = Arc::new(RandomTokenGenerator::new(config.invitations.token_length));

        Self {
            permissions: PermissionResolver::new(store.clone(), config.roles.clone()),
            invitations: InvitationManager::new(store.clone(), generator, config.clone()),
            state_machine: Arc::new(config.state_machine()),
            store,
            cache,
            events,
            notifier,
            directory,
            config,
            clock,
        }
    }
}

impl std::fmt::Debug for ActionEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEnv")
            .field("store", &self.store)
            .field("cache", &self.cache)
            .field("events", &self.events)
            .field("notifier", &self.notifier)
            .field("directory", &self.directory)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What a successful execute phase hands back to the pipeline
#[derive(Debug)]
pub struct Executed<T> {
    pub output: T,
    /// Published once the commit succeeds
    pub event: DomainEvent,
    /// Cache tags to flush after commit
    pub tags: Vec<CacheTag>,
}

impl<T> Executed<T> {
    pub fn new(output: T, event: DomainEvent, tags: Vec<CacheTag>) -> Self {
        Self { output, event, tags }
    }
}

/// A mutating operation expressed as the four pipeline phases
#[async_trait]
pub trait Action: Send + Sync {
    type Input: Send;
    type Normalized: Send + Sync;
    type Output: Send + Sync;

    /// Metric and log label
    fn name(&self) -> &'static str;

    /// Pure structural checks against the configuration snapshot; `ctx.now`
    /// is the only clock reading allowed
    fn validate(
        &self,
        input: Self::Input,
        ctx: &ActionContext,
        config: &TeamsConfig,
    ) -> Result<Self::Normalized, FieldErrors>;

    async fn authorize(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &Self::Normalized,
    ) -> Result<(), ActionError>;

    /// Loads fresh state and stages every write into `changes`
    async fn execute(
        &self,
        env: &ActionEnv,
        ctx: &ActionContext,
        input: &Self::Normalized,
        changes: &mut ChangeSet,
    ) -> Result<Executed<Self::Output>, ActionError>;

    /// Ordered follow-ups, run after commit
    fn after(
        &self,
        _env: &ActionEnv,
        _ctx: &ActionContext,
        _input: &Self::Normalized,
        _output: &Self::Output,
    ) -> Vec<SubAction> {
        Vec::new()
    }

    fn success_message(&self, output: &Self::Output) -> String;
}

/// Runs actions against one `ActionEnv`
#[derive(Debug, Clone)]
pub struct ActionPipeline {
    env: ActionEnv,
}

impl ActionPipeline {
    pub fn new(env: ActionEnv) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &ActionEnv {
        &self.env
    }

    pub async fn run<A: Action>(
        &self,
        action: &A,
        actor: Actor,
        input: A::Input,
    ) -> ActionOutcome<A::Output> {
        let started = Instant::now();
        let ctx = ActionContext::new(actor, self.env.clock.utc());

        let outcome = self.run_phases(action, &ctx, input).await;

        let label = match &outcome {
            ActionOutcome::Success { .. } => "success",
            ActionOutcome::Failure { error, .. } => error.kind(),
        };
        record_action(action.name(), label, started.elapsed());
        outcome
    }

    async fn run_phases<A: Action>(
        &self,
        action: &A,
        ctx: &ActionContext,
        input: A::Input,
    ) -> ActionOutcome<A::Output> {
        let name = action.name();

        let normalized = match action.validate(input, ctx, &self.env.config) {
            Ok(normalized) => normalized,
            Err(errors) => {
                debug!(action = name, errors = %errors, "Validation failed");
                return ActionOutcome::failure(ActionError::ValidationFailed(errors));
            }
        };

        if let Err(error) = action.authorize(&self.env, ctx, &normalized).await {
            debug!(action = name, actor = %ctx.actor, error = %error, "Authorization failed");
            return ActionOutcome::failure(error);
        }

        let executed = match self.execute_and_commit(action, ctx, &normalized).await {
            Ok(executed) => executed,
            Err(error) => {
                info!(action = name, actor = %ctx.actor, error = %error, "Action failed");
                return ActionOutcome::failure(error);
            }
        };

        let Executed {
            output,
            event,
            tags,
        } = executed;
        info!(
            action = name,
            actor = %ctx.actor,
            team_id = %event.team_id,
            event = %event.kind,
            "Action committed"
        );

        let mut warnings = Vec::new();
        if let Err(e) = self.env.cache.invalidate_tags(&tags).await {
            warn!(action = name, error = %e, "Cache invalidation failed");
            record_side_effect_failure(name, "invalidate_cache");
            warnings.push(SideEffectWarning {
                sub_action: "invalidate_cache".to_string(),
                message: e.to_string(),
                fatal: false,
            });
        }

        self.env.events.publish(event).await;

        let sub_actions = action.after(&self.env, ctx, &normalized, &output);
        if self.env.config.pipeline.detach_side_effects {
            tokio::spawn(run_sub_actions(name, sub_actions));
        } else {
            warnings.extend(run_sub_actions(name, sub_actions).await);
        }

        let message = action.success_message(&output);
        ActionOutcome::success(output, message, warnings)
    }

    async fn execute_and_commit<A: Action>(
        &self,
        action: &A,
        ctx: &ActionContext,
        normalized: &A::Normalized,
    ) -> Result<Executed<A::Output>, ActionError> {
        let timeout = self.env.config.execute_timeout();
        let mut changes = ChangeSet::new();

        let executed = tokio::time::timeout(
            timeout,
            action.execute(&self.env, ctx, normalized, &mut changes),
        )
        .await
        .map_err(|_| {
            ActionError::unavailable(format!(
                "{} did not complete within {} ms",
                action.name(),
                timeout.as_millis()
            ))
        })??;

        // Once submitted the commit is never abandoned; a dropped future could
        // leave a durable write reported as a failure.
        debug!(action = action.name(), writes = changes.len(), "Committing changes");
        self.env.store.commit(changes).await?;
        Ok(executed)
    }
}

/// Runs sub-actions strictly in order; a halting failure skips the rest
async fn run_sub_actions(action: &'static str, sub_actions: Vec<SubAction>) -> Vec<SideEffectWarning> {
    let mut warnings = Vec::new();

    for sub_action in sub_actions {
        let sub_name = sub_action.name().to_string();
        let continue_on_failure = sub_action.continue_on_failure();

        match sub_action.run().await {
            Ok(()) => debug!(action, sub_action = %sub_name, "Sub-action completed"),
            Err(e) => {
                warn!(action, sub_action = %sub_name, error = %e, "Sub-action failed");
                record_side_effect_failure(action, &sub_name);
                warnings.push(SideEffectWarning {
                    sub_action: sub_name,
                    message: e.to_string(),
                    fatal: !continue_on_failure,
                });
                if !continue_on_failure {
                    break;
                }
            }
        }
    }

    warnings
}
