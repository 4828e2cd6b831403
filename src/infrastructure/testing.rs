//! In-memory engine and controllable clock for tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;

use crate::config::TeamsConfig;
use crate::domain::action::{ActionOutcome, Actor};
use crate::domain::activity::ActivityRecord;
use crate::domain::cache::Cache;
use crate::domain::event::{DomainEvent, EventBus, EventKind, EventListener};
use crate::domain::ids::{InvitationId, TeamId};
use crate::domain::invitation::Invitation;
use crate::domain::membership::Membership;
use crate::domain::notification::{Notification, Notifier};
use crate::domain::permission::TeamRole;
use crate::domain::principal::{PrincipalProfile, PrincipalRef};
use crate::domain::store::{ChangeSet, TeamStore};
use crate::domain::team::Team;
use crate::domain::DomainError;
use crate::infrastructure::action::{
    ActionEnv, ActionPipeline, AddMember, AddMemberInput, CreateTeam, CreateTeamInput,
    TransitionTeam, TransitionTeamInput,
};
use crate::infrastructure::cache::InMemoryCache;
use crate::infrastructure::events::InProcessEventBus;
use crate::infrastructure::principal::InMemoryPrincipalDirectory;
use crate::infrastructure::storage::InMemoryTeamStore;

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Notifier that keeps every notification; optionally fails them all
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), DomainError> {
        if self.fail {
            return Err(DomainError::notification("delivery refused"));
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordingListener {
    events: Mutex<Vec<DomainEvent>>,
}

#[async_trait]
impl EventListener for RecordingListener {
    fn kinds(&self) -> Vec<EventKind> {
        Vec::new()
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), DomainError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// In-memory store with adjustable misbehaviour: slow commits, and membership
/// lookups that miss rows for one principal the way a stale replica would
#[derive(Debug)]
pub struct InterceptingStore {
    inner: Arc<InMemoryTeamStore>,
    commit_delay: Option<std::time::Duration>,
    hidden_member: Option<PrincipalRef>,
}

#[async_trait]
impl TeamStore for InterceptingStore {
    async fn find_team(&self, id: &TeamId) -> Result<Option<Team>, DomainError> {
        self.inner.find_team(id).await
    }

    async fn find_team_by_slug(&self, slug: &str) -> Result<Option<Team>, DomainError> {
        self.inner.find_team_by_slug(slug).await
    }

    async fn list_teams(&self) -> Result<Vec<Team>, DomainError> {
        self.inner.list_teams().await
    }

    async fn list_teams_owned_by(&self, owner: &PrincipalRef) -> Result<Vec<Team>, DomainError> {
        self.inner.list_teams_owned_by(owner).await
    }

    async fn list_deleted_teams(&self, before: DateTime<Utc>) -> Result<Vec<Team>, DomainError> {
        self.inner.list_deleted_teams(before).await
    }

    async fn find_membership(
        &self,
        team: &TeamId,
        user: &PrincipalRef,
    ) -> Result<Option<Membership>, DomainError> {
        if self.hidden_member.as_ref() == Some(user) {
            return Ok(None);
        }
        self.inner.find_membership(team, user).await
    }

    async fn list_memberships(&self, team: &TeamId) -> Result<Vec<Membership>, DomainError> {
        self.inner.list_memberships(team).await
    }

    async fn list_memberships_for(&self, user: &PrincipalRef) -> Result<Vec<Membership>, DomainError> {
        self.inner.list_memberships_for(user).await
    }

    async fn find_invitation(&self, id: &InvitationId) -> Result<Option<Invitation>, DomainError> {
        self.inner.find_invitation(id).await
    }

    async fn find_invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, DomainError> {
        self.inner.find_invitation_by_token(token).await
    }

    async fn find_pending_invitation(
        &self,
        team: &TeamId,
        email: &str,
    ) -> Result<Option<Invitation>, DomainError> {
        self.inner.find_pending_invitation(team, email).await
    }

    async fn list_invitations(&self, team: &TeamId) -> Result<Vec<Invitation>, DomainError> {
        self.inner.list_invitations(team).await
    }

    async fn token_exists(&self, token: &str) -> Result<bool, DomainError> {
        self.inner.token_exists(token).await
    }

    async fn list_expired_invitations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, DomainError> {
        self.inner.list_expired_invitations(cutoff).await
    }

    async fn list_activity(&self, team: &TeamId) -> Result<Vec<ActivityRecord>, DomainError> {
        self.inner.list_activity(team).await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), DomainError> {
        if let Some(delay) = self.commit_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.commit(changes).await
    }
}

#[derive(Default)]
pub struct TestEngineBuilder {
    config: Option<TeamsConfig>,
    events: Option<Arc<dyn EventBus>>,
    cache: Option<Arc<dyn Cache>>,
    notifier: Option<Arc<RecordingNotifier>>,
    commit_delay: Option<std::time::Duration>,
    hidden_member: Option<PrincipalRef>,
}

impl TestEngineBuilder {
    pub fn config(mut self, config: TeamsConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    /// Every commit sleeps for `delay` before applying
    pub fn commit_delay(mut self, delay: std::time::Duration) -> Self {
        self.commit_delay = Some(delay);
        self
    }

    /// Membership lookups for `user` report no row, while commits still see it
    pub fn hide_membership_of(mut self, user: &Actor) -> Self {
        self.hidden_member = Some(user.principal.clone());
        self
    }

    pub async fn build(self) -> TestEngine {
        let store = Arc::new(InMemoryTeamStore::new());
        let env_store: Arc<dyn TeamStore> =
            if self.commit_delay.is_some() || self.hidden_member.is_some() {
                Arc::new(InterceptingStore {
                    inner: store.clone(),
                    commit_delay: self.commit_delay,
                    hidden_member: self.hidden_member,
                })
            } else {
                store.clone()
            };
        let directory = Arc::new(InMemoryPrincipalDirectory::new());
        let notifier = self.notifier.unwrap_or_default();
        let clock = FixedClock::default();
        let listener = Arc::new(RecordingListener::default());

        let events = self.events.unwrap_or_else(|| {
            let bus = InProcessEventBus::new();
            bus.subscribe(listener.clone());
            Arc::new(bus) as Arc<dyn EventBus>
        });
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(InMemoryCache::new()) as Arc<dyn Cache>);

        let env = ActionEnv::new(
            env_store,
            cache,
            events,
            notifier.clone(),
            directory.clone(),
            self.config.unwrap_or_default(),
            Arc::new(clock.clone()),
        );

        TestEngine {
            pipeline: ActionPipeline::new(env),
            store,
            directory,
            notifier,
            listener,
            clock,
        }
    }
}

/// Pipeline over in-memory adapters plus seeding helpers
pub struct TestEngine {
    pipeline: ActionPipeline,
    store: Arc<InMemoryTeamStore>,
    directory: Arc<InMemoryPrincipalDirectory>,
    notifier: Arc<RecordingNotifier>,
    listener: Arc<RecordingListener>,
    clock: FixedClock,
}

impl TestEngine {
    pub async fn new() -> Self {
        Self::builder().build().await
    }

    pub fn builder() -> TestEngineBuilder {
        TestEngineBuilder::default()
    }

    pub fn pipeline(&self) -> &ActionPipeline {
        &self.pipeline
    }

    pub fn env(&self) -> &ActionEnv {
        self.pipeline.env()
    }

    pub fn store(&self) -> &Arc<InMemoryTeamStore> {
        &self.store
    }

    pub fn clock(&self) -> &FixedClock {
        &self.clock
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifier.sent()
    }

    /// Events delivered through the default in-process bus
    pub fn events(&self) -> Vec<DomainEvent> {
        self.listener.events.lock().unwrap().clone()
    }

    pub fn event_kinds(&self) -> Vec<EventKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }

    /// Registers a user in the directory and returns it as an actor
    pub fn user(&self, id: &str) -> Actor {
        let reference = PrincipalRef::user(id);
        let profile = PrincipalProfile::new(reference.clone(), format!("User {}", id))
            .with_email(format!("user{}@example.com", id));
        self.directory.insert(profile).unwrap();
        Actor::new(reference)
    }

    /// Team created by `owner`, still in draft
    pub async fn draft_team(&self, owner: &Actor, name: &str) -> Team {
        let input = CreateTeamInput {
            name: name.to_string(),
            ..Default::default()
        };
        self.pipeline
            .run(&CreateTeam, owner.clone(), input)
            .await
            .into_result()
            .unwrap()
    }

    /// Team created and activated by `owner`
    pub async fn active_team(&self, owner: &Actor, name: &str) -> Team {
        let team = self.draft_team(owner, name).await;
        self.pipeline
            .run(
                &TransitionTeam::activate(),
                owner.clone(),
                TransitionTeamInput::new(team.id().to_string()),
            )
            .await
            .into_result()
            .unwrap()
    }

    pub async fn add_member(
        &self,
        actor: &Actor,
        team: &Team,
        user: &Actor,
        role: TeamRole,
    ) -> ActionOutcome<Membership> {
        let input = AddMemberInput {
            team_id: team.id().to_string(),
            user: user.principal.to_string(),
            role: Some(role.as_str().to_string()),
            ..Default::default()
        };
        self.pipeline.run(&AddMember, actor.clone(), input).await
    }

    pub async fn reload(&self, team: &Team) -> Team {
        self.store.find_team(team.id()).await.unwrap().unwrap()
    }
}
