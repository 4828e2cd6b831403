//! Team service: the entry point callers use for team operations and reads

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::action::{ActionError, ActionOutcome, Actor};
use crate::domain::cache::{CacheExt, CacheKeys, CacheTag};
use crate::domain::ids::TeamId;
use crate::domain::invitation::Invitation;
use crate::domain::lifecycle::TransitionName;
use crate::domain::membership::Membership;
use crate::domain::permission::capabilities as cap;
use crate::domain::permission::CapabilitySet;
use crate::domain::team::{Team, TeamStatus};
use crate::infrastructure::action::{
    AcceptInvitation, AcceptedInvitation, ActionEnv, ActionPipeline, AddMember, AddMemberInput,
    CancelInvitation, CreateTeam, CreateTeamInput, DeclineInvitation, InvitationIdInput,
    InvitationTokenInput, InviteMember, InviteMemberInput, IssuedInvitation, RemoveMember,
    RemoveMemberInput, RemovedMember, ResendInvitation, TransitionTeam, TransitionTeamInput,
    UpdateTeam, UpdateTeamInput,
};

/// Runs team operations and serves cached read projections.
///
/// Writes go through the action pipeline, which invalidates the affected
/// `team:{id}` and `user:{..}` tags after commit. Reads consult the cache
/// first and always re-check the caller's capabilities against storage.
#[derive(Debug, Clone)]
pub struct TeamService {
    pipeline: ActionPipeline,
    projection_ttl: Duration,
}

impl TeamService {
    pub fn new(pipeline: ActionPipeline, projection_ttl: Duration) -> Self {
        Self {
            pipeline,
            projection_ttl,
        }
    }

    pub fn pipeline(&self) -> &ActionPipeline {
        &self.pipeline
    }

    fn env(&self) -> &ActionEnv {
        self.pipeline.env()
    }

    pub async fn create_team(&self, actor: Actor, input: CreateTeamInput) -> ActionOutcome<Team> {
        self.pipeline.run(&CreateTeam, actor, input).await
    }

    pub async fn update_team(&self, actor: Actor, input: UpdateTeamInput) -> ActionOutcome<Team> {
        self.pipeline.run(&UpdateTeam, actor, input).await
    }

    /// Runs one named lifecycle transition
    pub async fn transition(
        &self,
        transition: TransitionName,
        actor: Actor,
        input: TransitionTeamInput,
    ) -> ActionOutcome<Team> {
        self.pipeline
            .run(&TransitionTeam::new(transition), actor, input)
            .await
    }

    pub async fn add_member(&self, actor: Actor, input: AddMemberInput) -> ActionOutcome<Membership> {
        self.pipeline.run(&AddMember, actor, input).await
    }

    pub async fn remove_member(
        &self,
        actor: Actor,
        input: RemoveMemberInput,
    ) -> ActionOutcome<RemovedMember> {
        self.pipeline.run(&RemoveMember, actor, input).await
    }

    pub async fn invite_member(
        &self,
        actor: Actor,
        input: InviteMemberInput,
    ) -> ActionOutcome<IssuedInvitation> {
        self.pipeline.run(&InviteMember, actor, input).await
    }

    pub async fn accept_invitation(
        &self,
        actor: Actor,
        token: impl Into<String>,
    ) -> ActionOutcome<AcceptedInvitation> {
        self.pipeline
            .run(&AcceptInvitation, actor, InvitationTokenInput::new(token))
            .await
    }

    pub async fn decline_invitation(
        &self,
        actor: Actor,
        token: impl Into<String>,
    ) -> ActionOutcome<Invitation> {
        self.pipeline
            .run(&DeclineInvitation, actor, InvitationTokenInput::new(token))
            .await
    }

    pub async fn cancel_invitation(
        &self,
        actor: Actor,
        invitation_id: impl Into<String>,
    ) -> ActionOutcome<Invitation> {
        self.pipeline
            .run(&CancelInvitation, actor, InvitationIdInput::new(invitation_id))
            .await
    }

    pub async fn resend_invitation(
        &self,
        actor: Actor,
        invitation_id: impl Into<String>,
    ) -> ActionOutcome<IssuedInvitation> {
        self.pipeline
            .run(&ResendInvitation, actor, InvitationIdInput::new(invitation_id))
            .await
    }

    /// Team view; requires `view_team`
    pub async fn get_team(&self, actor: &Actor, team_id: &TeamId) -> Result<Team, ActionError> {
        let team = self.visible_team(actor, team_id).await?;
        self.require(actor, &team, &[cap::VIEW_TEAM, cap::MANAGE_TEAM])
            .await?;
        Ok(team)
    }

    /// Seat-occupying memberships; requires `view_team_members`
    pub async fn list_members(
        &self,
        actor: &Actor,
        team_id: &TeamId,
    ) -> Result<Vec<Membership>, ActionError> {
        let team = self.visible_team(actor, team_id).await?;
        self.require(
            actor,
            &team,
            &[cap::VIEW_TEAM_MEMBERS, cap::MANAGE_TEAM_MEMBERS],
        )
        .await?;

        let key = CacheKeys::members(team_id);
        if let Some(members) = self.cached::<Vec<Membership>>(&key).await {
            return Ok(members);
        }

        let members = self.env().store.list_memberships(team_id).await?;
        self.store_projection(&key, &members, &[CacheTag::team(team_id)])
            .await;
        Ok(members)
    }

    /// Teams in which the actor holds an active membership or which they own
    pub async fn list_teams_for_user(&self, actor: &Actor) -> Result<Vec<Team>, ActionError> {
        let key = CacheKeys::user_teams(&actor.principal, actor.tenant.as_ref());
        if let Some(teams) = self.cached::<Vec<Team>>(&key).await {
            return Ok(teams);
        }

        let store = &self.env().store;
        let mut teams = store.list_teams_owned_by(&actor.principal).await?;
        for membership in store.list_memberships_for(&actor.principal).await? {
            if !membership.is_active() || teams.iter().any(|t| t.id() == membership.team_id()) {
                continue;
            }
            if let Some(team) = store.find_team(membership.team_id()).await? {
                teams.push(team);
            }
        }
        teams.retain(|team| !team.is_deleted() && self.in_scope(actor, team));
        teams.sort_by(|a, b| a.name().cmp(b.name()));

        let mut tags = vec![CacheTag::user(&actor.principal)];
        tags.extend(teams.iter().map(|team| CacheTag::team(team.id())));
        self.store_projection(&key, &teams, &tags).await;
        Ok(teams)
    }

    /// Transitions the actor may perform on the team in its current status
    pub async fn allowed_transitions(
        &self,
        actor: &Actor,
        team_id: &TeamId,
    ) -> Result<Vec<TransitionName>, ActionError> {
        if !self.env().config.features.workflows {
            return Ok(Vec::new());
        }

        let team = self.fresh_team(actor, team_id).await?;
        let capabilities = self.capabilities(actor, &team).await?;
        Ok(self
            .env()
            .state_machine
            .available(team.status(), &capabilities))
    }

    /// Current status straight from storage
    pub async fn status(&self, actor: &Actor, team_id: &TeamId) -> Result<TeamStatus, ActionError> {
        Ok(self.fresh_team(actor, team_id).await?.status())
    }

    async fn visible_team(&self, actor: &Actor, team_id: &TeamId) -> Result<Team, ActionError> {
        let key = CacheKeys::team(team_id);
        if let Some(team) = self.cached::<Team>(&key).await {
            if self.in_scope(actor, &team) {
                return Ok(team);
            }
            return Err(not_found(team_id));
        }

        let team = self.fresh_team(actor, team_id).await?;
        self.store_projection(&key, &team, &[CacheTag::team(team_id)])
            .await;
        Ok(team)
    }

    async fn fresh_team(&self, actor: &Actor, team_id: &TeamId) -> Result<Team, ActionError> {
        self.env()
            .store
            .find_team(team_id)
            .await?
            .filter(|team| !team.is_deleted() && self.in_scope(actor, team))
            .ok_or_else(|| not_found(team_id))
    }

    fn in_scope(&self, actor: &Actor, team: &Team) -> bool {
        !self.env().config.features.tenancy
            || actor.tenant.is_none()
            || team.tenant() == actor.tenant.as_ref()
    }

    async fn capabilities(&self, actor: &Actor, team: &Team) -> Result<CapabilitySet, ActionError> {
        Ok(self
            .env()
            .permissions
            .resolve_for_team(team, &actor.principal)
            .await?)
    }

    async fn require(&self, actor: &Actor, team: &Team, any_of: &[&str]) -> Result<(), ActionError> {
        if self.capabilities(actor, team).await?.allows_any(any_of) {
            Ok(())
        } else {
            Err(ActionError::forbidden(format!(
                "Requires one of: {}",
                any_of.join(", ")
            )))
        }
    }

    /// Cache errors degrade to a miss
    async fn cached<V: DeserializeOwned + Send>(&self, key: &str) -> Option<V> {
        match self.env().cache.as_ref().get::<V>(key).await {
            Ok(Some(value)) => {
                debug!(key, "Projection cache hit");
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Projection cache read failed");
                None
            }
        }
    }

    async fn store_projection<V: Serialize + Send + Sync>(&self, key: &str, value: &V, tags: &[CacheTag]) {
        if let Err(e) = self
            .env()
            .cache
            .as_ref()
            .set(key, value, tags, self.projection_ttl)
            .await
        {
            warn!(key, error = %e, "Projection cache write failed");
        }
    }
}

fn not_found(team_id: &TeamId) -> ActionError {
    ActionError::not_found(format!("Team '{}' not found", team_id))
}
