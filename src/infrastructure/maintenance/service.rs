//! Periodic maintenance jobs run outside the request path

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use tracing::{info, instrument, warn};

use crate::domain::action::Actor;
use crate::domain::cache::{Cache, CacheTag};
use crate::domain::ids::TeamId;
use crate::domain::invitation::Invitation;
use crate::domain::permission::TeamRole;
use crate::domain::principal::PrincipalRef;
use crate::domain::store::{ChangeSet, TeamStore};
use crate::domain::team::Team;
use crate::domain::DomainError;
use crate::infrastructure::action::{ActionEnv, ActionPipeline, TransitionTeam, TransitionTeamInput};
use crate::infrastructure::invitation::InvitationManager;

/// A team whose stored member counter disagreed with its memberships
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRepair {
    pub team_id: TeamId,
    pub stored: u32,
    pub actual: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecountReport {
    pub teams_checked: usize,
    pub repairs: Vec<CounterRepair>,
}

/// An active team with no recent team or member activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactiveTeam {
    pub team_id: TeamId,
    pub name: String,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub inactive: Vec<InactiveTeam>,
    pub archived: Vec<TeamId>,
    /// Teams the archive transition refused, with the reason
    pub skipped: Vec<(TeamId, String)>,
}

#[derive(Clone)]
pub struct MaintenanceService {
    store: Arc<dyn TeamStore>,
    cache: Arc<dyn Cache>,
    invitations: InvitationManager,
    pipeline: ActionPipeline,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl MaintenanceService {
    pub fn new(env: &ActionEnv) -> Self {
        Self {
            store: env.store.clone(),
            cache: env.cache.clone(),
            invitations: env.invitations.clone(),
            pipeline: ActionPipeline::new(env.clone()),
            clock: env.clock.clone(),
        }
    }

    /// Marks pending invitations that expired more than `older_than_days`
    /// ago as `expired`. With `dry_run` nothing is written.
    #[instrument(skip(self))]
    pub async fn expire_invitations(
        &self,
        older_than_days: i64,
        dry_run: bool,
    ) -> Result<Vec<Invitation>, DomainError> {
        let expired = self
            .invitations
            .expire_sweep(older_than_days, dry_run, self.clock.utc())
            .await?;

        if !dry_run {
            let mut tags: Vec<CacheTag> = expired.iter().map(|i| CacheTag::team(i.team_id())).collect();
            tags.sort();
            tags.dedup();
            self.invalidate(&tags).await;
        }
        Ok(expired)
    }

    /// Recomputes every team's `members_count` from its seat-occupying
    /// memberships and overwrites counters that drifted.
    #[instrument(skip(self))]
    pub async fn recount_members(&self, dry_run: bool) -> Result<RecountReport, DomainError> {
        let mut report = RecountReport::default();
        let mut changes = ChangeSet::new();

        for team in self.store.list_teams().await? {
            if team.is_deleted() {
                continue;
            }
            report.teams_checked += 1;

            let actual = self
                .store
                .list_memberships(team.id())
                .await?
                .iter()
                .filter(|m| m.occupies_seat())
                .count() as u32;

            if actual != team.members_count() {
                warn!(
                    team_id = %team.id(),
                    stored = team.members_count(),
                    actual,
                    "Member counter drifted"
                );
                changes.set_member_count(*team.id(), actual);
                report.repairs.push(CounterRepair {
                    team_id: *team.id(),
                    stored: team.members_count(),
                    actual,
                });
            }
        }

        if !dry_run && !changes.is_empty() {
            self.store.commit(changes).await?;
            let tags: Vec<CacheTag> = report.repairs.iter().map(|r| CacheTag::team(&r.team_id)).collect();
            self.invalidate(&tags).await;
        }

        info!(
            teams_checked = report.teams_checked,
            repaired = report.repairs.len(),
            dry_run,
            "Member counter recount finished"
        );
        Ok(report)
    }

    /// Archives active teams whose own activity and every member's last
    /// activity predate `older_than_days`. Each team goes through the
    /// regular archive transition on behalf of its owner.
    #[instrument(skip(self))]
    pub async fn archive_inactive_teams(
        &self,
        older_than_days: i64,
        dry_run: bool,
    ) -> Result<ArchiveReport, DomainError> {
        let cutoff = self.clock.utc() - Duration::days(older_than_days);
        let mut report = ArchiveReport::default();

        for team in self.store.list_teams().await? {
            if team.is_deleted() || !team.status().is_active() {
                continue;
            }
            let Some((last_activity_at, owner)) = self.inactivity(&team, cutoff).await? else {
                continue;
            };
            report.inactive.push(InactiveTeam {
                team_id: *team.id(),
                name: team.name().to_string(),
                last_activity_at,
            });
            if dry_run {
                continue;
            }

            let Some(owner) = owner else {
                report.skipped.push((*team.id(), "Team has no owner to act for".to_string()));
                continue;
            };
            let input = TransitionTeamInput::new(team.id().to_string())
                .with_reason(format!("Inactive for {} days", older_than_days));
            match self
                .pipeline
                .run(&TransitionTeam::archive(), Actor::new(owner), input)
                .await
                .into_result()
            {
                Ok(_) => report.archived.push(*team.id()),
                Err(e) => {
                    warn!(team_id = %team.id(), error = %e, "Inactive team was not archived");
                    report.skipped.push((*team.id(), e.to_string()));
                }
            }
        }

        info!(
            inactive = report.inactive.len(),
            archived = report.archived.len(),
            skipped = report.skipped.len(),
            dry_run,
            "Inactive team sweep finished"
        );
        Ok(report)
    }

    /// Latest activity and acting owner of a team idle since `cutoff`,
    /// or `None` when the team or one of its members was active after it
    async fn inactivity(
        &self,
        team: &Team,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<(DateTime<Utc>, Option<PrincipalRef>)>, DomainError> {
        let mut latest = team
            .last_activity_at()
            .map_or(team.updated_at(), |at| at.max(team.updated_at()));
        let mut owner = team.owner().cloned();

        for membership in self.store.list_memberships(team.id()).await? {
            if !membership.is_active() {
                continue;
            }
            latest = latest.max(membership.last_activity_at().unwrap_or(membership.joined_at()));
            if owner.is_none() && *membership.role() == TeamRole::Owner {
                owner = Some(membership.user().clone());
            }
        }

        if latest > cutoff {
            return Ok(None);
        }
        Ok(Some((latest, owner)))
    }

    /// Hard-deletes teams soft-deleted more than `older_than_days` ago,
    /// together with their memberships, invitations and activity.
    #[instrument(skip(self))]
    pub async fn purge_deleted_teams(
        &self,
        older_than_days: i64,
        dry_run: bool,
    ) -> Result<Vec<Team>, DomainError> {
        let before = self.clock.utc() - Duration::days(older_than_days);
        let teams = self.store.list_deleted_teams(before).await?;

        if !dry_run && !teams.is_empty() {
            let mut changes = ChangeSet::new();
            for team in &teams {
                changes.purge_team(*team.id());
            }
            self.store.commit(changes).await?;
            let tags: Vec<CacheTag> = teams.iter().map(|t| CacheTag::team(t.id())).collect();
            self.invalidate(&tags).await;
        }

        info!(purged = teams.len(), dry_run, "Deleted team cleanup finished");
        Ok(teams)
    }

    async fn invalidate(&self, tags: &[CacheTag]) {
        if tags.is_empty() {
            return;
        }
        if let Err(e) = self.cache.invalidate_tags(tags).await {
            warn!(error = %e, "Cache invalidation after maintenance failed");
        }
    }
}

impl std::fmt::Debug for MaintenanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceService")
            .field("store", &self.store)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
