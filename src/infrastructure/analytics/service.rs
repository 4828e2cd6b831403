//! Team statistics for operators

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc, Weekday};
use mockable::Clock;
use serde::Serialize;

use crate::domain::ids::TeamId;
use crate::domain::invitation::Invitation;
use crate::domain::membership::Membership;
use crate::domain::store::TeamStore;
use crate::domain::team::{Team, TeamStatus};
use crate::domain::DomainError;
use crate::infrastructure::action::ActionEnv;

/// Counts for a single team
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamAnalytics {
    pub team_id: TeamId,
    pub team_name: String,
    pub status: TeamStatus,
    pub total_members: u64,
    pub active_members: u64,
    pub pending_invitations: u64,
    pub created_at: DateTime<Utc>,
}

/// Counts across every non-deleted team
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalAnalytics {
    pub total_teams: u64,
    pub active_teams: u64,
    pub teams_by_status: BTreeMap<String, u64>,
    pub total_members: u64,
    pub active_members: u64,
    pub pending_invitations: u64,
    pub teams_created_today: u64,
    pub teams_created_this_week: u64,
    pub teams_created_this_month: u64,
}

impl GlobalAnalytics {
    fn add_team(&mut self, team: &Team, now: DateTime<Utc>) {
        self.total_teams += 1;
        if team.status().is_active() {
            self.active_teams += 1;
        }
        *self
            .teams_by_status
            .entry(team.status().as_str().to_string())
            .or_default() += 1;

        let created = team.created_at().date_naive();
        let today = now.date_naive();
        if created == today {
            self.teams_created_today += 1;
        }
        if created >= today.week(Weekday::Mon).first_day() && created <= today {
            self.teams_created_this_week += 1;
        }
        if created.year() == today.year() && created.month() == today.month() {
            self.teams_created_this_month += 1;
        }
    }

    fn add_memberships(&mut self, memberships: &[Membership]) {
        self.total_members += memberships.len() as u64;
        self.active_members += memberships.iter().filter(|m| m.is_active()).count() as u64;
    }

    fn add_invitations(&mut self, invitations: &[Invitation]) {
        self.pending_invitations += invitations.iter().filter(|i| i.is_pending()).count() as u64;
    }
}

#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn TeamStore>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl AnalyticsService {
    pub fn new(env: &ActionEnv) -> Self {
        Self {
            store: env.store.clone(),
            clock: env.clock.clone(),
        }
    }

    pub async fn team(&self, team_id: &TeamId) -> Result<TeamAnalytics, DomainError> {
        let team = self
            .store
            .find_team(team_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Team '{}' not found", team_id)))?;
        let memberships = self.store.list_memberships(team_id).await?;
        let invitations = self.store.list_invitations(team_id).await?;

        Ok(TeamAnalytics {
            team_id: *team.id(),
            team_name: team.name().to_string(),
            status: team.status(),
            total_members: memberships.len() as u64,
            active_members: memberships.iter().filter(|m| m.is_active()).count() as u64,
            pending_invitations: invitations.iter().filter(|i| i.is_pending()).count() as u64,
            created_at: team.created_at(),
        })
    }

    pub async fn global(&self) -> Result<GlobalAnalytics, DomainError> {
        let now = self.clock.utc();
        let mut analytics = GlobalAnalytics::default();

        for team in self.store.list_teams().await? {
            if team.is_deleted() {
                continue;
            }
            analytics.add_team(&team, now);
            analytics.add_memberships(&self.store.list_memberships(team.id()).await?);
            analytics.add_invitations(&self.store.list_invitations(team.id()).await?);
        }
        Ok(analytics)
    }
}

impl std::fmt::Debug for AnalyticsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsService")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::permission::TeamRole;
    use crate::infrastructure::action::{InviteMember, InviteMemberInput};
    use crate::infrastructure::testing::TestEngine;

    #[tokio::test]
    async fn test_team_counts() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        let bob = engine.user("bob");
        let team = engine.active_team(&alice, "Core").await;
        engine.add_member(&alice, &team, &bob, TeamRole::Member).await.into_result().unwrap();
        engine
            .pipeline()
            .run(
                &InviteMember,
                alice.clone(),
                InviteMemberInput {
                    team_id: team.id().to_string(),
                    email: "carol@example.com".into(),
                    ..Default::default()
                },
            )
            .await
            .into_result()
            .unwrap();

        let analytics = AnalyticsService::new(engine.env()).team(team.id()).await.unwrap();

        assert_eq!(analytics.team_name, "Core");
        assert_eq!(analytics.status, TeamStatus::Active);
        assert_eq!(analytics.total_members, 2);
        assert_eq!(analytics.active_members, 2);
        assert_eq!(analytics.pending_invitations, 1);
    }

    #[tokio::test]
    async fn test_global_counts_by_status_and_age() {
        let engine = TestEngine::new().await;
        let alice = engine.user("alice");
        engine.draft_team(&alice, "Old Draft").await;
        engine.clock().advance(Duration::days(40));
        engine.active_team(&alice, "Fresh").await;

        let analytics = AnalyticsService::new(engine.env()).global().await.unwrap();

        assert_eq!(analytics.total_teams, 2);
        assert_eq!(analytics.active_teams, 1);
        assert_eq!(analytics.teams_by_status.get("draft"), Some(&1));
        assert_eq!(analytics.teams_by_status.get("active"), Some(&1));
        assert_eq!(analytics.total_members, 2);
        assert_eq!(analytics.teams_created_today, 1);
        assert_eq!(analytics.teams_created_this_month, 1);
    }

    #[tokio::test]
    async fn test_unknown_team() {
        let engine = TestEngine::new().await;
        let result = AnalyticsService::new(engine.env()).team(&TeamId::generate()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}
