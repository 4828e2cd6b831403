//! In-memory team store

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::activity::ActivityRecord;
use crate::domain::ids::{InvitationId, MembershipId, TeamId};
use crate::domain::invitation::Invitation;
use crate::domain::membership::Membership;
use crate::domain::principal::PrincipalRef;
use crate::domain::store::{constraints, ChangeSet, TeamStore, Write};
use crate::domain::team::Team;
use crate::domain::DomainError;

#[derive(Debug, Clone, Default)]
struct State {
    teams: HashMap<TeamId, Team>,
    memberships: HashMap<MembershipId, Membership>,
    invitations: HashMap<InvitationId, Invitation>,
    issued_tokens: HashSet<String>,
    activity: Vec<ActivityRecord>,
}

/// Thread-safe in-memory team store
///
/// Commits apply to a staged copy of the state under the write lock and
/// swap it in only when every write succeeds. Data is lost when the
/// process terminates.
#[derive(Debug, Default)]
pub struct InMemoryTeamStore {
    state: RwLock<State>,
}

impl InMemoryTeamStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T, DomainError> {
        let state = self
            .state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(f(&state))
    }
}

impl State {
    fn apply(&mut self, write: Write) -> Result<(), DomainError> {
        match write {
            Write::InsertTeam(team) => {
                if self.teams.contains_key(team.id()) {
                    return Err(DomainError::conflict(format!(
                        "Team '{}' already exists",
                        team.id()
                    )));
                }
                self.check_slug(&team)?;
                self.teams.insert(*team.id(), team);
            }
            Write::UpdateTeam {
                mut team,
                expected_version,
            } => {
                let stored = self.teams.get(team.id()).ok_or_else(|| {
                    DomainError::not_found(format!("Team '{}' not found", team.id()))
                })?;
                if stored.version() != expected_version {
                    return Err(DomainError::stale_write(format!(
                        "Team '{}' changed since it was read",
                        team.id()
                    )));
                }
                team.set_members_count(stored.members_count());
                team.set_version(expected_version + 1);
                self.check_slug(&team)?;
                self.teams.insert(*team.id(), team);
            }
            Write::AdjustMembers {
                team_id,
                delta,
                ceiling,
            } => {
                let team = self.teams.get_mut(&team_id).ok_or_else(|| {
                    DomainError::not_found(format!("Team '{}' not found", team_id))
                })?;
                let next = i64::from(team.members_count()) + i64::from(delta);
                if next < 0 {
                    return Err(DomainError::internal(format!(
                        "Member count of team '{}' would become negative",
                        team_id
                    )));
                }
                if let Some(ceiling) = ceiling {
                    if delta > 0 && next > i64::from(ceiling) {
                        return Err(DomainError::limit_exceeded(format!(
                            "Team '{}' has reached its limit of {} members",
                            team_id, ceiling
                        )));
                    }
                }
                team.set_members_count(next as u32);
            }
            Write::SetMemberCount { team_id, count } => {
                let team = self.teams.get_mut(&team_id).ok_or_else(|| {
                    DomainError::not_found(format!("Team '{}' not found", team_id))
                })?;
                team.set_members_count(count);
            }
            Write::InsertMembership(membership) => {
                if self.memberships.contains_key(membership.id()) {
                    return Err(DomainError::conflict(format!(
                        "Membership '{}' already exists",
                        membership.id()
                    )));
                }
                self.check_membership_slot(&membership)?;
                self.memberships.insert(*membership.id(), membership);
            }
            Write::UpdateMembership {
                mut membership,
                expected_version,
            } => {
                let stored = self.memberships.get(membership.id()).ok_or_else(|| {
                    DomainError::not_found(format!("Membership '{}' not found", membership.id()))
                })?;
                if stored.version() != expected_version {
                    return Err(DomainError::stale_write(format!(
                        "Membership '{}' changed since it was read",
                        membership.id()
                    )));
                }
                self.check_membership_slot(&membership)?;
                membership.set_version(expected_version + 1);
                self.memberships.insert(*membership.id(), membership);
            }
            Write::InsertInvitation(invitation) => {
                if self.invitations.contains_key(invitation.id()) {
                    return Err(DomainError::conflict(format!(
                        "Invitation '{}' already exists",
                        invitation.id()
                    )));
                }
                self.check_token(invitation.token())?;
                self.check_pending_slot(&invitation)?;
                self.issued_tokens.insert(invitation.token().to_string());
                self.invitations.insert(*invitation.id(), invitation);
            }
            Write::UpdateInvitation {
                mut invitation,
                expected_version,
            } => {
                let stored = self.invitations.get(invitation.id()).ok_or_else(|| {
                    DomainError::not_found(format!("Invitation '{}' not found", invitation.id()))
                })?;
                if stored.version() != expected_version {
                    return Err(DomainError::stale_write(format!(
                        "Invitation '{}' changed since it was read",
                        invitation.id()
                    )));
                }
                if stored.token() != invitation.token() {
                    self.check_token(invitation.token())?;
                    self.issued_tokens.insert(invitation.token().to_string());
                }
                self.check_pending_slot(&invitation)?;
                invitation.set_version(expected_version + 1);
                self.invitations.insert(*invitation.id(), invitation);
            }
            Write::AppendActivity(record) => self.activity.push(record),
            Write::PurgeTeam(team_id) => {
                match self.teams.get(&team_id) {
                    Some(team) if team.is_deleted() => {}
                    Some(_) => {
                        return Err(DomainError::conflict(format!(
                            "Team '{}' is not deleted and cannot be purged",
                            team_id
                        )));
                    }
                    None => {
                        return Err(DomainError::not_found(format!("Team '{}' not found", team_id)));
                    }
                }

                // Issued tokens stay retired so a purged token is never reissued.
                self.invitations.retain(|_, i| i.team_id() != &team_id);
                self.memberships.retain(|_, m| m.team_id() != &team_id);
                self.activity.retain(|r| r.team_id != team_id);
                self.teams.remove(&team_id);
            }
        }
        Ok(())
    }

    fn check_slug(&self, team: &Team) -> Result<(), DomainError> {
        let taken = self
            .teams
            .values()
            .any(|t| t.id() != team.id() && !t.is_deleted() && t.slug() == team.slug());
        if taken {
            return Err(DomainError::unique_violation(
                constraints::TEAM_SLUG,
                format!("Slug '{}' is already taken", team.slug()),
            ));
        }
        Ok(())
    }

    fn check_membership_slot(&self, membership: &Membership) -> Result<(), DomainError> {
        if !membership.occupies_seat() {
            return Ok(());
        }
        let taken = self.memberships.values().any(|m| {
            m.id() != membership.id()
                && m.occupies_seat()
                && m.team_id() == membership.team_id()
                && m.user() == membership.user()
        });
        if taken {
            return Err(DomainError::unique_violation(
                constraints::MEMBERSHIP,
                format!("{} is already a member of this team", membership.user()),
            ));
        }
        Ok(())
    }

    fn check_pending_slot(&self, invitation: &Invitation) -> Result<(), DomainError> {
        if !invitation.is_pending() {
            return Ok(());
        }
        let taken = self.invitations.values().any(|i| {
            i.id() != invitation.id()
                && i.is_pending()
                && i.team_id() == invitation.team_id()
                && i.email() == invitation.email()
        });
        if taken {
            return Err(DomainError::unique_violation(
                constraints::PENDING_INVITATION,
                format!(
                    "A pending invitation for {} already exists",
                    invitation.email()
                ),
            ));
        }
        Ok(())
    }

    fn check_token(&self, token: &str) -> Result<(), DomainError> {
        if self.issued_tokens.contains(token) {
            return Err(DomainError::unique_violation(
                constraints::INVITATION_TOKEN,
                "Invitation token already issued",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TeamStore for InMemoryTeamStore {
    async fn find_team(&self, id: &TeamId) -> Result<Option<Team>, DomainError> {
        self.read(|s| s.teams.get(id).filter(|t| !t.is_deleted()).cloned())
    }

    async fn find_team_by_slug(&self, slug: &str) -> Result<Option<Team>, DomainError> {
        self.read(|s| {
            s.teams
                .values()
                .find(|t| !t.is_deleted() && t.slug() == slug)
                .cloned()
        })
    }

    async fn list_teams(&self) -> Result<Vec<Team>, DomainError> {
        self.read(|s| {
            let mut teams: Vec<Team> = s.teams.values().filter(|t| !t.is_deleted()).cloned().collect();
            teams.sort_by_key(|t| t.created_at());
            teams
        })
    }

    async fn list_teams_owned_by(&self, owner: &PrincipalRef) -> Result<Vec<Team>, DomainError> {
        self.read(|s| {
            let mut teams: Vec<Team> = s
                .teams
                .values()
                .filter(|t| !t.is_deleted() && t.is_owned_by(owner))
                .cloned()
                .collect();
            teams.sort_by_key(|t| t.created_at());
            teams
        })
    }

    async fn list_deleted_teams(&self, before: DateTime<Utc>) -> Result<Vec<Team>, DomainError> {
        self.read(|s| {
            let mut teams: Vec<Team> = s
                .teams
                .values()
                .filter(|t| t.deleted_at().is_some_and(|at| at < before))
                .cloned()
                .collect();
            teams.sort_by_key(|t| t.deleted_at());
            teams
        })
    }

    async fn find_membership(
        &self,
        team: &TeamId,
        user: &PrincipalRef,
    ) -> Result<Option<Membership>, DomainError> {
        self.read(|s| {
            s.memberships
                .values()
                .find(|m| m.occupies_seat() && m.team_id() == team && m.user() == user)
                .cloned()
        })
    }

    async fn list_memberships(&self, team: &TeamId) -> Result<Vec<Membership>, DomainError> {
        self.read(|s| {
            let mut memberships: Vec<Membership> = s
                .memberships
                .values()
                .filter(|m| m.occupies_seat() && m.team_id() == team)
                .cloned()
                .collect();
            memberships.sort_by_key(|m| m.joined_at());
            memberships
        })
    }

    async fn list_memberships_for(&self, user: &PrincipalRef) -> Result<Vec<Membership>, DomainError> {
        self.read(|s| {
            s.memberships
                .values()
                .filter(|m| m.occupies_seat() && m.user() == user)
                .cloned()
                .collect()
        })
    }

    async fn find_invitation(&self, id: &InvitationId) -> Result<Option<Invitation>, DomainError> {
        self.read(|s| s.invitations.get(id).cloned())
    }

    async fn find_invitation_by_token(&self, token: &str) -> Result<Option<Invitation>, DomainError> {
        self.read(|s| s.invitations.values().find(|i| i.token() == token).cloned())
    }

    async fn find_pending_invitation(
        &self,
        team: &TeamId,
        email: &str,
    ) -> Result<Option<Invitation>, DomainError> {
        self.read(|s| {
            s.invitations
                .values()
                .find(|i| i.is_pending() && i.team_id() == team && i.email() == email)
                .cloned()
        })
    }

    async fn list_invitations(&self, team: &TeamId) -> Result<Vec<Invitation>, DomainError> {
        self.read(|s| {
            let mut invitations: Vec<Invitation> = s
                .invitations
                .values()
                .filter(|i| i.team_id() == team)
                .cloned()
                .collect();
            invitations.sort_by_key(|i| i.created_at());
            invitations
        })
    }

    async fn token_exists(&self, token: &str) -> Result<bool, DomainError> {
        self.read(|s| s.issued_tokens.contains(token))
    }

    async fn list_expired_invitations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, DomainError> {
        self.read(|s| {
            s.invitations
                .values()
                .filter(|i| i.is_pending() && i.expires_at() < cutoff)
                .cloned()
                .collect()
        })
    }

    async fn list_activity(&self, team: &TeamId) -> Result<Vec<ActivityRecord>, DomainError> {
        self.read(|s| {
            s.activity
                .iter()
                .filter(|r| &r.team_id == team)
                .cloned()
                .collect()
        })
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), DomainError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        let mut staged = state.clone();
        for write in changes.into_writes() {
            staged.apply(write)?;
        }

        *state = staged;
        Ok(())
    }
}
