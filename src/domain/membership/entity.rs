//! Membership entity linking a principal to a team

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{MembershipId, TeamId, TenantId};
use crate::domain::permission::TeamRole;
use crate::domain::principal::PrincipalRef;

/// Status of a membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    /// Soft-deleted; frees the (team, user) slot
    Removed,
    /// Set by a destructive archive, reverted by restore
    Archived,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
            Self::Removed => "removed",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Membership entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    id: MembershipId,
    team_id: TeamId,
    user: PrincipalRef,
    role: TeamRole,
    /// Explicit capability list, may contain the wildcard
    permissions: Vec<String>,
    status: MembershipStatus,
    joined_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_activity_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant: Option<TenantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    invited_by: Option<PrincipalRef>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Membership {
    pub fn new(
        team_id: TeamId,
        user: PrincipalRef,
        role: TeamRole,
        permissions: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MembershipId::generate(),
            team_id,
            user,
            role,
            permissions,
            status: MembershipStatus::Active,
            joined_at: now,
            last_activity_at: None,
            tenant: None,
            invited_by: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn with_tenant(mut self, tenant: Option<TenantId>) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn with_invited_by(mut self, inviter: PrincipalRef) -> Self {
        self.invited_by = Some(inviter);
        self
    }

    // Getters

    pub fn id(&self) -> &MembershipId {
        &self.id
    }

    pub fn team_id(&self) -> &TeamId {
        &self.team_id
    }

    pub fn user(&self) -> &PrincipalRef {
        &self.user
    }

    pub fn role(&self) -> &TeamRole {
        &self.role
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn status(&self) -> MembershipStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// Non-removed memberships hold the (team, user) slot and count as members
    pub fn occupies_seat(&self) -> bool {
        self.status != MembershipStatus::Removed
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_activity_at
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }

    pub fn invited_by(&self) -> Option<&PrincipalRef> {
        self.invited_by.as_ref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    // Mutators

    /// Change the role and replace the explicit permissions
    pub fn change_role(&mut self, role: TeamRole, permissions: Vec<String>, now: DateTime<Utc>) {
        self.role = role;
        self.permissions = permissions;
        self.touch(now);
    }

    pub fn remove(&mut self, now: DateTime<Utc>) {
        self.set_status(MembershipStatus::Removed, now);
    }

    pub fn archive(&mut self, now: DateTime<Utc>) {
        self.set_status(MembershipStatus::Archived, now);
    }

    pub fn reactivate(&mut self, now: DateTime<Utc>) {
        self.set_status(MembershipStatus::Active, now);
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn set_status(&mut self, status: MembershipStatus, now: DateTime<Utc>) {
        self.status = status;
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.last_activity_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership() -> Membership {
        Membership::new(
            TeamId::generate(),
            PrincipalRef::user("1"),
            TeamRole::Member,
            vec!["view_team".to_string()],
            Utc::now(),
        )
    }

    #[test]
    fn test_new_membership_is_active() {
        let m = membership();
        assert!(m.is_active());
        assert!(m.occupies_seat());
        assert_eq!(m.role(), &TeamRole::Member);
    }

    #[test]
    fn test_removed_frees_seat() {
        let mut m = membership();
        m.remove(Utc::now());
        assert!(!m.is_active());
        assert!(!m.occupies_seat());
    }

    #[test]
    fn test_archived_keeps_seat() {
        let mut m = membership();
        m.archive(Utc::now());
        assert!(!m.is_active());
        assert!(m.occupies_seat());
        m.reactivate(Utc::now());
        assert!(m.is_active());
    }

    #[test]
    fn test_change_role() {
        let mut m = membership();
        m.change_role(TeamRole::Owner, vec!["*".to_string()], Utc::now());
        assert!(m.role().is_owner());
        assert_eq!(m.permissions(), ["*".to_string()]);
    }
}
