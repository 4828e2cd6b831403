//! Effective capability resolution for (team, principal) pairs

use std::sync::Arc;

use tracing::debug;

use crate::domain::ids::TeamId;
use crate::domain::membership::Membership;
use crate::domain::permission::{CapabilitySet, RoleDefaults, TeamRole};
use crate::domain::principal::PrincipalRef;
use crate::domain::store::TeamStore;
use crate::domain::team::Team;
use crate::domain::DomainError;

/// Resolves capabilities from role defaults and per-membership overrides.
///
/// The team's owner reference passes every check regardless of membership.
/// Otherwise only an active membership grants anything: its explicit
/// permissions when present, else its role's defaults.
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    store: Arc<dyn TeamStore>,
    roles: RoleDefaults,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn TeamStore>, roles: RoleDefaults) -> Self {
        Self { store, roles }
    }

    pub fn roles(&self) -> &RoleDefaults {
        &self.roles
    }

    /// Capabilities granted by a membership alone
    pub fn membership_capabilities(&self, membership: &Membership) -> CapabilitySet {
        if !membership.is_active() {
            return CapabilitySet::empty();
        }
        if membership.permissions().is_empty() {
            self.roles.capabilities_for(membership.role())
        } else {
            CapabilitySet::from_names(membership.permissions().iter().cloned())
        }
    }

    /// Resolves against an already loaded team with a fresh membership read
    pub async fn resolve_for_team(
        &self,
        team: &Team,
        user: &PrincipalRef,
    ) -> Result<CapabilitySet, DomainError> {
        if team.is_owned_by(user) {
            return Ok(CapabilitySet::everything());
        }

        let capabilities = self
            .store
            .find_membership(team.id(), user)
            .await?
            .map(|m| self.membership_capabilities(&m))
            .unwrap_or_default();

        debug!(
            team_id = %team.id(),
            user = %user,
            everything = capabilities.is_everything(),
            "Resolved capabilities"
        );
        Ok(capabilities)
    }

    /// Empty when the team does not exist
    pub async fn resolve(
        &self,
        team_id: &TeamId,
        user: &PrincipalRef,
    ) -> Result<CapabilitySet, DomainError> {
        match self.store.find_team(team_id).await? {
            Some(team) => self.resolve_for_team(&team, user).await,
            None => Ok(CapabilitySet::empty()),
        }
    }

    pub async fn has_permission(
        &self,
        team_id: &TeamId,
        user: &PrincipalRef,
        capability: &str,
    ) -> Result<bool, DomainError> {
        Ok(self.resolve(team_id, user).await?.allows(capability))
    }

    /// True when `user` holds an active membership with one of `roles`
    pub async fn has_any_role(
        &self,
        team_id: &TeamId,
        user: &PrincipalRef,
        roles: &[TeamRole],
    ) -> Result<bool, DomainError> {
        Ok(self
            .store
            .find_membership(team_id, user)
            .await?
            .is_some_and(|m| m.is_active() && roles.contains(m.role())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::permission::capabilities as cap;
    use crate::domain::store::{ChangeSet, MockTeamStore};
    use crate::domain::team::TeamType;
    use crate::infrastructure::storage::InMemoryTeamStore;
    use chrono::Utc;

    async fn seeded(memberships: Vec<Membership>, team: Team) -> PermissionResolver {
        let store = Arc::new(InMemoryTeamStore::new());
        let mut changes = ChangeSet::new();
        changes.insert_team(team);
        for membership in memberships {
            changes.insert_membership(membership);
        }
        store.commit(changes).await.unwrap();
        PermissionResolver::new(store, RoleDefaults::default())
    }

    fn team() -> Team {
        Team::new(TeamId::generate(), "Permissions", TeamType::Project, Utc::now())
            .unwrap()
            .with_owner(PrincipalRef::new("organization", "acme"))
    }

    fn member(team: &Team, id: &str, role: TeamRole, permissions: &[&str]) -> Membership {
        Membership::new(
            *team.id(),
            PrincipalRef::user(id),
            role,
            permissions.iter().map(|p| p.to_string()).collect(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_wildcard_membership_allows_anything() {
        let team = team();
        let resolver = seeded(vec![member(&team, "1", TeamRole::Member, &["*"])], team.clone()).await;

        assert!(resolver
            .has_permission(team.id(), &PrincipalRef::user("1"), "anything")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_explicit_permissions_override_role() {
        let team = team();
        let resolver = seeded(
            vec![member(&team, "1", TeamRole::Admin, &[cap::VIEW_TEAM])],
            team.clone(),
        )
        .await;
        let user = PrincipalRef::user("1");

        assert!(resolver.has_permission(team.id(), &user, cap::VIEW_TEAM).await.unwrap());
        assert!(!resolver.has_permission(team.id(), &user, cap::DELETE_TEAM).await.unwrap());
        assert!(!resolver.has_permission(team.id(), &user, cap::MANAGE_TEAM).await.unwrap());
    }

    #[tokio::test]
    async fn test_role_defaults_apply_without_overrides() {
        let team = team();
        let resolver = seeded(vec![member(&team, "1", TeamRole::Manager, &[])], team.clone()).await;
        let caps = resolver.resolve(team.id(), &PrincipalRef::user("1")).await.unwrap();

        assert!(caps.allows(cap::INVITE_TEAM_MEMBER));
        assert!(!caps.allows(cap::DELETE_TEAM));
    }

    #[tokio::test]
    async fn test_no_or_inactive_membership_is_empty() {
        let team = team();
        let mut removed = member(&team, "2", TeamRole::Admin, &["*"]);
        removed.archive(Utc::now());
        let resolver = seeded(vec![removed], team.clone()).await;

        assert!(resolver.resolve(team.id(), &PrincipalRef::user("1")).await.unwrap().is_empty());
        assert!(resolver.resolve(team.id(), &PrincipalRef::user("2")).await.unwrap().is_empty());
        assert!(!resolver
            .has_any_role(team.id(), &PrincipalRef::user("2"), &[TeamRole::Admin])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_owner_reference_bypasses_membership() {
        let team = team();
        let resolver = seeded(vec![], team.clone()).await;

        let caps = resolver
            .resolve(team.id(), &PrincipalRef::new("organization", "acme"))
            .await
            .unwrap();
        assert!(caps.is_everything());

        // Same id, different kind: no bypass
        let caps = resolver
            .resolve(team.id(), &PrincipalRef::user("acme"))
            .await
            .unwrap();
        assert!(caps.is_empty());
    }

    #[tokio::test]
    async fn test_has_any_role() {
        let team = team();
        let resolver = seeded(vec![member(&team, "1", TeamRole::Manager, &[])], team.clone()).await;
        let user = PrincipalRef::user("1");

        assert!(resolver
            .has_any_role(team.id(), &user, &[TeamRole::Owner, TeamRole::Manager])
            .await
            .unwrap());
        assert!(!resolver
            .has_any_role(team.id(), &user, &[TeamRole::Owner])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let mut store = MockTeamStore::new();
        store
            .expect_find_team()
            .returning(|_| Err(DomainError::storage("down")));
        let resolver = PermissionResolver::new(Arc::new(store), RoleDefaults::default());

        assert!(resolver
            .resolve(&TeamId::generate(), &PrincipalRef::user("1"))
            .await
            .is_err());
    }
}
