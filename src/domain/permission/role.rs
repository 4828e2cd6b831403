//! Team roles and their default capabilities

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::capability::{capabilities as cap, CapabilitySet, WILDCARD};

/// Role of a principal within a team
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TeamRole {
    /// Full control; at least one must remain once the team has one
    Owner,
    Admin,
    Manager,
    Member,
    Viewer,
    /// Host-defined role resolved through configured defaults
    Custom(String),
}

impl TeamRole {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Member => "member",
            Self::Viewer => "viewer",
            Self::Custom(name) => name,
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

impl From<String> for TeamRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "owner" => Self::Owner,
            "admin" => Self::Admin,
            "manager" => Self::Manager,
            "member" => Self::Member,
            "viewer" => Self::Viewer,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for TeamRole {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<TeamRole> for String {
    fn from(role: TeamRole) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role name to default capability list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleDefaults(HashMap<String, Vec<String>>);

impl RoleDefaults {
    pub fn new(map: HashMap<String, Vec<String>>) -> Self {
        Self(map)
    }

    /// Raw capability names configured for a role; unknown roles get none
    pub fn names_for(&self, role: &TeamRole) -> Vec<String> {
        self.0.get(role.as_str()).cloned().unwrap_or_default()
    }

    pub fn capabilities_for(&self, role: &TeamRole) -> CapabilitySet {
        CapabilitySet::from_names(self.names_for(role))
    }

    pub fn is_known(&self, role: &TeamRole) -> bool {
        self.0.contains_key(role.as_str())
    }
}

impl Default for RoleDefaults {
    fn default() -> Self {
        let entry = |role: &str, caps: &[&str]| {
            (
                role.to_string(),
                caps.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
            )
        };

        Self(HashMap::from([
            entry("owner", &[WILDCARD]),
            entry(
                "admin",
                &[
                    cap::VIEW_TEAM,
                    cap::VIEW_TEAM_MEMBERS,
                    cap::MANAGE_TEAM,
                    cap::UPDATE_TEAM,
                    cap::MANAGE_TEAM_MEMBERS,
                    cap::ADD_TEAM_MEMBER,
                    cap::REMOVE_TEAM_MEMBER,
                    cap::INVITE_TEAM_MEMBER,
                    cap::MANAGE_TEAM_FILES,
                    cap::UPLOAD_FILES,
                    cap::VIEW_TEAM_ANALYTICS,
                ],
            ),
            entry(
                "manager",
                &[
                    cap::VIEW_TEAM,
                    cap::VIEW_TEAM_MEMBERS,
                    cap::MANAGE_TEAM_MEMBERS,
                    cap::ADD_TEAM_MEMBER,
                    cap::INVITE_TEAM_MEMBER,
                    cap::MANAGE_TEAM_FILES,
                    cap::UPLOAD_FILES,
                    cap::VIEW_TEAM_ANALYTICS,
                ],
            ),
            entry(
                "member",
                &[cap::VIEW_TEAM, cap::VIEW_TEAM_MEMBERS, cap::UPLOAD_FILES],
            ),
            entry("viewer", &[cap::VIEW_TEAM]),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde_round_trip() {
        let json = serde_json::to_string(&TeamRole::Manager).unwrap();
        assert_eq!(json, "\"manager\"");
        let custom: TeamRole = serde_json::from_str("\"auditor\"").unwrap();
        assert_eq!(custom, TeamRole::Custom("auditor".to_string()));
    }

    #[test]
    fn test_defaults_shrink_by_role() {
        let defaults = RoleDefaults::default();
        assert!(defaults.capabilities_for(&TeamRole::Owner).is_everything());

        let admin = defaults.capabilities_for(&TeamRole::Admin);
        let member = defaults.capabilities_for(&TeamRole::Member);
        let viewer = defaults.capabilities_for(&TeamRole::Viewer);

        assert!(admin.allows(cap::MANAGE_TEAM));
        assert!(!member.allows(cap::MANAGE_TEAM));
        assert!(member.allows(cap::VIEW_TEAM_MEMBERS));
        assert!(viewer.allows(cap::VIEW_TEAM));
        assert!(!viewer.allows(cap::VIEW_TEAM_MEMBERS));
    }

    #[test]
    fn test_unknown_role_has_no_capabilities() {
        let defaults = RoleDefaults::default();
        let role = TeamRole::Custom("auditor".to_string());
        assert!(!defaults.is_known(&role));
        assert!(defaults.capabilities_for(&role).is_empty());
    }
}
