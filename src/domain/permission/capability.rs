//! Capability identifiers and sets

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Grants every capability
pub const WILDCARD: &str = "*";

/// Well-known capability names
pub mod capabilities {
    pub const VIEW_TEAM: &str = "view_team";
    pub const VIEW_TEAM_MEMBERS: &str = "view_team_members";
    pub const MANAGE_TEAM: &str = "manage_team";
    pub const UPDATE_TEAM: &str = "update_team";
    pub const DELETE_TEAM: &str = "delete_team";
    pub const MANAGE_TEAM_MEMBERS: &str = "manage_team_members";
    pub const ADD_TEAM_MEMBER: &str = "add_team_member";
    pub const REMOVE_TEAM_MEMBER: &str = "remove_team_member";
    pub const INVITE_TEAM_MEMBER: &str = "invite_team_member";
    pub const MANAGE_TEAM_FILES: &str = "manage_team_files";
    pub const UPLOAD_FILES: &str = "upload_files";
    pub const VIEW_TEAM_ANALYTICS: &str = "view_team_analytics";
    pub const ACTIVATE_TEAM: &str = "activate_team";
    pub const SUSPEND_TEAM: &str = "suspend_team";
    pub const ARCHIVE_TEAM: &str = "archive_team";
    pub const RESTORE_TEAM: &str = "restore_team";
}

/// Effective capabilities of a principal on a team
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    all: bool,
    granted: BTreeSet<String>,
}

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A set that passes every check
    pub fn everything() -> Self {
        Self {
            all: true,
            granted: BTreeSet::new(),
        }
    }

    /// Builds a set from raw names, expanding the wildcard
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::empty();
        for name in names {
            let name = name.into();
            if name == WILDCARD {
                set.all = true;
            } else if !name.is_empty() {
                set.granted.insert(name);
            }
        }
        set
    }

    pub fn is_everything(&self) -> bool {
        self.all
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.granted.is_empty()
    }

    pub fn allows(&self, capability: &str) -> bool {
        self.all || self.granted.contains(capability)
    }

    /// True when at least one of `capabilities` is granted
    pub fn allows_any(&self, capabilities: &[&str]) -> bool {
        self.all || capabilities.iter().any(|c| self.granted.contains(*c))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.granted.iter().map(String::as_str)
    }
}
