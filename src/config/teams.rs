//! Read-only snapshot of the team engine's tunables

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::lifecycle::{StateMachine, TransitionName};
use crate::domain::permission::{RoleDefaults, TeamRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamsConfig {
    /// Role name to default capability list
    pub roles: RoleDefaults,
    /// Role given to directly added members when none is specified
    pub default_role: String,
    pub invitations: InvitationConfig,
    pub limits: LimitsConfig,
    pub features: FeatureToggles,
    /// Per-transition required capabilities; missing entries use the built-in table
    pub transitions: HashMap<TransitionName, Vec<String>>,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvitationConfig {
    pub expires_after_days: i64,
    pub max_pending_per_team: u32,
    pub resend_limit: u32,
    pub resend_cooldown_hours: i64,
    pub token_length: usize,
    /// Delay before the reminder scheduled after sending
    pub reminder_after_days: i64,
    pub invitable_roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_members_per_team: u32,
    pub max_files_per_team: u32,
    pub max_storage_gb: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureToggles {
    /// Enforce tenant scope equality on every entity read
    pub tenancy: bool,
    /// Enable lifecycle transitions other than creation
    pub workflows: bool,
    /// Dispatch notification sub-actions
    pub notifications: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound for the Execute phase including commit
    pub execute_timeout_ms: u64,
    /// Run sub-actions on a spawned task instead of before returning
    pub detach_side_effects: bool,
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            roles: RoleDefaults::default(),
            default_role: "member".to_string(),
            invitations: InvitationConfig::default(),
            limits: LimitsConfig::default(),
            features: FeatureToggles::default(),
            transitions: HashMap::new(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            expires_after_days: 7,
            max_pending_per_team: 50,
            resend_limit: 3,
            resend_cooldown_hours: 24,
            token_length: 64,
            reminder_after_days: 3,
            invitable_roles: vec![
                "member".to_string(),
                "admin".to_string(),
                "manager".to_string(),
            ],
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_members_per_team: 100,
            max_files_per_team: 1000,
            max_storage_gb: 10,
        }
    }
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            tenancy: false,
            workflows: true,
            notifications: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            execute_timeout_ms: 5_000,
            detach_side_effects: false,
        }
    }
}

impl TeamsConfig {
    pub fn state_machine(&self) -> StateMachine {
        StateMachine::with_permissions(&self.transitions)
    }

    pub fn default_role(&self) -> TeamRole {
        TeamRole::from(self.default_role.as_str())
    }

    pub fn is_invitable(&self, role: &TeamRole) -> bool {
        self.invitations
            .invitable_roles
            .iter()
            .any(|r| r == role.as_str())
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline.execute_timeout_ms)
    }

    pub fn invitation_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.invitations.expires_after_days)
    }

    pub fn resend_cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.invitations.resend_cooldown_hours)
    }

    pub fn reminder_delay(&self) -> chrono::Duration {
        chrono::Duration::days(self.invitations.reminder_after_days)
    }

    /// Settings every new team starts with
    pub fn default_team_settings(&self) -> serde_json::Map<String, serde_json::Value> {
        let settings = serde_json::json!({
            "visibility": "private",
            "features": {
                "file_sharing": true,
                "invitations": true,
            },
            "limits": {
                "max_members": self.limits.max_members_per_team,
                "max_files": self.limits.max_files_per_team,
                "max_storage_gb": self.limits.max_storage_gb,
            },
        });
        match settings {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        }
    }
}
