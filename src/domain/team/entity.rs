//! Team entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::validation::{slugify, validate_team_name, TeamValidationError};
use crate::domain::ids::{TeamId, TenantId};
use crate::domain::principal::PrincipalRef;

/// Lifecycle status of a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    /// Initial state; not yet usable
    #[default]
    Draft,
    Active,
    Suspended,
    /// Terminal for normal flow, but restorable
    Archived,
}

impl TeamStatus {
    pub const ALL: [TeamStatus; 4] = [
        TeamStatus::Draft,
        TeamStatus::Active,
        TeamStatus::Suspended,
        TeamStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Archived => "archived",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for TeamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TeamStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown team status '{}'", s))
    }
}

/// Kind of team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TeamType {
    #[default]
    Project,
    Department,
    Organization,
    Community,
    Custom,
}

impl TeamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Department => "department",
            Self::Organization => "organization",
            Self::Community => "community",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for TeamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TeamType {
    type Err = TeamValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "department" => Ok(Self::Department),
            "organization" => Ok(Self::Organization),
            "community" => Ok(Self::Community),
            "custom" => Ok(Self::Custom),
            other => Err(TeamValidationError::UnknownType(other.to_string())),
        }
    }
}

/// Team entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    id: TeamId,
    name: String,
    /// Unique among non-deleted teams, derived from `name`
    slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    team_type: TeamType,
    status: TeamStatus,
    settings: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant: Option<TenantId>,
    /// Explicit owner reference; bypasses every permission check
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<PrincipalRef>,
    members_count: u32,
    files_count: u32,
    storage_used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_activity_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Team {
    /// Create a new team in the `draft` state
    pub fn new(
        id: TeamId,
        name: impl Into<String>,
        team_type: TeamType,
        now: DateTime<Utc>,
    ) -> Result<Self, TeamValidationError> {
        let name = name.into().trim().to_string();
        validate_team_name(&name)?;

        Ok(Self {
            id,
            slug: slugify(&name),
            name,
            description: None,
            team_type,
            status: TeamStatus::Draft,
            settings: Map::new(),
            tenant: None,
            owner: None,
            members_count: 0,
            files_count: 0,
            storage_used: 0,
            last_activity_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_owner(mut self, owner: PrincipalRef) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.tenant = Some(tenant);
        self
    }

    pub fn with_settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings = settings;
        self
    }

    // Getters

    pub fn id(&self) -> &TeamId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn team_type(&self) -> TeamType {
        self.team_type
    }

    pub fn status(&self) -> TeamStatus {
        self.status
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }

    pub fn owner(&self) -> Option<&PrincipalRef> {
        self.owner.as_ref()
    }

    pub fn is_owned_by(&self, principal: &PrincipalRef) -> bool {
        self.owner.as_ref() == Some(principal)
    }

    pub fn members_count(&self) -> u32 {
        self.members_count
    }

    pub fn files_count(&self) -> u32 {
        self.files_count
    }

    pub fn storage_used(&self) -> u64 {
        self.storage_used
    }

    pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_activity_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Member ceiling: `settings.limits.max_members` when set, else `default`
    pub fn member_ceiling(&self, default: u32) -> u32 {
        self.settings
            .get("limits")
            .and_then(|limits| limits.get("max_members"))
            .and_then(Value::as_u64)
            .map(|max| max.min(u32::MAX as u64) as u32)
            .unwrap_or(default)
    }

    /// Lifecycle audit entry recorded for a transition, if any
    pub fn lifecycle_record(&self, transition: &str) -> Option<&Value> {
        self.settings
            .get("lifecycle")
            .and_then(|lifecycle| lifecycle.get(transition))
    }

    // Mutators

    /// Rename the team, regenerating its slug
    pub fn rename(
        &mut self,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TeamValidationError> {
        let name = name.into().trim().to_string();
        validate_team_name(&name)?;
        self.slug = slugify(&name);
        self.name = name;
        self.touch(now);
        Ok(())
    }

    pub fn set_description(&mut self, description: Option<String>, now: DateTime<Utc>) {
        self.description = description;
        self.touch(now);
    }

    pub fn set_type(&mut self, team_type: TeamType, now: DateTime<Utc>) {
        self.team_type = team_type;
        self.touch(now);
    }

    pub fn set_owner(&mut self, owner: Option<PrincipalRef>, now: DateTime<Utc>) {
        self.owner = owner;
        self.touch(now);
    }

    /// Deep-merge `patch` into the settings blob; objects merge, other values replace
    pub fn merge_settings(&mut self, patch: Map<String, Value>, now: DateTime<Utc>) {
        merge_maps(&mut self.settings, patch);
        self.touch(now);
    }

    /// Lays `defaults` underneath the current settings; keys the team already
    /// sets win. Returns false when nothing was missing.
    pub fn fill_default_settings(&mut self, defaults: Map<String, Value>, now: DateTime<Utc>) -> bool {
        let mut merged = defaults;
        merge_maps(&mut merged, self.settings.clone());
        if merged == self.settings {
            return false;
        }
        self.settings = merged;
        self.touch(now);
        true
    }

    /// Move to `status` and store `audit` under `settings.lifecycle.<transition>`
    pub fn apply_transition(
        &mut self,
        transition: &str,
        status: TeamStatus,
        audit: Value,
        now: DateTime<Utc>,
    ) {
        let mut entry = Map::new();
        entry.insert(transition.to_string(), audit);
        let mut patch = Map::new();
        patch.insert("lifecycle".to_string(), Value::Object(entry));
        merge_maps(&mut self.settings, patch);

        self.status = status;
        self.last_activity_at = Some(now);
        self.touch(now);
    }

    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = Some(now);
    }

    pub(crate) fn set_members_count(&mut self, count: u32) {
        self.members_count = count;
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

fn merge_maps(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_maps(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn team() -> Team {
        Team::new(TeamId::generate(), "Platform Team", TeamType::Project, Utc::now()).unwrap()
    }

    #[test]
    fn test_default_settings_fill_only_missing_keys() {
        let mut team = team();
        let patch = json!({ "visibility": "public", "limits": { "max_members": 3 } });
        team.merge_settings(patch.as_object().cloned().unwrap(), Utc::now());

        let defaults = json!({
            "visibility": "private",
            "limits": { "max_members": 50, "max_files": 1000 },
        });
        assert!(team.fill_default_settings(defaults.as_object().cloned().unwrap(), Utc::now()));
        assert_eq!(team.settings()["visibility"], "public");
        assert_eq!(team.settings()["limits"]["max_members"], 3);
        assert_eq!(team.settings()["limits"]["max_files"], 1000);

        assert!(!team.fill_default_settings(defaults.as_object().cloned().unwrap(), Utc::now()));
    }

    #[test]
    fn test_team_creation() {
        let team = team();

        assert_eq!(team.name(), "Platform Team");
        assert_eq!(team.slug(), "platform-team");
        assert_eq!(team.status(), TeamStatus::Draft);
        assert_eq!(team.members_count(), 0);
        assert_eq!(team.version(), 0);
        assert!(team.description().is_none());
    }

    #[test]
    fn test_team_invalid_name() {
        assert!(Team::new(TeamId::generate(), "x", TeamType::Project, Utc::now()).is_err());
    }

    #[test]
    fn test_rename_regenerates_slug() {
        let mut team = team();
        let later = team.updated_at() + chrono::Duration::seconds(5);

        team.rename("Data Science", later).unwrap();
        assert_eq!(team.slug(), "data-science");
        assert_eq!(team.updated_at(), later);
    }

    #[test]
    fn test_merge_settings_is_deep() {
        let mut team = team().with_settings(
            json!({"limits": {"max_members": 10, "max_files": 5}, "visibility": "private"})
                .as_object()
                .cloned()
                .unwrap(),
        );

        team.merge_settings(
            json!({"limits": {"max_members": 20}, "visibility": "public"})
                .as_object()
                .cloned()
                .unwrap(),
            Utc::now(),
        );

        assert_eq!(team.settings()["limits"]["max_members"], 20);
        assert_eq!(team.settings()["limits"]["max_files"], 5);
        assert_eq!(team.settings()["visibility"], "public");
        assert_eq!(team.member_ceiling(100), 20);
    }

    #[test]
    fn test_member_ceiling_default() {
        assert_eq!(team().member_ceiling(100), 100);
    }

    #[test]
    fn test_apply_transition_records_audit() {
        let mut team = team();
        team.apply_transition(
            "activate",
            TeamStatus::Active,
            json!({"previous_status": "draft"}),
            Utc::now(),
        );

        assert_eq!(team.status(), TeamStatus::Active);
        assert_eq!(
            team.lifecycle_record("activate").unwrap()["previous_status"],
            "draft"
        );
        assert!(team.last_activity_at().is_some());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("archived".parse::<TeamStatus>(), Ok(TeamStatus::Archived));
        assert!("deleted".parse::<TeamStatus>().is_err());
    }

    #[test]
    fn test_type_parse() {
        assert_eq!("community".parse::<TeamType>(), Ok(TeamType::Community));
        assert_eq!(
            "guild".parse::<TeamType>(),
            Err(TeamValidationError::UnknownType("guild".to_string()))
        );
    }
}
