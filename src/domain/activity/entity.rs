//! Activity record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ids::{ActivityId, TeamId};
use crate::domain::principal::PrincipalRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: ActivityId,
    pub team_id: TeamId,
    /// Entity type the action touched, e.g. `team`, `membership`, `invitation`
    pub subject_type: String,
    pub subject_id: String,
    pub actor: PrincipalRef,
    pub action: String,
    pub properties: Value,
    pub recorded_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(
        team_id: TeamId,
        subject_type: impl Into<String>,
        subject_id: impl ToString,
        actor: PrincipalRef,
        action: impl Into<String>,
        properties: Value,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActivityId::generate(),
            team_id,
            subject_type: subject_type.into(),
            subject_id: subject_id.to_string(),
            actor,
            action: action.into(),
            properties,
            recorded_at,
        }
    }
}
