//! Event envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ids::{EventId, TeamId};
use crate::domain::principal::PrincipalRef;

/// Kind of domain event; listeners subscribe by kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TeamCreated,
    TeamActivated,
    TeamSuspended,
    TeamArchived,
    TeamRestored,
    TeamUpdated,
    MemberJoined,
    MemberLeft,
    MemberRemoved,
    InvitationSent,
    InvitationAccepted,
    InvitationRejected,
    InvitationCancelled,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TeamCreated => "team_created",
            Self::TeamActivated => "team_activated",
            Self::TeamSuspended => "team_suspended",
            Self::TeamArchived => "team_archived",
            Self::TeamRestored => "team_restored",
            Self::TeamUpdated => "team_updated",
            Self::MemberJoined => "member_joined",
            Self::MemberLeft => "member_left",
            Self::MemberRemoved => "member_removed",
            Self::InvitationSent => "invitation_sent",
            Self::InvitationAccepted => "invitation_accepted",
            Self::InvitationRejected => "invitation_rejected",
            Self::InvitationCancelled => "invitation_cancelled",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Single envelope for every domain event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: EventId,
    pub kind: EventKind,
    pub team_id: TeamId,
    pub actor: PrincipalRef,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(
        kind: EventKind,
        team_id: TeamId,
        actor: PrincipalRef,
        payload: Value,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            kind,
            team_id,
            actor,
            payload,
            occurred_at,
        }
    }
}
