//! Notification request types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ids::TeamId;
use crate::domain::principal::PrincipalRef;

/// Template selector for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TeamCreated,
    TeamStatusChanged,
    TeamUpdated,
    MemberAdded,
    MemberRemoved,
    OwnershipTransferred,
    Invitation,
    InvitationReminder,
    InvitationAccepted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TeamCreated => "team_created",
            Self::TeamStatusChanged => "team_status_changed",
            Self::TeamUpdated => "team_updated",
            Self::MemberAdded => "member_added",
            Self::MemberRemoved => "member_removed",
            Self::OwnershipTransferred => "ownership_transferred",
            Self::Invitation => "invitation",
            Self::InvitationReminder => "invitation_reminder",
            Self::InvitationAccepted => "invitation_accepted",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who receives a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Recipient {
    Principal(PrincipalRef),
    Email(String),
}

/// A request to notify recipients about something that happened to a team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub team_id: TeamId,
    pub recipients: Vec<Recipient>,
    pub payload: Value,
    /// Delivery should not happen before this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deliver_after: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(kind: NotificationKind, team_id: TeamId, recipients: Vec<Recipient>, payload: Value) -> Self {
        Self {
            kind,
            team_id,
            recipients,
            payload,
            deliver_after: None,
        }
    }

    pub fn deliver_after(mut self, at: DateTime<Utc>) -> Self {
        self.deliver_after = Some(at);
        self
    }
}
