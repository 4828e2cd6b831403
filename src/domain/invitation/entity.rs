//! Invitation entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{InvitationId, TeamId, TenantId};
use crate::domain::permission::TeamRole;
use crate::domain::principal::PrincipalRef;

/// Status of an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    Cancelled,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Invitation entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    id: InvitationId,
    team_id: TeamId,
    /// Normalized (trimmed, lowercased) address
    email: String,
    token: String,
    role: TeamRole,
    permissions: Vec<String>,
    status: InvitationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    invited_by: PrincipalRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    accepted_by: Option<PrincipalRef>,
    expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accepted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancelled_at: Option<DateTime<Utc>>,
    resend_count: u32,
    last_sent_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant: Option<TenantId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Invitation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        team_id: TeamId,
        email: impl Into<String>,
        token: impl Into<String>,
        role: TeamRole,
        permissions: Vec<String>,
        invited_by: PrincipalRef,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvitationId::generate(),
            team_id,
            email: email.into(),
            token: token.into(),
            role,
            permissions,
            status: InvitationStatus::Pending,
            message: None,
            invited_by,
            accepted_by: None,
            expires_at,
            accepted_at: None,
            rejected_at: None,
            cancelled_at: None,
            resend_count: 0,
            last_sent_at: now,
            tenant: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn with_tenant(mut self, tenant: Option<TenantId>) -> Self {
        self.tenant = tenant;
        self
    }

    // Getters

    pub fn id(&self) -> &InvitationId {
        &self.id
    }

    pub fn team_id(&self) -> &TeamId {
        &self.team_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn role(&self) -> &TeamRole {
        &self.role
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn status(&self) -> InvitationStatus {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn invited_by(&self) -> &PrincipalRef {
        &self.invited_by
    }

    pub fn accepted_by(&self) -> Option<&PrincipalRef> {
        self.accepted_by.as_ref()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn accepted_at(&self) -> Option<DateTime<Utc>> {
        self.accepted_at
    }

    pub fn rejected_at(&self) -> Option<DateTime<Utc>> {
        self.rejected_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn resend_count(&self) -> u32 {
        self.resend_count
    }

    pub fn last_sent_at(&self) -> DateTime<Utc> {
        self.last_sent_at
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Pending and not past `expires_at`
    pub fn is_actionable(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && !self.is_past_expiry(now)
    }

    // Mutators

    pub fn accept(&mut self, user: PrincipalRef, now: DateTime<Utc>) {
        self.status = InvitationStatus::Accepted;
        self.accepted_by = Some(user);
        self.accepted_at = Some(now);
        self.updated_at = now;
    }

    pub fn decline(&mut self, now: DateTime<Utc>) {
        self.status = InvitationStatus::Declined;
        self.rejected_at = Some(now);
        self.updated_at = now;
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = InvitationStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;
    }

    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.status = InvitationStatus::Expired;
        self.updated_at = now;
    }

    /// Swap in a fresh token and expiry and count the resend
    pub fn reissue(&mut self, token: impl Into<String>, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.token = token.into();
        self.expires_at = expires_at;
        self.resend_count += 1;
        self.last_sent_at = now;
        self.updated_at = now;
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(expires_in: Duration) -> Invitation {
        let now = Utc::now();
        Invitation::new(
            TeamId::generate(),
            "a@x.com",
            "t".repeat(64),
            TeamRole::Member,
            vec![],
            PrincipalRef::user("owner"),
            now + expires_in,
            now,
        )
    }

    #[test]
    fn test_pending_invitation_is_actionable() {
        let inv = invitation(Duration::days(7));
        assert!(inv.is_actionable(Utc::now()));
        assert!(!inv.status().is_terminal());
    }

    #[test]
    fn test_expired_by_time_while_pending() {
        let inv = invitation(Duration::seconds(-1));
        assert!(inv.is_pending());
        assert!(!inv.is_actionable(Utc::now()));
    }

    #[test]
    fn test_accept_records_acceptor() {
        let mut inv = invitation(Duration::days(1));
        let now = Utc::now();
        inv.accept(PrincipalRef::user("7"), now);

        assert_eq!(inv.status(), InvitationStatus::Accepted);
        assert_eq!(inv.accepted_by(), Some(&PrincipalRef::user("7")));
        assert_eq!(inv.accepted_at(), Some(now));
        assert!(!inv.is_actionable(now));
    }

    #[test]
    fn test_reissue_counts_resends() {
        let mut inv = invitation(Duration::days(1));
        let now = Utc::now();
        inv.reissue("n".repeat(64), now + Duration::days(7), now);

        assert_eq!(inv.resend_count(), 1);
        assert_eq!(inv.last_sent_at(), now);
        assert_eq!(inv.token(), "n".repeat(64));
    }
}
