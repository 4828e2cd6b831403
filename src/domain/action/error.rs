//! Pipeline error taxonomy

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::store::constraints;
use crate::domain::DomainError;

/// Field name to messages, for rendering inline errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Key used for errors not attached to a single field
    pub const GENERAL: &'static str = "_";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(value)` when empty, otherwise `Err(self)`
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
            .collect();
        write!(f, "{}", rendered.join(", "))
    }
}

/// Machine-readable reason for a `Conflict`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCode {
    InvalidTransition,
    AlreadyMember,
    DuplicatePendingInvitation,
    MemberLimitReached,
    LastOwner,
    SlugTaken,
    ResendLimitExceeded,
    ResendTooSoon,
    StaleWrite,
    Uniqueness,
}

impl ConflictCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTransition => "invalid_transition",
            Self::AlreadyMember => "already_member",
            Self::DuplicatePendingInvitation => "duplicate_pending_invitation",
            Self::MemberLimitReached => "member_limit_reached",
            Self::LastOwner => "last_owner",
            Self::SlugTaken => "slug_taken",
            Self::ResendLimitExceeded => "resend_limit_exceeded",
            Self::ResendTooSoon => "resend_too_soon",
            Self::StaleWrite => "stale_write",
            Self::Uniqueness => "uniqueness",
        }
    }

    /// Input field the conflict is reported against
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidTransition => "status",
            Self::AlreadyMember => "user",
            Self::DuplicatePendingInvitation => "email",
            Self::MemberLimitReached => "team_id",
            Self::LastOwner => "transfer_ownership",
            Self::SlugTaken => "name",
            Self::ResendLimitExceeded | Self::ResendTooSoon => "invitation_id",
            Self::StaleWrite | Self::Uniqueness => FieldErrors::GENERAL,
        }
    }

    /// Maps a store constraint name to the conflict it signals
    pub fn for_constraint(constraint: &str) -> Self {
        match constraint {
            constraints::TEAM_SLUG => Self::SlugTaken,
            constraints::MEMBERSHIP => Self::AlreadyMember,
            constraints::PENDING_INVITATION => Self::DuplicatePendingInvitation,
            _ => Self::Uniqueness,
        }
    }
}

impl std::fmt::Display for ConflictCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure produced by one of the first three pipeline phases
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Validation failed: {0}")]
    ValidationFailed(FieldErrors),

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String, fields: FieldErrors },

    #[error("Conflict ({code}): {message}")]
    Conflict { code: ConflictCode, message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Invalid or expired invitation: {message}")]
    InvalidOrExpiredInvitation { message: String },

    #[error("Unavailable: {message}")]
    Unavailable { message: String },
}

impl ActionError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
            fields: FieldErrors::new(),
        }
    }

    /// Forbidden with the reason attached to a specific input field
    pub fn forbidden_on(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Forbidden {
            fields: FieldErrors::single(field, reason.clone()),
            reason,
        }
    }

    pub fn conflict(code: ConflictCode, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn invalid_invitation(message: impl Into<String>) -> Self {
        Self::InvalidOrExpiredInvitation {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn conflict_code(&self) -> Option<ConflictCode> {
        match self {
            Self::Conflict { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Stable name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "validation_failed",
            Self::Forbidden { .. } => "forbidden",
            Self::Conflict { .. } => "conflict",
            Self::NotFound { .. } => "not_found",
            Self::InvalidOrExpiredInvitation { .. } => "invalid_or_expired_invitation",
            Self::Unavailable { .. } => "unavailable",
        }
    }

    /// Field-level rendering of this error
    pub fn field_errors(&self) -> FieldErrors {
        match self {
            Self::ValidationFailed(errors) => errors.clone(),
            Self::Forbidden { reason, fields } => {
                if fields.is_empty() {
                    FieldErrors::single(FieldErrors::GENERAL, reason.clone())
                } else {
                    fields.clone()
                }
            }
            Self::Conflict { code, message } => FieldErrors::single(code.field(), message.clone()),
            Self::NotFound { message } | Self::Unavailable { message } => {
                FieldErrors::single(FieldErrors::GENERAL, message.clone())
            }
            Self::InvalidOrExpiredInvitation { message } => {
                FieldErrors::single("token", message.clone())
            }
        }
    }
}

impl From<FieldErrors> for ActionError {
    fn from(errors: FieldErrors) -> Self {
        Self::ValidationFailed(errors)
    }
}

impl From<DomainError> for ActionError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::UniqueViolation {
                constraint,
                message,
            } => Self::conflict(ConflictCode::for_constraint(&constraint), message),
            DomainError::StaleWrite { message } => Self::conflict(ConflictCode::StaleWrite, message),
            DomainError::LimitExceeded { message } => {
                Self::conflict(ConflictCode::MemberLimitReached, message)
            }
            DomainError::Conflict { message } => Self::conflict(ConflictCode::Uniqueness, message),
            DomainError::NotFound { message } => Self::not_found(message),
            DomainError::Validation { message } | DomainError::InvalidId { message } => {
                Self::ValidationFailed(FieldErrors::single(FieldErrors::GENERAL, message))
            }
            other => Self::unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_accumulate() {
        let mut errors = FieldErrors::new();
        errors.add("name", "too short");
        errors.add("name", "invalid");
        errors.add("type", "unknown");

        assert_eq!(errors.get("name").unwrap().len(), 2);
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["name", "type"]);
        assert_eq!(errors.to_string(), "name: too short; invalid, type: unknown");
        assert!(errors.into_result(()).is_err());
        assert_eq!(FieldErrors::new().into_result(5), Ok(5));
    }

    #[test]
    fn test_unique_violations_map_to_conflicts() {
        let cases = [
            (constraints::TEAM_SLUG, ConflictCode::SlugTaken),
            (constraints::MEMBERSHIP, ConflictCode::AlreadyMember),
            (
                constraints::PENDING_INVITATION,
                ConflictCode::DuplicatePendingInvitation,
            ),
            (constraints::INVITATION_TOKEN, ConflictCode::Uniqueness),
        ];

        for (constraint, code) in cases {
            let error = ActionError::from(DomainError::unique_violation(constraint, "dup"));
            assert_eq!(error.conflict_code(), Some(code));
        }
    }

    #[test]
    fn test_infrastructure_failures_are_unavailable() {
        let error = ActionError::from(DomainError::storage("connection reset"));
        assert_eq!(error.kind(), "unavailable");

        let error = ActionError::from(DomainError::limit_exceeded("full"));
        assert_eq!(error.conflict_code(), Some(ConflictCode::MemberLimitReached));
    }

    #[test]
    fn test_field_errors_rendering() {
        let error = ActionError::conflict(ConflictCode::SlugTaken, "slug 'core' is taken");
        assert_eq!(
            error.field_errors().get("name"),
            Some(&["slug 'core' is taken".to_string()][..])
        );

        let error = ActionError::forbidden("nope");
        assert_eq!(error.field_errors().get("_"), Some(&["nope".to_string()][..]));

        let error = ActionError::forbidden_on("new_owner_id", "not an active member");
        assert!(error.field_errors().get("new_owner_id").is_some());
    }
}
