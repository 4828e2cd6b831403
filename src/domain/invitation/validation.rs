//! Invitation input validation

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvitationValidationError {
    #[error("Email address is required")]
    EmptyEmail,

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("Invitation message cannot exceed {0} characters")]
    MessageTooLong(usize),
}

pub const MAX_INVITATION_MESSAGE_LENGTH: usize = 500;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Trim and lowercase an email so (team, email) uniqueness is case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), InvitationValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(InvitationValidationError::EmptyEmail);
    }
    if email.len() > 255 || !EMAIL_PATTERN.is_match(email) {
        return Err(InvitationValidationError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

pub fn validate_message(message: &str) -> Result<(), InvitationValidationError> {
    if message.chars().count() > MAX_INVITATION_MESSAGE_LENGTH {
        return Err(InvitationValidationError::MessageTooLong(
            MAX_INVITATION_MESSAGE_LENGTH,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("  first.last+tag@example.co.uk ").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert_eq!(validate_email(""), Err(InvitationValidationError::EmptyEmail));
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@x.com").is_err());
        assert!(validate_email("user@localhost").is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn test_message_limit() {
        assert!(validate_message(&"m".repeat(500)).is_ok());
        assert!(validate_message(&"m".repeat(501)).is_err());
    }
}
