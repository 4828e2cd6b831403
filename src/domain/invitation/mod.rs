//! Invitation domain module
//!
//! An invitation is a time-limited, tokenized offer to join a team. Only
//! `pending` invitations that have not passed `expires_at` are actionable;
//! every other status is terminal.

mod entity;
mod token;
mod validation;

pub use entity::{Invitation, InvitationStatus};
pub use token::TokenGenerator;
#[cfg(test)]
pub use token::MockTokenGenerator;
pub use validation::{
    normalize_email, validate_email, validate_message, InvitationValidationError,
    MAX_INVITATION_MESSAGE_LENGTH,
};
