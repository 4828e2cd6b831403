//! Invitation lifecycle infrastructure

mod generator;
mod manager;

pub use generator::RandomTokenGenerator;
pub use manager::{InvitationManager, InvitationRequest};
