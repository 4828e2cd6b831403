//! Team domain module
//!
//! Teams are the collaborative unit: they own memberships and invitations
//! and move through the lifecycle states defined in `domain::lifecycle`.

mod entity;
mod validation;

pub use entity::{Team, TeamStatus, TeamType};
pub use validation::{
    slugify, validate_team_description, validate_team_name, TeamValidationError,
    MAX_TEAM_DESCRIPTION_LENGTH, MAX_TEAM_NAME_LENGTH, MIN_TEAM_NAME_LENGTH,
};
