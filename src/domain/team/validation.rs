//! Team validation

use thiserror::Error;

/// Errors that can occur during team validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TeamValidationError {
    #[error("Team name must be at least {0} characters")]
    NameTooShort(usize),

    #[error("Team name cannot exceed {0} characters")]
    NameTooLong(usize),

    #[error("Team description cannot exceed {0} characters")]
    DescriptionTooLong(usize),

    #[error("Team name must contain at least one letter or digit")]
    EmptySlug,

    #[error("Unknown team type '{0}'")]
    UnknownType(String),
}

pub const MIN_TEAM_NAME_LENGTH: usize = 3;
pub const MAX_TEAM_NAME_LENGTH: usize = 255;
pub const MAX_TEAM_DESCRIPTION_LENGTH: usize = 1000;

/// Validate a team name
pub fn validate_team_name(name: &str) -> Result<(), TeamValidationError> {
    let length = name.trim().chars().count();

    if length < MIN_TEAM_NAME_LENGTH {
        return Err(TeamValidationError::NameTooShort(MIN_TEAM_NAME_LENGTH));
    }

    if length > MAX_TEAM_NAME_LENGTH {
        return Err(TeamValidationError::NameTooLong(MAX_TEAM_NAME_LENGTH));
    }

    if slugify(name).is_empty() {
        return Err(TeamValidationError::EmptySlug);
    }

    Ok(())
}

/// Validate a team description
pub fn validate_team_description(description: &str) -> Result<(), TeamValidationError> {
    if description.chars().count() > MAX_TEAM_DESCRIPTION_LENGTH {
        return Err(TeamValidationError::DescriptionTooLong(
            MAX_TEAM_DESCRIPTION_LENGTH,
        ));
    }
    Ok(())
}

/// Derive a URL slug from a display name.
///
/// ASCII alphanumerics are lowercased, every other run of characters
/// collapses into a single hyphen.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}
