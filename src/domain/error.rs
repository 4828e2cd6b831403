use thiserror::Error;

/// Core domain errors raised by collaborators (storage, cache, notifications)
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid ID format: {message}")]
    InvalidId { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// A storage-level unique constraint rejected a write
    #[error("Unique constraint '{constraint}' violated: {message}")]
    UniqueViolation { constraint: String, message: String },

    /// An optimistic version check failed
    #[error("Stale write: {message}")]
    StaleWrite { message: String },

    /// A bounded counter would exceed its ceiling
    #[error("Limit exceeded: {message}")]
    LimitExceeded { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Notification error: {message}")]
    Notification { message: String },

    #[error("Unavailable: {message}")]
    Unavailable { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }

    pub fn unique_violation(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    pub fn stale_write(message: impl Into<String>) -> Self {
        Self::StaleWrite {
            message: message.into(),
        }
    }

    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        Self::LimitExceeded {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn notification(message: impl Into<String>) -> Self {
        Self::Notification {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("Team 'abc' not found");
        assert_eq!(error.to_string(), "Not found: Team 'abc' not found");
    }

    #[test]
    fn test_unique_violation_error() {
        let error = DomainError::unique_violation("team_slug", "slug 'core' is taken");
        assert_eq!(
            error.to_string(),
            "Unique constraint 'team_slug' violated: slug 'core' is taken"
        );
    }

    #[test]
    fn test_conflict_error() {
        let error = DomainError::conflict("Resource already exists");
        assert_eq!(error.to_string(), "Conflict: Resource already exists");
    }
}
