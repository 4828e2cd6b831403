//! Tagged result of a pipeline run

use serde::{Deserialize, Serialize};

use super::error::{ActionError, FieldErrors};

/// A post-commit failure reported alongside a successful outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectWarning {
    pub sub_action: String,
    pub message: String,
    /// The sub-action was marked halt-on-failure and stopped the chain
    pub fatal: bool,
}

/// What every operation returns; callers branch on the tag, never on panics
#[derive(Debug, Clone)]
pub enum ActionOutcome<T> {
    Success {
        data: T,
        message: String,
        warnings: Vec<SideEffectWarning>,
    },
    Failure {
        error: ActionError,
        errors: FieldErrors,
    },
}

impl<T> ActionOutcome<T> {
    pub fn success(data: T, message: impl Into<String>, warnings: Vec<SideEffectWarning>) -> Self {
        Self::Success {
            data,
            message: message.into(),
            warnings,
        }
    }

    pub fn failure(error: ActionError) -> Self {
        let errors = error.field_errors();
        Self::Failure { error, errors }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ActionError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    pub fn warnings(&self) -> &[SideEffectWarning] {
        match self {
            Self::Success { warnings, .. } => warnings,
            Self::Failure { .. } => &[],
        }
    }

    pub fn into_result(self) -> Result<T, ActionError> {
        match self {
            Self::Success { data, .. } => Ok(data),
            Self::Failure { error, .. } => Err(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ActionOutcome<U> {
        match self {
            Self::Success {
                data,
                message,
                warnings,
            } => ActionOutcome::Success {
                data: f(data),
                message,
                warnings,
            },
            Self::Failure { error, errors } => ActionOutcome::Failure { error, errors },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::ConflictCode;

    #[test]
    fn test_failure_carries_field_errors() {
        let outcome: ActionOutcome<()> =
            ActionOutcome::failure(ActionError::conflict(ConflictCode::AlreadyMember, "dup"));

        assert!(!outcome.is_success());
        match &outcome {
            ActionOutcome::Failure { errors, .. } => {
                assert_eq!(errors.get("user"), Some(&["dup".to_string()][..]));
            }
            _ => panic!("expected failure"),
        }
        assert!(outcome.warnings().is_empty());
    }

    #[test]
    fn test_success_keeps_warnings() {
        let warning = SideEffectWarning {
            sub_action: "notify".into(),
            message: "smtp down".into(),
            fatal: false,
        };
        let outcome = ActionOutcome::success(3, "done", vec![warning.clone()]).map(|n| n * 2);

        assert_eq!(outcome.data(), Some(&6));
        assert_eq!(outcome.warnings(), &[warning]);
        assert_eq!(outcome.into_result(), Ok(6));
    }
}
