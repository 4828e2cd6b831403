//! Post-commit follow-up work

use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::domain::DomainError;

type Task = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), DomainError>> + Send>;

/// A named follow-up run after commit, in the order the operation lists them.
///
/// By default a failure is logged and the chain continues. A sub-action
/// built with `halt_on_failure` stops the remaining chain instead; neither
/// case undoes the committed change.
pub struct SubAction {
    name: String,
    continue_on_failure: bool,
    task: Task,
}

impl SubAction {
    pub fn new<F, Fut>(name: impl Into<String>, task: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            continue_on_failure: true,
            task: Box::new(move || task().boxed()),
        }
    }

    pub fn halt_on_failure(mut self) -> Self {
        self.continue_on_failure = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn continue_on_failure(&self) -> bool {
        self.continue_on_failure
    }

    pub async fn run(self) -> Result<(), DomainError> {
        (self.task)().await
    }
}

impl std::fmt::Debug for SubAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubAction")
            .field("name", &self.name)
            .field("continue_on_failure", &self.continue_on_failure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sub_action_runs_task() {
        let action = SubAction::new("noop", || async { Ok(()) });
        assert!(action.continue_on_failure());
        assert_eq!(action.name(), "noop");
        assert!(action.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_halt_on_failure() {
        let action = SubAction::new("boom", || async {
            Err(DomainError::notification("smtp down"))
        })
        .halt_on_failure();

        assert!(!action.continue_on_failure());
        assert!(action.run().await.is_err());
    }
}
