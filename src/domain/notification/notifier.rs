//! Notification dispatch port

use std::fmt::Debug;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::Notification;
use crate::domain::DomainError;

/// Dispatches notifications. Failures surface as side-effect warnings only.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn notify(&self, notification: Notification) -> Result<(), DomainError>;
}
