//! Event bus and listener ports

use std::fmt::Debug;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{DomainEvent, EventKind};
use crate::domain::DomainError;

/// Receives committed domain events
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventListener: Send + Sync + Debug {
    /// Kinds this listener wants; empty means every kind
    fn kinds(&self) -> Vec<EventKind>;

    async fn handle(&self, event: &DomainEvent) -> Result<(), DomainError>;
}

/// Fans committed events out to listeners.
///
/// Listener failures are the bus's concern and never reach the publisher.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventBus: Send + Sync + Debug {
    async fn publish(&self, event: DomainEvent);
}
