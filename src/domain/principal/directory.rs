//! Principal directory port

use std::fmt::Debug;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::{PrincipalProfile, PrincipalRef};
use crate::domain::DomainError;

/// Resolves principal references, dispatching on `kind`.
///
/// Implemented by the host application.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PrincipalDirectory: Send + Sync + Debug {
    async fn lookup(&self, principal: &PrincipalRef) -> Result<Option<PrincipalProfile>, DomainError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalProfile>, DomainError>;
}
