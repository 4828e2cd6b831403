//! Invitation token generation port

use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;

/// Produces candidate invitation tokens.
///
/// Uniqueness is not assumed: callers check each candidate against the
/// store and draw again on collision.
#[cfg_attr(test, automock)]
pub trait TokenGenerator: Send + Sync + Debug {
    fn generate(&self) -> String;
}
