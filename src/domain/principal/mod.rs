//! Principal domain module
//!
//! Principals are the polymorphic actors of the system: users, service
//! accounts, organisations. The core never inspects them beyond their
//! `{kind, id}` reference; lookups go through a host-provided directory.

mod directory;
mod entity;

pub use directory::PrincipalDirectory;
#[cfg(test)]
pub use directory::MockPrincipalDirectory;
pub use entity::{PrincipalProfile, PrincipalRef};
