//! Permission domain module
//!
//! Capabilities are plain strings. Roles map to default capability sets
//! supplied by configuration; a membership may override them explicitly.

mod capability;
mod role;

pub use capability::{capabilities, CapabilitySet, WILDCARD};
pub use role::{RoleDefaults, TeamRole};
