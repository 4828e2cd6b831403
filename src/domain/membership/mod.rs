//! Membership domain module

mod entity;

pub use entity::{Membership, MembershipStatus};
