//! Activity log domain module
//!
//! Append-only audit trail. Records are staged in the same change set as the
//! mutation they describe.

mod entity;

pub use entity::ActivityRecord;
