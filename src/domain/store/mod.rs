//! Transactional team store port
//!
//! Reads are always fresh. Writes are staged into a `ChangeSet` and applied
//! by `TeamStore::commit` all-or-nothing, with unique constraints and
//! optimistic version checks enforced by the store itself.

mod changeset;
mod repository;

pub use changeset::{ChangeSet, Write};
pub use repository::{constraints, TeamStore};
#[cfg(test)]
pub use repository::MockTeamStore;
