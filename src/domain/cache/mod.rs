//! Cache domain - tag-invalidated projection cache
//!
//! Only read-side projections live here. Mutating operations never read
//! from the cache; they invalidate by tag after commit.

mod key;
mod repository;

pub use key::{CacheKeys, CacheTag};
pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
