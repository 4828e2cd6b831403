//! Cache keys and invalidation tags

use serde::{Deserialize, Serialize};

use crate::domain::ids::{TeamId, TenantId};
use crate::domain::principal::PrincipalRef;

/// Invalidation tag attached to cached entries
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheTag(String);

impl CacheTag {
    /// `team:{id}`; flushed by every mutation touching the team
    pub fn team(id: &TeamId) -> Self {
        Self(format!("team:{}", id))
    }

    /// `user:{kind}:{id}`; flushed when a principal's memberships change
    pub fn user(principal: &PrincipalRef) -> Self {
        Self(format!("user:{}", principal))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key builders for cached projections
#[derive(Debug)]
pub struct CacheKeys;

impl CacheKeys {
    pub fn team(id: &TeamId) -> String {
        format!("teams:team:{}", id)
    }

    pub fn members(id: &TeamId) -> String {
        format!("teams:members:{}", id)
    }

    /// Scoped per tenant since the listing is filtered by it
    pub fn user_teams(principal: &PrincipalRef, tenant: Option<&TenantId>) -> String {
        match tenant {
            Some(tenant) => format!("teams:user:{}:tenant:{}", principal, tenant.as_str()),
            None => format!("teams:user:{}", principal),
        }
    }
}
