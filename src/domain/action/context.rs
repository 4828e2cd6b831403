//! Actor and per-run context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::TenantId;
use crate::domain::principal::PrincipalRef;

/// The principal invoking an operation, plus its tenant scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub principal: PrincipalRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantId>,
}

impl Actor {
    pub fn new(principal: PrincipalRef) -> Self {
        Self {
            principal,
            tenant: None,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(PrincipalRef::user(id))
    }

    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.tenant = Some(tenant);
        self
    }
}

/// Snapshot handed to every phase of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    pub actor: PrincipalRef,
    pub tenant: Option<TenantId>,
    /// Clock reading taken once when the run starts
    pub now: DateTime<Utc>,
}

impl ActionContext {
    pub fn new(actor: Actor, now: DateTime<Utc>) -> Self {
        Self {
            actor: actor.principal,
            tenant: actor.tenant,
            now,
        }
    }
}
