//! Domain layer - Core business logic and entities

pub mod action;
pub mod activity;
pub mod cache;
pub mod error;
pub mod event;
pub mod ids;
pub mod invitation;
pub mod lifecycle;
pub mod membership;
pub mod notification;
pub mod permission;
pub mod principal;
pub mod store;
pub mod team;

pub use action::{ActionContext, ActionError, ActionOutcome, Actor, ConflictCode, FieldErrors};
pub use error::DomainError;
pub use ids::{InvitationId, MembershipId, TeamId, TenantId};
pub use invitation::{Invitation, InvitationStatus};
pub use lifecycle::{StateMachine, TransitionName};
pub use membership::{Membership, MembershipStatus};
pub use permission::{CapabilitySet, RoleDefaults, TeamRole};
pub use principal::PrincipalRef;
pub use team::{Team, TeamStatus, TeamType};
