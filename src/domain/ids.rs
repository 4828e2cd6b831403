//! Identifier newtypes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn parse(value: &str) -> Result<Self, DomainError> {
                Uuid::parse_str(value).map(Self).map_err(|e| {
                    DomainError::invalid_id(format!(
                        "'{}' is not a valid {}: {}",
                        value,
                        stringify!($name),
                        e
                    ))
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

uuid_id!(
    /// Team identifier
    TeamId
);
uuid_id!(
    /// Membership identifier
    MembershipId
);
uuid_id!(
    /// Invitation identifier
    InvitationId
);
uuid_id!(
    /// Domain event identifier
    EventId
);
uuid_id!(
    /// Activity record identifier
    ActivityId
);

/// Opaque tenant scope; the core only compares it for equality
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
