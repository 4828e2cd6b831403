//! Principal reference and profile types

use serde::{Deserialize, Serialize};

/// Tagged reference to a principal of any kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalRef {
    pub kind: String,
    pub id: String,
}

impl PrincipalRef {
    pub const USER: &'static str = "user";

    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Shorthand for a `user` principal
    pub fn user(id: impl Into<String>) -> Self {
        Self::new(Self::USER, id)
    }

    /// Parses the `kind:id` form produced by `Display`
    pub fn parse(value: &str) -> Option<Self> {
        let (kind, id) = value.split_once(':')?;
        if kind.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self::new(kind, id))
    }
}

impl std::fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// What the directory knows about a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalProfile {
    pub reference: PrincipalRef,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl PrincipalProfile {
    pub fn new(reference: PrincipalRef, display_name: impl Into<String>) -> Self {
        Self {
            reference,
            display_name: display_name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let user = PrincipalRef::user("42");
        assert_eq!(user.to_string(), "user:42");
        assert_eq!(PrincipalRef::parse("user:42"), Some(user));
    }

    #[test]
    fn test_parse_rejects_partial_references() {
        assert_eq!(PrincipalRef::parse("user"), None);
        assert_eq!(PrincipalRef::parse(":42"), None);
        assert_eq!(PrincipalRef::parse("user:"), None);
    }
}
