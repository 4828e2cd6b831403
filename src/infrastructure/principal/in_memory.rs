//! In-memory principal directory

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::principal::{PrincipalDirectory, PrincipalProfile, PrincipalRef};
use crate::domain::DomainError;

/// Directory backed by a map; used by the CLI and in tests
#[derive(Debug, Default)]
pub struct InMemoryPrincipalDirectory {
    profiles: RwLock<HashMap<PrincipalRef, PrincipalProfile>>,
}

impl InMemoryPrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: PrincipalProfile) -> Result<(), DomainError> {
        self.profiles
            .write()
            .map_err(|_| DomainError::internal("Principal directory lock poisoned"))?
            .insert(profile.reference.clone(), profile);
        Ok(())
    }

    pub fn with_profile(self, profile: PrincipalProfile) -> Self {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.reference.clone(), profile);
        }
        self
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryPrincipalDirectory {
    async fn lookup(&self, principal: &PrincipalRef) -> Result<Option<PrincipalProfile>, DomainError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| DomainError::internal("Principal directory lock poisoned"))?;
        Ok(profiles.get(principal).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalProfile>, DomainError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| DomainError::internal("Principal directory lock poisoned"))?;
        Ok(profiles
            .values()
            .find(|p| {
                p.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_and_find_by_email() {
        let alice = PrincipalProfile::new(PrincipalRef::user("1"), "Alice").with_email("alice@x.com");
        let directory = InMemoryPrincipalDirectory::new().with_profile(alice.clone());

        assert_eq!(
            directory.lookup(&PrincipalRef::user("1")).await.unwrap(),
            Some(alice.clone())
        );
        assert_eq!(directory.find_by_email("ALICE@x.com").await.unwrap(), Some(alice));
        assert!(directory.lookup(&PrincipalRef::new("service", "1")).await.unwrap().is_none());
        assert!(directory.find_by_email("bob@x.com").await.unwrap().is_none());
    }
}
