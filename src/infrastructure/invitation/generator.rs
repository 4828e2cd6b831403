//! Random invitation tokens
//!
//! Tokens are URL-safe base64 of cryptographically random bytes, cut to a
//! fixed length.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

use crate::domain::invitation::TokenGenerator;

/// Default token length in characters
pub const DEFAULT_TOKEN_LENGTH: usize = 64;

/// Generator for invitation tokens
#[derive(Debug, Clone)]
pub struct RandomTokenGenerator {
    length: usize,
}

impl RandomTokenGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LENGTH)
    }
}

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> String {
        // 3 bytes encode to 4 characters
        let mut random_bytes = vec![0u8; self.length.div_ceil(4) * 3];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        let mut token = URL_SAFE_NO_PAD.encode(&random_bytes);
        token.truncate(self.length);
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fixed_length() {
        for length in [1, 10, 32, 63, 64, 100] {
            let generator = RandomTokenGenerator::new(length);
            assert_eq!(generator.generate().len(), length);
        }
    }

    #[test]
    fn test_url_safe_alphabet() {
        let token = RandomTokenGenerator::default().generate();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_differ() {
        let generator = RandomTokenGenerator::default();
        let tokens: HashSet<String> = (0..100).map(|_| generator.generate()).collect();
        assert_eq!(tokens.len(), 100);
    }
}
