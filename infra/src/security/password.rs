//! bcrypt password hasher
//!
//! bcrypt is deliberately slow, so hashing and verification run on the
//! blocking thread pool instead of stalling the async workers.

use async_trait::async_trait;
use vouch_core::errors::DomainError;
use vouch_core::services::PasswordHasherTrait;

/// Password hasher backed by bcrypt
#[derive(Debug, Clone, Copy)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl BcryptPasswordHasher {
    /// Hasher with an explicit work factor (4..=31)
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

fn hashing_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::internal(format!("password hashing failed: {}", e))
}

#[async_trait]
impl PasswordHasherTrait for BcryptPasswordHasher {
    async fn hash(&self, password: &str) -> Result<String, DomainError> {
        let password = password.to_string();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(hashing_error)?
            .map_err(hashing_error)
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, DomainError> {
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(hashing_error)?
            .map_err(hashing_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = BcryptPasswordHasher::with_cost(4);

        let hash = hasher.hash("correct horse").await.unwrap();
        assert!(hash.starts_with("$2"));
        assert_ne!(hash, "correct horse");

        assert!(hasher.verify("correct horse", &hash).await.unwrap());
        assert!(!hasher.verify("battery staple", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let hasher = BcryptPasswordHasher::with_cost(4);

        let first = hasher.hash("same password").await.unwrap();
        let second = hasher.hash("same password").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_invalid_cost_is_internal_error() {
        let hasher = BcryptPasswordHasher::with_cost(2);

        let result = hasher.hash("password123").await;
        assert!(matches!(result, Err(DomainError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_verify_against_malformed_hash_fails() {
        let hasher = BcryptPasswordHasher::default();

        let result = hasher.verify("password123", "not-a-bcrypt-hash").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_default_cost() {
        assert_eq!(BcryptPasswordHasher::default().cost(), bcrypt::DEFAULT_COST);
    }
}
