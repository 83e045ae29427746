//! In-memory implementation of UserRepository for tests and local runs

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entities::user::User;
use crate::errors::{DomainError, OtpError};

use super::trait_::UserRepository;

/// Mock user repository keyed by email
#[derive(Clone)]
pub struct MockUserRepository {
    users: Arc<RwLock<HashMap<String, User>>>,
    pub should_fail: bool,
}

impl MockUserRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            should_fail: false,
        }
    }

    /// Create a repository whose every call fails with a database error
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    /// Seed a user
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.email.clone(), user);
    }

    /// Snapshot of a stored user
    pub async fn get(&self, email: &str) -> Option<User> {
        self.users.read().await.get(email).cloned()
    }

    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.should_fail {
            return Err(DomainError::Database {
                message: "Mock repository failure".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MockUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        self.check()?;
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn create(&self, user: User) -> Result<Uuid, DomainError> {
        self.check()?;
        let mut users = self.users.write().await;

        if users.contains_key(&user.email) {
            return Err(OtpError::EmailAlreadyRegistered.into());
        }

        let id = user.id;
        users.insert(user.email.clone(), user);
        Ok(id)
    }

    async fn set_verified(&self, email: &str) -> Result<(), DomainError> {
        self.check()?;
        let mut users = self.users.write().await;

        match users.get_mut(email) {
            Some(user) => {
                user.is_verified = true;
                user.updated_at = Utc::now();
                Ok(())
            }
            None => Err(DomainError::NotFound {
                resource: "User".to_string(),
            }),
        }
    }
}
