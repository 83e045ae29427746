//! Tests for the in-memory user repository

use crate::domain::entities::user::User;
use crate::errors::{DomainError, OtpError};
use crate::repositories::user::{MockUserRepository, UserRepository};

fn user(email: &str) -> User {
    User::new("Jane Doe".to_string(), email.to_string(), "hash".to_string())
}

#[tokio::test]
async fn test_create_and_find() {
    let repo = MockUserRepository::new();
    let created = user("jane@example.com");
    let id = repo.create(created.clone()).await.unwrap();

    assert_eq!(id, created.id);
    let found = repo.find_by_email("jane@example.com").await.unwrap().unwrap();
    assert_eq!(found.id, id);
    assert!(repo.find_by_email("other@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let repo = MockUserRepository::new();
    repo.create(user("jane@example.com")).await.unwrap();

    let err = repo.create(user("jane@example.com")).await.unwrap_err();
    assert!(matches!(err, DomainError::Otp(OtpError::EmailAlreadyRegistered)));
    assert_eq!(repo.count().await, 1);
}

#[tokio::test]
async fn test_set_verified() {
    let repo = MockUserRepository::new();
    repo.create(user("jane@example.com")).await.unwrap();

    repo.set_verified("jane@example.com").await.unwrap();
    assert!(repo.get("jane@example.com").await.unwrap().is_verified);

    // Idempotent
    repo.set_verified("jane@example.com").await.unwrap();

    let err = repo.set_verified("missing@example.com").await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn test_failing_repository() {
    let repo = MockUserRepository::failing();
    let err = repo.find_by_email("jane@example.com").await.unwrap_err();
    assert!(matches!(err, DomainError::Database { .. }));
}
