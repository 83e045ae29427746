//! User repository trait defining the interface for user data persistence.
//!
//! The repository exclusively owns user rows. The verification workflow only
//! reads `email`/`is_verified` and flips `is_verified` to true; it never
//! caches rows.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entities::user::User;
use crate::errors::DomainError;

/// Repository trait for User entity persistence operations
///
/// # Example Implementation
/// ```no_run
/// use async_trait::async_trait;
/// use uuid::Uuid;
/// use vouch_core::repositories::UserRepository;
/// use vouch_core::domain::entities::user::User;
/// use vouch_core::errors::DomainError;
///
/// struct MySqlUserRepository {
///     // database connection pool
/// }
///
/// #[async_trait]
/// impl UserRepository for MySqlUserRepository {
///     async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
///         Ok(None)
///     }
///
///     async fn create(&self, user: User) -> Result<Uuid, DomainError> {
///         Ok(user.id)
///     }
///
///     async fn set_verified(&self, email: &str) -> Result<(), DomainError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by normalized email address
    ///
    /// # Returns
    /// * `Ok(Some(User))` - User found
    /// * `Ok(None)` - No user registered with this email
    /// * `Err(DomainError)` - Database or other error occurred
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;

    /// Persist a new user and return its identifier
    ///
    /// Fails with `OtpError::EmailAlreadyRegistered` when the email is taken.
    async fn create(&self, user: User) -> Result<Uuid, DomainError>;

    /// Mark the user with this email as verified
    ///
    /// Idempotent for an already verified user; fails with
    /// `DomainError::NotFound` when no such user exists.
    async fn set_verified(&self, email: &str) -> Result<(), DomainError>;
}
