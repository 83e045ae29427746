//! # Infrastructure Layer
//!
//! Concrete collaborators for the Vouch verification workflow, following
//! the ports defined in `vouch_core`.
//!
//! ## Architecture
//!
//! The infrastructure layer contains:
//! - **Cache**: Redis and in-memory verification caches with per-key expiry
//! - **Database**: MySQL user repository using SQLx
//! - **Security**: bcrypt password hashing on the blocking pool
//! - **Mail**: SMTP delivery through lettre, or log-only delivery
//! - **Template**: `{{Key}}` placeholder rendering with HTML escaping
//!
//! ## Features
//!
//! - `mysql`: Enable MySQL database support (default)
//! - `redis-cache`: Enable Redis caching support (default)

use vouch_core::errors::{DomainError, NotificationError};

/// Cache module - Redis client and verification caches
pub mod cache;

/// Database module - MySQL implementations using SQLx
#[cfg(feature = "mysql")]
pub mod database;

/// Mail module - outbound email transports
pub mod mail;

/// Security module - password hashing
pub mod security;

/// Template module - email body rendering
pub mod template;

pub use cache::{MemoryVerificationCache, RedisClient, RedisVerificationCache};
#[cfg(feature = "mysql")]
pub use database::{DatabasePool, MySqlUserRepository};
pub use mail::{LogEmailSender, SmtpEmailSender};
pub use security::BcryptPasswordHasher;
pub use template::BuiltinTemplateRenderer;

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Redis cache error
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SMTP transport or message construction error
    #[error("Mail error: {0}")]
    Mail(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Template loading or rendering error
    #[error("Template error: {0}")]
    Template(String),
}

impl From<InfrastructureError> for DomainError {
    fn from(err: InfrastructureError) -> Self {
        match err {
            InfrastructureError::Database(e) => DomainError::Database {
                message: e.to_string(),
            },
            InfrastructureError::Cache(e) => DomainError::Cache {
                message: e.to_string(),
            },
            InfrastructureError::Serialization(e) => DomainError::Cache {
                message: format!("corrupt cache entry: {}", e),
            },
            InfrastructureError::Mail(message) => {
                NotificationError::Delivery { message }.into()
            }
            InfrastructureError::Template(message) => {
                NotificationError::Template { message }.into()
            }
            InfrastructureError::Config(message) => DomainError::Internal { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_error_into_domain_error() {
        let err: DomainError = InfrastructureError::Mail("relay refused".to_string()).into();
        assert!(matches!(
            err,
            DomainError::Notification(NotificationError::Delivery { ref message }) if message == "relay refused"
        ));

        let err: DomainError = InfrastructureError::Template("no such template".to_string()).into();
        assert!(matches!(
            err,
            DomainError::Notification(NotificationError::Template { .. })
        ));

        let err: DomainError = InfrastructureError::Config("bad url".to_string()).into();
        assert!(matches!(err, DomainError::Internal { .. }));
    }

    #[test]
    fn test_redis_error_maps_to_cache_error() {
        let redis_err = redis::RedisError::from((redis::ErrorKind::IoError, "connection reset"));
        let err: DomainError = InfrastructureError::from(redis_err).into();
        assert!(matches!(err, DomainError::Cache { .. }));
    }
}
