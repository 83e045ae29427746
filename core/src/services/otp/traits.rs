//! Collaborator traits used by the OTP workflow

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::entities::{NotificationEvent, OtpRecord};
use crate::errors::DomainError;

/// Key-value store with per-key expiry holding pending OTP records
#[async_trait]
pub trait VerificationCacheTrait: Send + Sync {
    /// Store `record` under `key`, overwriting any existing value
    async fn set(&self, key: &str, record: &OtpRecord, ttl: Duration) -> Result<(), DomainError>;

    /// Store `record` only if `key` is absent; returns whether it was stored
    async fn set_if_absent(
        &self,
        key: &str,
        record: &OtpRecord,
        ttl: Duration,
    ) -> Result<bool, DomainError>;

    /// Fetch a record; fails with `OtpError::NotFound` when absent or expired
    async fn get(&self, key: &str) -> Result<OtpRecord, DomainError>;

    /// Remove `key`; returns whether this call removed it
    ///
    /// Idempotent. Concurrent callers observe `true` at most once.
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;
}

/// Password hashing collaborator
#[async_trait]
pub trait PasswordHasherTrait: Send + Sync {
    async fn hash(&self, password: &str) -> Result<String, DomainError>;

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, DomainError>;
}

/// Hands notification events to the delivery pipeline
#[async_trait]
pub trait NotificationPublisherTrait: Send + Sync {
    async fn publish(
        &self,
        cancel: &CancellationToken,
        event: &NotificationEvent,
    ) -> Result<(), DomainError>;
}
