//! Redis-backed verification cache
//!
//! Pending OTP records are stored as JSON under
//! `otp:pending:{sha256(code)}` with the record's TTL, so the raw code never
//! appears in the keyspace. Expiry is left entirely to Redis.

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;
use vouch_core::domain::entities::OtpRecord;
use vouch_core::errors::{DomainError, OtpError};
use vouch_core::services::VerificationCacheTrait;
use vouch_shared::utils::masking::mask_email;

use crate::cache::RedisClient;
use crate::InfrastructureError;

/// Key namespace of pending codes
const PENDING_KEY_PREFIX: &str = "otp:pending";

/// Verification cache storing pending OTP records in Redis
#[derive(Clone)]
pub struct RedisVerificationCache {
    redis_client: RedisClient,
}

impl RedisVerificationCache {
    pub fn new(redis_client: RedisClient) -> Self {
        Self { redis_client }
    }

    /// Redis key for a cache key, hashed and prefixed
    pub(crate) fn format_key(&self, key: &str) -> String {
        self.redis_client.make_key(&Self::pending_key(key))
    }

    pub(crate) fn pending_key(key: &str) -> String {
        format!("{}:{}", PENDING_KEY_PREFIX, Self::hash_key(key))
    }

    /// Hex-encoded SHA-256 of a cache key
    pub(crate) fn hash_key(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    /// Whole seconds for `SET ... EX`, never zero
    pub(crate) fn ttl_seconds(ttl: Duration) -> u64 {
        let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
        secs.max(1)
    }

    fn encode(record: &OtpRecord) -> Result<String, InfrastructureError> {
        Ok(serde_json::to_string(record)?)
    }
}

#[async_trait]
impl VerificationCacheTrait for RedisVerificationCache {
    async fn set(&self, key: &str, record: &OtpRecord, ttl: Duration) -> Result<(), DomainError> {
        let value = Self::encode(record)?;
        self.redis_client
            .set_with_expiry(&self.format_key(key), &value, Self::ttl_seconds(ttl))
            .await?;

        debug!(email = %mask_email(&record.email), ttl_secs = ttl.as_secs(), "Pending OTP stored");
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        record: &OtpRecord,
        ttl: Duration,
    ) -> Result<bool, DomainError> {
        let value = Self::encode(record)?;
        let stored = self
            .redis_client
            .set_if_absent_with_expiry(&self.format_key(key), &value, Self::ttl_seconds(ttl))
            .await?;

        if stored {
            debug!(email = %mask_email(&record.email), ttl_secs = ttl.as_secs(), "Pending OTP stored");
        } else {
            debug!("Pending OTP key already taken");
        }
        Ok(stored)
    }

    async fn get(&self, key: &str) -> Result<OtpRecord, DomainError> {
        let value = self
            .redis_client
            .get(&self.format_key(key))
            .await?
            .ok_or(OtpError::NotFound)?;

        let record = serde_json::from_str(&value).map_err(InfrastructureError::from)?;
        Ok(record)
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.redis_client.delete(&self.format_key(key)).await?)
    }
}
