//! In-process verification cache
//!
//! Backed by a moka cache with a per-entry expiry, so each pending code
//! disappears on its own TTL and the cache evicts expired entries itself.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use vouch_core::domain::entities::OtpRecord;
use vouch_core::errors::{DomainError, OtpError};
use vouch_core::services::VerificationCacheTrait;

/// Upper bound on pending codes held at once
const DEFAULT_MAX_CAPACITY: u64 = 100_000;

#[derive(Clone)]
struct Slot {
    record: OtpRecord,
    ttl: Duration,
    expires_at: Instant,
}

impl Slot {
    fn new(record: &OtpRecord, ttl: Duration) -> Self {
        Self {
            record: record.clone(),
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

struct SlotExpiry;

impl Expiry<String, Slot> for SlotExpiry {
    fn expire_after_create(&self, _key: &String, slot: &Slot, _created_at: Instant) -> Option<Duration> {
        Some(slot.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(slot.ttl)
    }
}

/// Verification cache held in process memory
#[derive(Clone)]
pub struct MemoryVerificationCache {
    entries: Cache<String, Slot>,
}

impl Default for MemoryVerificationCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }
}

impl MemoryVerificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(SlotExpiry)
            .build();
        Self { entries }
    }

    /// Number of entries that have not expired
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl VerificationCacheTrait for MemoryVerificationCache {
    async fn set(&self, key: &str, record: &OtpRecord, ttl: Duration) -> Result<(), DomainError> {
        self.entries
            .insert(key.to_string(), Slot::new(record, ttl))
            .await;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        record: &OtpRecord,
        ttl: Duration,
    ) -> Result<bool, DomainError> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(async { Slot::new(record, ttl) })
            .await;
        Ok(entry.is_fresh())
    }

    async fn get(&self, key: &str) -> Result<OtpRecord, DomainError> {
        match self.entries.get(key).await {
            Some(slot) if slot.is_live() => Ok(slot.record),
            _ => Err(OtpError::NotFound.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let removed = self.entries.remove(key).await;
        Ok(removed.is_some_and(|slot| slot.is_live()))
    }
}
