//! Mock implementations for testing the OTP service

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::entities::{NotificationEvent, OtpRecord};
use crate::errors::{DomainError, OtpError};
use crate::services::otp::traits::{
    NotificationPublisherTrait, PasswordHasherTrait, VerificationCacheTrait,
};

// Mock verification cache honoring TTLs on the tokio clock
#[derive(Default)]
pub struct MockVerificationCache {
    pub entries: Arc<Mutex<HashMap<String, (OtpRecord, Instant)>>>,
    pub should_fail: bool,
    pub writes: AtomicUsize,
    pub hits: AtomicUsize,
    /// Yield to the scheduler between a successful read and returning it
    pub yield_after_get: bool,
}

impl MockVerificationCache {
    pub fn new(should_fail: bool) -> Self {
        Self {
            should_fail,
            ..Default::default()
        }
    }

    pub fn interleaving() -> Self {
        Self {
            yield_after_get: true,
            ..Default::default()
        }
    }

    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, expires)| *expires > Instant::now())
            .unwrap_or(false)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.should_fail {
            return Err(DomainError::Cache {
                message: "Cache service error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VerificationCacheTrait for MockVerificationCache {
    async fn set(&self, key: &str, record: &OtpRecord, ttl: Duration) -> Result<(), DomainError> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (record.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        record: &OtpRecord,
        ttl: Duration,
    ) -> Result<bool, DomainError> {
        self.check()?;
        if self.contains(key) {
            return Ok(false);
        }
        self.set(key, record, ttl).await?;
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<OtpRecord, DomainError> {
        self.check()?;
        let found = match self.entries.lock().unwrap().get(key) {
            Some((record, expires)) if *expires > Instant::now() => Some(record.clone()),
            _ => None,
        };
        let record = found.ok_or(DomainError::from(OtpError::NotFound))?;
        self.hits.fetch_add(1, Ordering::SeqCst);
        if self.yield_after_get {
            tokio::task::yield_now().await;
        }
        Ok(record)
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        self.check()?;
        let removed = self.entries.lock().unwrap().remove(key);
        Ok(matches!(removed, Some((_, expires)) if expires > Instant::now()))
    }
}

// Mock publisher recording every event
#[derive(Default)]
pub struct MockNotificationPublisher {
    pub events: Arc<Mutex<Vec<NotificationEvent>>>,
    pub should_fail: bool,
}

impl MockNotificationPublisher {
    pub fn new(should_fail: bool) -> Self {
        Self {
            should_fail,
            ..Default::default()
        }
    }

    pub fn published(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPublisherTrait for MockNotificationPublisher {
    async fn publish(
        &self,
        cancel: &CancellationToken,
        event: &NotificationEvent,
    ) -> Result<(), DomainError> {
        if cancel.is_cancelled() {
            return Err(DomainError::Canceled);
        }
        if self.should_fail {
            return Err(vouch_queue::QueueError::ConnectionLost.into());
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// Mock hasher with a reversible, recognizable format
pub struct MockPasswordHasher;

#[async_trait]
impl PasswordHasherTrait for MockPasswordHasher {
    async fn hash(&self, password: &str) -> Result<String, DomainError> {
        Ok(format!("hashed:{}", password))
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, DomainError> {
        Ok(hash == format!("hashed:{}", password))
    }
}
