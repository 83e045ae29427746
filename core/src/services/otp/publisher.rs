//! Queue-backed notification publisher

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vouch_queue::Publisher;

use crate::domain::entities::NotificationEvent;
use crate::errors::DomainError;

use super::traits::NotificationPublisherTrait;

/// Publishes notification events to a queue destination
pub struct QueueNotificationPublisher {
    publisher: Arc<Publisher>,
    destination: String,
}

impl QueueNotificationPublisher {
    pub fn new(publisher: Arc<Publisher>, destination: impl Into<String>) -> Self {
        Self {
            publisher,
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Idempotently create the destination on the broker
    pub async fn declare(&self) -> Result<(), DomainError> {
        self.publisher
            .declare_destination(&self.destination)
            .await
            .map_err(DomainError::from)
    }
}

#[async_trait]
impl NotificationPublisherTrait for QueueNotificationPublisher {
    async fn publish(
        &self,
        cancel: &CancellationToken,
        event: &NotificationEvent,
    ) -> Result<(), DomainError> {
        let payload = event.to_payload().map_err(|e| {
            DomainError::internal(format!("Failed to serialize notification event: {}", e))
        })?;

        self.publisher
            .publish(cancel, &self.destination, &payload)
            .await
            .map_err(DomainError::from)
    }
}
