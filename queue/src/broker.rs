//! Broker driver seam
//!
//! The transport, publisher and consumer only talk to these traits. A driver
//! binds them to a concrete wire protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::QueueError;
use crate::message::{Delivery, DeliveryTag};

/// Factory for broker connections
#[async_trait]
pub trait BrokerDriver: Send + Sync {
    /// Open one connection; a failure counts as one failed attempt
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, QueueError>;

    /// Redacted description used in logs
    fn describe(&self) -> String;
}

/// One live broker connection
///
/// Implementations report a broken connection as
/// [`QueueError::Disconnected`] so callers can enter the reconnect cycle.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Idempotently create `destination`
    async fn declare(&self, destination: &str) -> Result<(), QueueError>;

    /// Publish one opaque payload; returns once the broker accepted it
    async fn publish(&self, destination: &str, body: &[u8]) -> Result<(), QueueError>;

    /// Receive at most `max` deliveries, waiting up to `wait` for the first.
    ///
    /// Returns an empty batch when nothing arrived in time.
    async fn receive(
        &self,
        destination: &str,
        consumer: &str,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<Delivery>, QueueError>;

    /// Confirm successful processing
    async fn ack(&self, destination: &str, tag: DeliveryTag) -> Result<(), QueueError>;

    /// Reject a delivery, optionally returning it to the destination
    async fn reject(
        &self,
        destination: &str,
        tag: DeliveryTag,
        requeue: bool,
    ) -> Result<(), QueueError>;

    /// Release the connection; unsettled deliveries return to the broker
    async fn close(&self) -> Result<(), QueueError>;
}
