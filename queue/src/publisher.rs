//! Publishing side of the queue client

use tokio_util::sync::CancellationToken;

use crate::config::PublisherConfig;
use crate::error::QueueError;
use crate::transport::Transport;

/// Publishes opaque payloads to named destinations
///
/// Safe for concurrent use. A publish is attempted exactly once: connection
/// failures schedule a background reconnect and surface as `ConnectionLost`
/// instead of being retried here.
pub struct Publisher {
    transport: Transport,
    config: PublisherConfig,
}

impl Publisher {
    pub fn new(transport: Transport, config: PublisherConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Idempotently create `destination` on the broker
    pub async fn declare_destination(&self, destination: &str) -> Result<(), QueueError> {
        let lease = self.transport.lease().await?;

        match lease.connection().declare(destination).await {
            Ok(()) => {
                tracing::info!(publisher = %self.config.name, destination, "Destination declared");
                Ok(())
            }
            Err(e) if e.is_connection_failure() => {
                tracing::warn!(publisher = %self.config.name, destination, error = %e, "Connection failed during declaration");
                self.transport.schedule_reconnect(lease);
                Err(QueueError::ConnectionLost)
            }
            Err(e @ QueueError::Declaration { .. }) => Err(e),
            Err(e) => Err(QueueError::Declaration {
                destination: destination.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Publish one payload, waiting for the broker confirmation when enabled
    ///
    /// `Canceled` and `PublishTimeout` do not prove the payload was dropped:
    /// the broker may already have accepted it, so consumers can still see
    /// it. Delivery is at-least-once and callers must not assume otherwise.
    pub async fn publish(
        &self,
        cancel: &CancellationToken,
        destination: &str,
        payload: &[u8],
    ) -> Result<(), QueueError> {
        if cancel.is_cancelled() {
            return Err(QueueError::Canceled);
        }

        let lease = self.transport.lease().await?;
        let send = lease.connection().publish(destination, payload);

        let outcome = match self.config.confirm_timeout {
            Some(timeout) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(QueueError::Canceled),
                confirmed = tokio::time::timeout(timeout, send) => {
                    confirmed.unwrap_or_else(|_| Err(QueueError::PublishTimeout {
                        destination: destination.to_string(),
                        timeout,
                    }))
                }
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(QueueError::Canceled),
                sent = send => sent,
            },
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    publisher = %self.config.name,
                    destination,
                    bytes = payload.len(),
                    "Message published"
                );
                Ok(())
            }
            Err(e) if e.is_connection_failure() => {
                tracing::warn!(publisher = %self.config.name, destination, error = %e, "Publish failed, connection lost");
                self.transport.schedule_reconnect(lease);
                Err(QueueError::ConnectionLost)
            }
            Err(e) => {
                tracing::warn!(publisher = %self.config.name, destination, error = %e, "Publish failed");
                Err(e)
            }
        }
    }
}
