//! Queue error taxonomy

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the transport, publisher, consumer and broker drivers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The broker could not be reached within the configured attempts
    #[error("Broker unreachable after {attempts} attempts: {message}")]
    Connection { attempts: u32, message: String },

    /// The transport is not connected (reconnects exhausted or in progress)
    #[error("Broker connection lost")]
    ConnectionLost,

    /// The transport was shut down explicitly
    #[error("Transport is closed")]
    Closed,

    /// A driver observed a broken connection; triggers the reconnect cycle
    #[error("Broker connection broken: {0}")]
    Disconnected(String),

    /// The broker rejected the destination topology
    #[error("Failed to declare destination '{destination}': {reason}")]
    Declaration { destination: String, reason: String },

    /// The broker did not confirm a publish in time
    #[error("Publish to '{destination}' not confirmed within {timeout:?}")]
    PublishTimeout {
        destination: String,
        timeout: Duration,
    },

    /// The caller's cancellation signal fired first
    #[error("Operation canceled")]
    Canceled,

    /// Any other broker-side refusal
    #[error("Broker rejected operation: {0}")]
    Broker(String),
}

impl QueueError {
    /// Whether the error means the underlying connection is unusable
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, QueueError::Disconnected(_) | QueueError::ConnectionLost)
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
