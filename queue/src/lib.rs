//! # Vouch Queue
//!
//! Message queue client used to hand verification events from the request
//! path to the notification worker.
//!
//! ## Architecture
//!
//! - [`Transport`] owns the broker connection and its state machine
//!   (connect, close, fixed-interval reconnect).
//! - [`Publisher`] declares destinations and publishes opaque payloads.
//! - [`Consumer`] runs bounded receive loops that acknowledge or reject
//!   every delivery according to its [`MessageHandler`] outcome.
//! - [`BrokerDriver`] / [`BrokerConnection`] are the seam to the wire
//!   protocol. [`MemoryBroker`] is a process-local driver with fault
//!   injection; `RedisStreamsBroker` binds to Redis Streams consumer groups.
//!
//! ## Features
//!
//! - `redis-streams`: Enable the Redis Streams broker driver (default)

pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod handler;
pub mod memory;
pub mod message;
pub mod publisher;
#[cfg(feature = "redis-streams")]
pub mod redis_streams;
pub mod transport;

#[cfg(test)]
mod tests;

pub use broker::{BrokerConnection, BrokerDriver};
pub use config::{ConsumerConfig, Destination, PublisherConfig, ReconnectPolicy};
pub use consumer::Consumer;
pub use error::{QueueError, QueueResult};
pub use handler::{handler_fn, HandlerError, HandlerFn, MessageHandler, Traced};
pub use memory::MemoryBroker;
pub use message::{Delivery, DeliveryTag, Message};
pub use publisher::Publisher;
#[cfg(feature = "redis-streams")]
pub use redis_streams::RedisStreamsBroker;
pub use transport::{ConnectionState, Lease, Transport};
