//! Message handler contract

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::Message;

/// Outcome of a failed handler invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Worth retrying later; the delivery is requeued
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Will never succeed; the delivery is dead-lettered or dropped
    #[error("Permanent failure: {0}")]
    Permanent(String),
}

impl HandlerError {
    pub fn transient(reason: impl std::fmt::Display) -> Self {
        HandlerError::Transient(reason.to_string())
    }

    pub fn permanent(reason: impl std::fmt::Display) -> Self {
        HandlerError::Permanent(reason.to_string())
    }

    /// Whether the delivery should go back to its destination
    pub fn requeue(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }
}

/// Processes one message per invocation
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError>;
}

#[async_trait]
impl<H: MessageHandler + ?Sized> MessageHandler for Arc<H> {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        (**self).handle(message).await
    }
}

/// Adapter turning an async closure into a [`MessageHandler`]
pub struct HandlerFn<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> MessageHandler for HandlerFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        (self.f)(message.clone()).await
    }
}

/// Wraps a handler with outcome and latency logging
pub struct Traced<H> {
    inner: H,
    name: &'static str,
}

impl<H> Traced<H> {
    pub fn new(name: &'static str, inner: H) -> Self {
        Self { inner, name }
    }
}

#[async_trait]
impl<H: MessageHandler> MessageHandler for Traced<H> {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let started = Instant::now();
        let result = self.inner.handle(message).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => tracing::debug!(
                handler = self.name,
                destination = %message.destination(),
                redelivered = message.is_redelivered(),
                elapsed_ms,
                "Message handled"
            ),
            Err(e) => tracing::warn!(
                handler = self.name,
                destination = %message.destination(),
                redelivered = message.is_redelivered(),
                elapsed_ms,
                error = %e,
                "Message handler failed"
            ),
        }

        result
    }
}
