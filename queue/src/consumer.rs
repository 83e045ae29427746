//! Consuming side of the queue client
//!
//! A [`Consumer`] runs `consumer_count` receive loops against one
//! destination. Each loop holds at most `prefetch_count` unsettled
//! deliveries and settles every one of them exactly once:
//!
//! | handler outcome          | settlement                                   |
//! |--------------------------|----------------------------------------------|
//! | `Ok(())`                 | acknowledge                                  |
//! | `HandlerError::Transient`| pause `redelivery_delay`, reject with requeue|
//! |                          | dead-letter once `max_deliveries` is reached |
//! | `HandlerError::Permanent`| publish to the dead-letter destination, then |
//! |                          | acknowledge; reject without requeue if none  |
//!
//! Cancellation stops new receives but never interrupts a running handler.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::ConsumerConfig;
use crate::error::QueueError;
use crate::handler::{HandlerError, MessageHandler};
use crate::message::{Delivery, DeliveryTag, Message};
use crate::transport::{ConnectionState, Lease, Transport};

struct Running {
    stop: CancellationToken,
    failed: CancellationToken,
    loops: JoinSet<Result<(), QueueError>>,
}

/// Bounded-concurrency consumer for one destination
pub struct Consumer {
    transport: Transport,
    config: Arc<ConsumerConfig>,
    handler: Arc<dyn MessageHandler>,
    running: Mutex<Option<Running>>,
}

impl Consumer {
    pub fn new(
        transport: Transport,
        config: ConsumerConfig,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            transport,
            config: Arc::new(config),
            handler,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Declare the topology and spawn the receive loops.
    ///
    /// Declaration problems surface here; the loops stop when `cancel` fires
    /// or [`Consumer::stop`] is called. Starting twice is a no-op.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), QueueError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        declare_topology(&self.transport.lease().await?, &self.config).await?;

        let stop = cancel.child_token();
        let failed = CancellationToken::new();
        let mut loops = JoinSet::new();

        for index in 0..self.config.consumer_count {
            let receive_loop = ReceiveLoop {
                consumer_tag: format!("{}-{}", self.config.consumer_name, index),
                transport: self.transport.clone(),
                config: self.config.clone(),
                handler: self.handler.clone(),
                stop: stop.clone(),
            };
            let failed = failed.clone();
            loops.spawn(async move {
                let result = receive_loop.run(index).await;
                if result.is_err() {
                    failed.cancel();
                }
                result
            });
        }

        tracing::info!(
            destination = %self.config.destination.name,
            consumer_count = self.config.consumer_count,
            prefetch_count = self.config.prefetch_count,
            "Consumer started"
        );

        *running = Some(Running {
            stop,
            failed,
            loops,
        });
        Ok(())
    }

    /// Resolves once any receive loop has ended with an error
    ///
    /// Pending forever when the consumer is not running.
    pub async fn failed(&self) {
        let failed = self
            .running
            .lock()
            .await
            .as_ref()
            .map(|running| running.failed.clone());

        match failed {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    /// Stop receiving, wait for in-flight handlers and join every loop.
    ///
    /// Returns the first loop error, if any loop failed.
    pub async fn stop(&self) -> Result<(), QueueError> {
        let Some(mut running) = self.running.lock().await.take() else {
            return Ok(());
        };

        running.stop.cancel();

        let mut first_error = None;
        while let Some(joined) = running.loops.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Receive loop panicked");
                }
            }
        }

        tracing::info!(destination = %self.config.destination.name, "Consumer stopped");
        first_error.map_or(Ok(()), Err)
    }
}

async fn declare_topology(lease: &Lease, config: &ConsumerConfig) -> Result<(), QueueError> {
    let destinations = std::iter::once(&config.destination.name)
        .chain(config.destination.dead_letter.as_ref());

    for destination in destinations {
        lease
            .connection()
            .declare(destination)
            .await
            .map_err(|e| match e {
                e if e.is_connection_failure() => e,
                e @ QueueError::Declaration { .. } => e,
                other => QueueError::Declaration {
                    destination: destination.clone(),
                    reason: other.to_string(),
                },
            })?;
    }
    Ok(())
}

struct ReceiveLoop {
    consumer_tag: String,
    transport: Transport,
    config: Arc<ConsumerConfig>,
    handler: Arc<dyn MessageHandler>,
    stop: CancellationToken,
}

impl ReceiveLoop {
    async fn run(self, index: usize) -> Result<(), QueueError> {
        let destination = self.config.destination.name.clone();
        tracing::debug!(consumer = %self.consumer_tag, index, destination = %destination, "Receive loop started");

        let mut lease = match self.transport.lease().await {
            Ok(lease) => lease,
            Err(QueueError::Closed) => return Err(QueueError::Closed),
            Err(_) => match self.wait_for_connection().await? {
                Some(lease) => lease,
                None => return Ok(()),
            },
        };
        let mut subscribed = None;

        loop {
            if self.stop.is_cancelled() {
                break;
            }

            if subscribed != Some(lease.generation()) {
                match declare_topology(&lease, &self.config).await {
                    Ok(()) => subscribed = Some(lease.generation()),
                    Err(e) if e.is_connection_failure() => {
                        match self.recover(&lease).await? {
                            Some(next) => lease = next,
                            None => break,
                        }
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            let received = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                batch = lease.connection().receive(
                    &destination,
                    &self.consumer_tag,
                    self.config.prefetch_count,
                    self.config.poll_interval,
                ) => batch,
            };

            let batch = match received {
                Ok(batch) => batch,
                Err(e) if e.is_connection_failure() => {
                    match self.recover(&lease).await? {
                        Some(next) => lease = next,
                        None => break,
                    }
                    continue;
                }
                Err(e) => {
                    tracing::warn!(consumer = %self.consumer_tag, error = %e, "Receive failed");
                    tokio::select! {
                        _ = self.stop.cancelled() => {}
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                    continue;
                }
            };

            let mut deliveries = batch.into_iter();
            while let Some(delivery) = deliveries.next() {
                if self.stop.is_cancelled() {
                    self.requeue_unstarted(&lease, std::iter::once(delivery).chain(deliveries))
                        .await;
                    break;
                }

                if let Err(e) = self.process(&lease, delivery).await {
                    if e.is_connection_failure() {
                        // Unsettled deliveries of the broken connection are redelivered.
                        match self.recover(&lease).await? {
                            Some(next) => lease = next,
                            None => return Ok(()),
                        }
                        break;
                    }
                    tracing::error!(consumer = %self.consumer_tag, error = %e, "Failed to settle delivery");
                }
            }
        }

        tracing::debug!(consumer = %self.consumer_tag, "Receive loop stopped");
        Ok(())
    }

    /// Handle one delivery and settle it according to the outcome
    async fn process(&self, lease: &Lease, delivery: Delivery) -> Result<(), QueueError> {
        let destination = &self.config.destination;
        let (message, tag) = delivery.into_parts();
        let connection = lease.connection();

        match self.handler.handle(&message).await {
            Ok(()) => connection.ack(&destination.name, tag).await,
            Err(HandlerError::Transient(reason))
                if message.delivery_count() >= self.config.max_deliveries =>
            {
                tracing::error!(
                    consumer = %self.consumer_tag,
                    delivery = %tag,
                    deliveries = message.delivery_count(),
                    reason = %reason,
                    "Redelivery limit reached"
                );
                self.dead_letter(lease, &message, tag).await
            }
            Err(HandlerError::Transient(reason)) => {
                tracing::warn!(
                    consumer = %self.consumer_tag,
                    delivery = %tag,
                    deliveries = message.delivery_count(),
                    reason = %reason,
                    "Transient handler failure, requeueing"
                );
                // A stop during the pause still requeues; nothing is lost.
                tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => {}
                    _ = tokio::time::sleep(self.config.redelivery_delay) => {}
                }
                connection.reject(&destination.name, tag, true).await
            }
            Err(HandlerError::Permanent(reason)) => {
                tracing::error!(
                    consumer = %self.consumer_tag,
                    delivery = %tag,
                    reason = %reason,
                    "Permanent handler failure"
                );
                self.dead_letter(lease, &message, tag).await
            }
        }
    }

    /// Move a delivery to the dead-letter destination, or drop it if none
    async fn dead_letter(
        &self,
        lease: &Lease,
        message: &Message,
        tag: DeliveryTag,
    ) -> Result<(), QueueError> {
        let destination = &self.config.destination;
        let connection = lease.connection();

        let Some(dead_letter) = &destination.dead_letter else {
            tracing::error!(consumer = %self.consumer_tag, delivery = %tag, "No dead-letter destination, dropping message");
            return connection.reject(&destination.name, tag, false).await;
        };

        match connection.publish(dead_letter, message.body()).await {
            Ok(()) => {
                tracing::info!(consumer = %self.consumer_tag, delivery = %tag, dead_letter = %dead_letter, "Message dead-lettered");
                connection.ack(&destination.name, tag).await
            }
            Err(e) if e.is_connection_failure() => Err(e),
            Err(e) => {
                tracing::error!(
                    consumer = %self.consumer_tag,
                    dead_letter = %dead_letter,
                    error = %e,
                    "Dead-letter publish failed, dropping message"
                );
                connection.reject(&destination.name, tag, false).await
            }
        }
    }

    async fn requeue_unstarted(&self, lease: &Lease, deliveries: impl Iterator<Item = Delivery>) {
        for delivery in deliveries {
            let (_, tag) = delivery.into_parts();
            if let Err(e) = lease
                .connection()
                .reject(&self.config.destination.name, tag, true)
                .await
            {
                tracing::debug!(consumer = %self.consumer_tag, error = %e, "Requeue on shutdown failed");
            }
        }
    }

    /// Enter the reconnect cycle; `None` means the loop was stopped meanwhile
    async fn recover(&self, lease: &Lease) -> Result<Option<Lease>, QueueError> {
        tracing::warn!(consumer = %self.consumer_tag, "Connection failure observed");
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => Ok(None),
            recovered = self.transport.recover(lease, self.config.reconnect) => recovered.map(Some),
        }
    }

    /// Wait out a reconnect started by someone else
    async fn wait_for_connection(&self) -> Result<Option<Lease>, QueueError> {
        let mut state = self.transport.watch_state();
        loop {
            match self.transport.lease().await {
                Ok(lease) => return Ok(Some(lease)),
                Err(QueueError::Closed) => return Err(QueueError::Closed),
                Err(e) => {
                    if self.transport.state() == ConnectionState::Failed {
                        return Err(e);
                    }
                }
            }
            tokio::select! {
                _ = self.stop.cancelled() => return Ok(None),
                changed = state.changed() => {
                    if changed.is_err() {
                        return Err(QueueError::ConnectionLost);
                    }
                }
            }
        }
    }
}
