//! Process-local broker driver
//!
//! Behaves like a durable broker for the lifetime of the [`MemoryBroker`]
//! value: messages survive connection loss, unsettled deliveries of a broken
//! connection are redelivered, and every connection shares the same queues.
//! Fault injection hooks make reconnect and timeout paths testable.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::broker::{BrokerConnection, BrokerDriver};
use crate::error::QueueError;
use crate::message::{Delivery, DeliveryTag, Message};

#[derive(Debug, Clone)]
struct Stored {
    body: Vec<u8>,
    redelivered: bool,
    deliveries: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Stored>,
    unacked: HashMap<u64, (u64, Stored)>,
}

#[derive(Debug, Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    denied: HashSet<String>,
    next_tag: u64,
    publish_latency: Duration,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<BrokerState>,
    arrivals: Notify,
    unreachable: AtomicBool,
    epoch: AtomicU64,
    connects: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory broker shared by every connection it hands out
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse (`false`) or accept (`true`) new connections
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Break every open connection.
    ///
    /// Their unsettled deliveries return to the front of their queues marked
    /// as redelivered.
    pub fn sever_connections(&self) {
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.shared.lock();
            for queue in state.queues.values_mut() {
                let mut stale: Vec<(u64, Stored)> = queue
                    .unacked
                    .iter()
                    .filter(|(_, (owner, _))| *owner < epoch)
                    .map(|(tag, (_, stored))| (*tag, stored.clone()))
                    .collect();
                stale.sort_by_key(|(tag, _)| std::cmp::Reverse(*tag));
                for (tag, mut stored) in stale {
                    queue.unacked.remove(&tag);
                    stored.redelivered = true;
                    queue.ready.push_front(stored);
                }
            }
        }
        self.shared.arrivals.notify_waiters();
        tracing::debug!(epoch, "Memory broker connections severed");
    }

    /// Delay applied to every publish before it is accepted
    pub fn set_publish_latency(&self, latency: Duration) {
        self.shared.lock().publish_latency = latency;
    }

    /// Make declarations of `destination` fail
    pub fn deny_destination(&self, destination: impl Into<String>) {
        self.shared.lock().denied.insert(destination.into());
    }

    /// Messages waiting to be delivered
    pub fn queue_depth(&self, destination: &str) -> usize {
        self.shared
            .lock()
            .queues
            .get(destination)
            .map_or(0, |queue| queue.ready.len())
    }

    /// Deliveries handed out but not yet settled
    pub fn unacked_count(&self, destination: &str) -> usize {
        self.shared
            .lock()
            .queues
            .get(destination)
            .map_or(0, |queue| queue.unacked.len())
    }

    /// Bodies of the messages waiting in `destination`, oldest first
    pub fn peek(&self, destination: &str) -> Vec<Vec<u8>> {
        self.shared
            .lock()
            .queues
            .get(destination)
            .map(|queue| queue.ready.iter().map(|s| s.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of successful `connect` calls so far
    pub fn connection_count(&self) -> u64 {
        self.shared.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerDriver for MemoryBroker {
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, QueueError> {
        if self.shared.unreachable.load(Ordering::SeqCst) {
            return Err(QueueError::Broker(String::from("memory broker is unreachable")));
        }
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryConnection {
            shared: self.shared.clone(),
            epoch: self.shared.epoch.load(Ordering::SeqCst),
            closed: AtomicBool::new(false),
        }))
    }

    fn describe(&self) -> String {
        String::from("memory://")
    }
}

struct MemoryConnection {
    shared: Arc<Shared>,
    epoch: u64,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn check_open(&self) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Disconnected(String::from("connection closed")));
        }
        if self.shared.epoch.load(Ordering::SeqCst) != self.epoch {
            return Err(QueueError::Disconnected(String::from("connection severed")));
        }
        Ok(())
    }

    fn parse_tag(tag: &DeliveryTag) -> Result<u64, QueueError> {
        tag.as_str()
            .parse()
            .map_err(|_| QueueError::Broker(format!("malformed delivery tag '{}'", tag)))
    }

    fn settle(&self, destination: &str, tag: DeliveryTag) -> Result<Stored, QueueError> {
        self.check_open()?;
        let id = Self::parse_tag(&tag)?;
        let mut state = self.shared.lock();
        let queue = state
            .queues
            .get_mut(destination)
            .ok_or_else(|| QueueError::Broker(format!("no such destination '{}'", destination)))?;
        queue
            .unacked
            .remove(&id)
            .map(|(_, stored)| stored)
            .ok_or_else(|| QueueError::Broker(format!("unknown delivery tag '{}'", tag)))
    }

    fn take_batch(&self, destination: &str, max: usize) -> Result<Vec<Delivery>, QueueError> {
        self.check_open()?;
        let mut state = self.shared.lock();
        let BrokerState {
            queues, next_tag, ..
        } = &mut *state;
        let queue = queues
            .get_mut(destination)
            .ok_or_else(|| QueueError::Broker(format!("no such destination '{}'", destination)))?;

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut stored) = queue.ready.pop_front() else {
                break;
            };
            stored.deliveries += 1;
            *next_tag += 1;
            batch.push(Delivery::new(
                Message::new(destination, stored.body.clone(), stored.redelivered)
                    .with_delivery_count(stored.deliveries),
                DeliveryTag::new(next_tag.to_string()),
            ));
            queue.unacked.insert(*next_tag, (self.epoch, stored));
        }
        Ok(batch)
    }
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn declare(&self, destination: &str) -> Result<(), QueueError> {
        self.check_open()?;
        let mut state = self.shared.lock();
        if state.denied.contains(destination) {
            return Err(QueueError::Declaration {
                destination: destination.to_string(),
                reason: String::from("access refused"),
            });
        }
        state.queues.entry(destination.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, destination: &str, body: &[u8]) -> Result<(), QueueError> {
        self.check_open()?;
        let latency = self.shared.lock().publish_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
            self.check_open()?;
        }

        {
            let mut state = self.shared.lock();
            let queue = state.queues.get_mut(destination).ok_or_else(|| {
                QueueError::Broker(format!("no such destination '{}'", destination))
            })?;
            queue.ready.push_back(Stored {
                body: body.to_vec(),
                redelivered: false,
                deliveries: 0,
            });
        }
        self.shared.arrivals.notify_waiters();
        Ok(())
    }

    async fn receive(
        &self,
        destination: &str,
        _consumer: &str,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<Delivery>, QueueError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let notified = self.shared.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.take_batch(destination, max.max(1))?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, destination: &str, tag: DeliveryTag) -> Result<(), QueueError> {
        self.settle(destination, tag).map(|_| ())
    }

    async fn reject(
        &self,
        destination: &str,
        tag: DeliveryTag,
        requeue: bool,
    ) -> Result<(), QueueError> {
        let mut stored = self.settle(destination, tag)?;
        if requeue {
            stored.redelivered = true;
            if let Some(queue) = self.shared.lock().queues.get_mut(destination) {
                queue.ready.push_back(stored);
            }
            self.shared.arrivals.notify_waiters();
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.shared.lock();
        for queue in state.queues.values_mut() {
            let mut owned: Vec<u64> = queue
                .unacked
                .iter()
                .filter(|(_, (owner, _))| *owner == self.epoch)
                .map(|(tag, _)| *tag)
                .collect();
            owned.sort_unstable_by(|a, b| b.cmp(a));
            for tag in owned {
                if let Some((_, mut stored)) = queue.unacked.remove(&tag) {
                    stored.redelivered = true;
                    queue.ready.push_front(stored);
                }
            }
        }
        drop(state);
        self.shared.arrivals.notify_waiters();
        Ok(())
    }
}
