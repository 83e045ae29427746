//! Broker connection lifecycle
//!
//! One [`Transport`] owns the connection shared by a process's publisher and
//! consumer. It moves through [`ConnectionState`]:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Reconnecting -> Connected
//!                                                         -> Failed
//! any state -> Closed (terminal)
//! ```
//!
//! Reconnection retries at a fixed interval up to the policy's attempt
//! budget. Concurrent reconnect requests for the same broken connection are
//! coalesced: only the first caller dials, the rest observe its result.
//! A supervisor task ([`Transport::spawn_supervisor`]) keeps dialing once
//! the budget is spent, so an outage never leaves the transport `Failed`.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::{BrokerConnection, BrokerDriver};
use crate::config::ReconnectPolicy;
use crate::error::QueueError;

/// Lifecycle state of a [`Transport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect attempts exhausted; a fresh `connect()` is required
    Failed,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A borrowed view of the current connection
///
/// The generation identifies which physical connection the lease refers to,
/// so a failure on a stale lease never tears down its replacement.
#[derive(Clone)]
pub struct Lease {
    connection: Arc<dyn BrokerConnection>,
    generation: u64,
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Lease {
    pub fn connection(&self) -> &dyn BrokerConnection {
        self.connection.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Default)]
struct Slot {
    connection: Option<Arc<dyn BrokerConnection>>,
    generation: u64,
}

struct TransportInner {
    name: String,
    driver: Arc<dyn BrokerDriver>,
    policy: ReconnectPolicy,
    slot: RwLock<Slot>,
    dial_gate: Mutex<()>,
    state: watch::Sender<ConnectionState>,
}

enum DialMode {
    Initial,
    Reconnect,
}

/// Shared, cloneable handle to one broker connection
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

impl Transport {
    pub fn new(
        name: impl Into<String>,
        driver: Arc<dyn BrokerDriver>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(TransportInner {
                name: name.into(),
                driver,
                policy,
                slot: RwLock::new(Slot::default()),
                dial_gate: Mutex::new(()),
                state,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.inner.policy
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Establish the connection, retrying at the policy's fixed interval.
    ///
    /// A no-op when already connected. Also the way out of `Failed`.
    pub async fn connect(&self) -> Result<(), QueueError> {
        let _gate = self.inner.dial_gate.lock().await;

        match self.state() {
            ConnectionState::Closed => return Err(QueueError::Closed),
            ConnectionState::Connected => return Ok(()),
            _ => {}
        }

        self.set_state(ConnectionState::Connecting);
        match self.dial(self.inner.policy, DialMode::Initial).await {
            Ok(connection) => {
                let generation = self.install(connection).await?;
                tracing::info!(
                    transport = %self.inner.name,
                    broker = %self.inner.driver.describe(),
                    generation,
                    "Broker connection established"
                );
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                tracing::error!(
                    transport = %self.inner.name,
                    broker = %self.inner.driver.describe(),
                    error = %e,
                    "Failed to connect to broker"
                );
                Err(e)
            }
        }
    }

    /// Borrow the current connection
    ///
    /// Fails with `Closed` after shutdown and `ConnectionLost` whenever no
    /// healthy connection is installed.
    pub async fn lease(&self) -> Result<Lease, QueueError> {
        let slot = self.inner.slot.read().await;
        match self.state() {
            ConnectionState::Closed => Err(QueueError::Closed),
            ConnectionState::Connected => slot
                .connection
                .clone()
                .map(|connection| Lease {
                    connection,
                    generation: slot.generation,
                })
                .ok_or(QueueError::ConnectionLost),
            _ => Err(QueueError::ConnectionLost),
        }
    }

    /// Replace the connection behind `failed` and return a lease on the new one.
    ///
    /// Callers whose lease was already replaced get the current connection
    /// without dialing. Exhausting `policy` moves the transport to `Failed`.
    pub async fn recover(
        &self,
        failed: &Lease,
        policy: ReconnectPolicy,
    ) -> Result<Lease, QueueError> {
        let _gate = self.inner.dial_gate.lock().await;

        {
            let slot = self.inner.slot.read().await;
            if slot.generation != failed.generation {
                return match (self.state(), slot.connection.clone()) {
                    (ConnectionState::Connected, Some(connection)) => Ok(Lease {
                        connection,
                        generation: slot.generation,
                    }),
                    (ConnectionState::Closed, _) => Err(QueueError::Closed),
                    _ => Err(QueueError::ConnectionLost),
                };
            }
        }

        match self.state() {
            ConnectionState::Closed => return Err(QueueError::Closed),
            ConnectionState::Failed => return Err(QueueError::ConnectionLost),
            _ => {}
        }

        let broken = self.inner.slot.write().await.connection.take();
        if let Some(broken) = broken {
            if let Err(e) = broken.close().await {
                tracing::debug!(transport = %self.inner.name, error = %e, "Closing broken connection failed");
            }
        }

        self.set_state(ConnectionState::Reconnecting);
        tracing::warn!(
            transport = %self.inner.name,
            max_attempt = policy.max_attempt,
            interval_ms = policy.interval.as_millis() as u64,
            "Broker connection lost, reconnecting"
        );

        match self.dial(policy, DialMode::Reconnect).await {
            Ok(connection) => {
                let generation = self.install(connection.clone()).await?;
                tracing::info!(transport = %self.inner.name, generation, "Broker connection restored");
                Ok(Lease {
                    connection,
                    generation,
                })
            }
            Err(QueueError::Closed) => Err(QueueError::Closed),
            Err(e) => {
                self.set_state(ConnectionState::Failed);
                tracing::error!(
                    transport = %self.inner.name,
                    error = %e,
                    "Reconnect attempts exhausted, connection lost"
                );
                Err(QueueError::ConnectionLost)
            }
        }
    }

    /// Run [`Transport::recover`] in the background with the transport policy
    pub fn schedule_reconnect(&self, failed: Lease) {
        let transport = self.clone();
        let policy = self.inner.policy;
        tokio::spawn(async move {
            if let Err(e) = transport.recover(&failed, policy).await {
                tracing::debug!(transport = %transport.inner.name, error = %e, "Background reconnect ended");
            }
        });
    }

    /// Keep reconnecting in the background while the transport is down
    ///
    /// Each round waits the policy interval, then runs a full `connect()`.
    /// Ends when the transport is closed or `cancel` fires.
    pub fn spawn_supervisor(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let transport = self.clone();
        tokio::spawn(async move {
            let mut state = transport.watch_state();
            loop {
                let current = *state.borrow_and_update();
                match current {
                    ConnectionState::Closed => break,
                    ConnectionState::Failed | ConnectionState::Disconnected => {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(transport.inner.policy.interval) => {}
                        }
                        match transport.connect().await {
                            Ok(()) => tracing::info!(transport = %transport.inner.name, "Supervisor restored broker connection"),
                            Err(QueueError::Closed) => break,
                            Err(e) => tracing::warn!(transport = %transport.inner.name, error = %e, "Supervisor reconnect round failed"),
                        }
                        continue;
                    }
                    _ => {}
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    changed = state.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(transport = %transport.inner.name, "Transport supervisor stopped");
        })
    }

    /// Shut the transport down for good
    ///
    /// Every later operation fails with `Closed`, including a second close.
    pub async fn close(&self) -> Result<(), QueueError> {
        let previous = self.inner.state.send_replace(ConnectionState::Closed);
        if previous == ConnectionState::Closed {
            return Err(QueueError::Closed);
        }

        let connection = self.inner.slot.write().await.connection.take();
        if let Some(connection) = connection {
            connection.close().await?;
        }

        tracing::info!(transport = %self.inner.name, "Broker connection closed");
        Ok(())
    }

    async fn dial(
        &self,
        policy: ReconnectPolicy,
        mode: DialMode,
    ) -> Result<Arc<dyn BrokerConnection>, QueueError> {
        let attempts = policy.max_attempt.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if matches!(mode, DialMode::Reconnect) || attempt > 1 {
                tokio::time::sleep(policy.interval).await;
            }
            if self.state() == ConnectionState::Closed {
                return Err(QueueError::Closed);
            }

            match self.inner.driver.connect().await {
                Ok(connection) => return Ok(connection),
                Err(e) => {
                    tracing::warn!(
                        transport = %self.inner.name,
                        attempt,
                        max_attempt = attempts,
                        error = %e,
                        "Broker connection attempt failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(QueueError::Connection {
            attempts,
            message: last_error,
        })
    }

    /// Install a fresh connection unless the transport was closed meanwhile
    async fn install(&self, connection: Arc<dyn BrokerConnection>) -> Result<u64, QueueError> {
        let mut slot = self.inner.slot.write().await;
        if self.state() == ConnectionState::Closed {
            drop(slot);
            let _ = connection.close().await;
            return Err(QueueError::Closed);
        }
        slot.generation += 1;
        slot.connection = Some(connection);
        self.set_state(ConnectionState::Connected);
        Ok(slot.generation)
    }

    fn set_state(&self, next: ConnectionState) {
        self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Closed || *state == next {
                return false;
            }
            tracing::debug!(transport = %self.inner.name, from = %state, to = %next, "Transport state change");
            *state = next;
            true
        });
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}
