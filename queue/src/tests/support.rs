//! Shared fixtures for queue tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    HandlerError, MemoryBroker, Message, MessageHandler, ReconnectPolicy, Transport,
};

pub const DESTINATION: &str = "mailQueue";
pub const DEAD_LETTER: &str = "mailQueue.dead";

pub fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy::new(3, Duration::from_millis(50))
}

pub async fn connected_transport(broker: &MemoryBroker) -> Transport {
    let transport = Transport::new("test", Arc::new(broker.clone()), fast_policy());
    transport.connect().await.unwrap();
    transport
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Handler replaying a scripted sequence of outcomes, then succeeding
#[derive(Default)]
pub struct ScriptedHandler {
    script: Mutex<VecDeque<Result<(), HandlerError>>>,
    handled: Mutex<Vec<Message>>,
    started: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Result<(), HandlerError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn handled(&self) -> Vec<Message> {
        self.handled.lock().unwrap().clone()
    }

    pub fn handled_count(&self) -> usize {
        self.handled.lock().unwrap().len()
    }

    pub fn started_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageHandler for ScriptedHandler {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        self.handled.lock().unwrap().push(message.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
