//! Redis Streams broker driver
//!
//! Mapping onto stream primitives:
//!
//! - destination: a stream key plus one consumer group shared by all workers
//! - declare: `XGROUP CREATE <dest> <group> 0 MKSTREAM` (`BUSYGROUP` is success)
//! - publish: `XADD`; the returned entry id is the broker confirmation
//! - receive: new entries (`>`) first; spare batch room goes to entries that
//!   have sat unacknowledged for `claim_idle` under any consumer of the group
//!   (`XPENDING ... IDLE` then `XCLAIM`); block on `>` only when both are empty
//! - ack / reject without requeue: `XACK` and `XDEL` in one transaction
//! - reject with requeue: leave the entry pending; it is reclaimed once idle

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::RedisError;
use tokio::sync::Mutex;
use vouch_shared::config::QueueConfig;
use vouch_shared::utils::masking::mask_url;

use crate::broker::{BrokerConnection, BrokerDriver};
use crate::error::QueueError;
use crate::message::{Delivery, DeliveryTag, Message};

const BODY_FIELD: &str = "body";
const DEFAULT_CLAIM_IDLE: Duration = Duration::from_secs(30);

/// Driver connecting to a Redis server that hosts the streams
pub struct RedisStreamsBroker {
    client: redis::Client,
    url: String,
    group: String,
    max_len: Option<usize>,
    claim_idle: Duration,
}

impl RedisStreamsBroker {
    /// Create a driver; no connection is opened until `connect`
    pub fn new(url: &str, group: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)
            .map_err(|e| QueueError::Broker(format!("invalid broker URL: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
            group: group.into(),
            max_len: None,
            claim_idle: DEFAULT_CLAIM_IDLE,
        })
    }

    /// Driver for the configured broker, grouping consumers by connection name
    pub fn from_config(config: &QueueConfig) -> Result<Self, QueueError> {
        let broker = Self::new(&config.url, config.connection_name.clone())?
            .with_claim_idle(Duration::from_millis(config.claim_idle_ms));
        Ok(match config.stream_max_len() {
            Some(max_len) => broker.with_max_len(max_len),
            None => broker,
        })
    }

    /// Approximately cap each stream at `max_len` entries
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Reclaim entries left unacknowledged for at least `idle`
    pub fn with_claim_idle(mut self, idle: Duration) -> Self {
        self.claim_idle = idle.max(Duration::from_millis(1));
        self
    }
}

#[async_trait]
impl BrokerDriver for RedisStreamsBroker {
    async fn connect(&self) -> Result<Arc<dyn BrokerConnection>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(classify)?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(classify)?;

        Ok(Arc::new(RedisStreamsConnection {
            client: self.client.clone(),
            conn,
            group: self.group.clone(),
            max_len: self.max_len,
            claim_idle: self.claim_idle,
            readers: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }))
    }

    fn describe(&self) -> String {
        mask_url(&self.url)
    }
}

struct RedisStreamsConnection {
    client: redis::Client,
    conn: MultiplexedConnection,
    group: String,
    max_len: Option<usize>,
    claim_idle: Duration,
    /// Blocking reads get a dedicated connection per consumer
    readers: Mutex<HashMap<String, MultiplexedConnection>>,
    closed: AtomicBool,
}

impl RedisStreamsConnection {
    fn writer(&self) -> Result<MultiplexedConnection, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Disconnected(String::from("connection closed")));
        }
        Ok(self.conn.clone())
    }

    async fn reader(&self, consumer: &str) -> Result<MultiplexedConnection, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Disconnected(String::from("connection closed")));
        }
        let mut readers = self.readers.lock().await;
        if let Some(conn) = readers.get(consumer) {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(classify)?;
        readers.insert(consumer.to_string(), conn.clone());
        Ok(conn)
    }

    async fn read_group(
        &self,
        conn: &mut MultiplexedConnection,
        destination: &str,
        consumer: &str,
        max: usize,
        block: Option<Duration>,
    ) -> Result<Vec<Delivery>, QueueError> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.group)
            .arg(consumer)
            .arg("COUNT")
            .arg(max);
        if let Some(block) = block {
            cmd.arg("BLOCK").arg((block.as_millis() as u64).max(1));
        }
        cmd.arg("STREAMS").arg(destination).arg(">");

        let reply: Option<StreamReadReply> = cmd.query_async(conn).await.map_err(classify)?;
        let entries = reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .map(|entry| (entry, 1));

        self.collect_deliveries(conn, destination, entries).await
    }

    /// Move entries idle for `claim_idle` to `consumer`, oldest first
    async fn claim_idle_entries(
        &self,
        conn: &mut MultiplexedConnection,
        destination: &str,
        consumer: &str,
        max: usize,
    ) -> Result<Vec<Delivery>, QueueError> {
        let min_idle = self.claim_idle.as_millis() as u64;
        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(destination)
            .arg(&self.group)
            .arg("IDLE")
            .arg(min_idle)
            .arg("-")
            .arg("+")
            .arg(max)
            .query_async(conn)
            .await
            .map_err(classify)?;
        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let delivered: HashMap<String, u32> = pending
            .ids
            .iter()
            .map(|p| (p.id.clone(), p.times_delivered as u32))
            .collect();

        // The min-idle guard skips entries another consumer claimed meanwhile.
        let claimed: StreamClaimReply = redis::cmd("XCLAIM")
            .arg(destination)
            .arg(&self.group)
            .arg(consumer)
            .arg(min_idle)
            .arg(pending.ids.iter().map(|p| p.id.as_str()).collect::<Vec<_>>())
            .query_async(conn)
            .await
            .map_err(classify)?;

        tracing::debug!(destination, consumer, claimed = claimed.ids.len(), "Idle stream entries reclaimed");

        let mut entries: Vec<(StreamId, u32)> = claimed
            .ids
            .into_iter()
            .map(|entry| {
                let previous = delivered.get(&entry.id).copied().unwrap_or(1);
                (entry, previous.saturating_add(1))
            })
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.id.cmp(&b.id));

        self.collect_deliveries(conn, destination, entries).await
    }

    async fn collect_deliveries(
        &self,
        conn: &mut MultiplexedConnection,
        destination: &str,
        entries: impl IntoIterator<Item = (StreamId, u32)>,
    ) -> Result<Vec<Delivery>, QueueError> {
        let mut deliveries = Vec::new();
        let mut orphaned = Vec::new();
        for (entry, count) in entries {
            match entry.get::<Vec<u8>>(BODY_FIELD) {
                Some(body) => deliveries.push(Delivery::new(
                    Message::new(destination, body, count > 1).with_delivery_count(count),
                    DeliveryTag::new(entry.id),
                )),
                None => orphaned.push(entry.id),
            }
        }

        // Pending entries whose payload was trimmed away can never be handled.
        if !orphaned.is_empty() {
            tracing::warn!(destination, count = orphaned.len(), "Acknowledging trimmed stream entries");
            redis::cmd("XACK")
                .arg(destination)
                .arg(&self.group)
                .arg(&orphaned)
                .query_async::<_, i64>(conn)
                .await
                .map_err(classify)?;
        }

        Ok(deliveries)
    }
}

#[async_trait]
impl BrokerConnection for RedisStreamsConnection {
    async fn declare(&self, destination: &str) -> Result<(), QueueError> {
        let mut conn = self.writer()?;
        let created = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(destination)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async::<_, String>(&mut conn)
            .await;

        match created {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => match classify(e) {
                QueueError::Broker(reason) => Err(QueueError::Declaration {
                    destination: destination.to_string(),
                    reason,
                }),
                other => Err(other),
            },
        }
    }

    async fn publish(&self, destination: &str, body: &[u8]) -> Result<(), QueueError> {
        let mut conn = self.writer()?;
        let mut cmd = redis::cmd("XADD");
        cmd.arg(destination);
        if let Some(max_len) = self.max_len {
            cmd.arg("MAXLEN").arg("~").arg(max_len);
        }
        cmd.arg("*").arg(BODY_FIELD).arg(body);

        let id: String = cmd.query_async(&mut conn).await.map_err(classify)?;
        tracing::trace!(destination, id = %id, "Stream entry added");
        Ok(())
    }

    async fn receive(
        &self,
        destination: &str,
        consumer: &str,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<Delivery>, QueueError> {
        let mut conn = self.reader(consumer).await?;
        let max = max.max(1);

        let mut batch = self
            .read_group(&mut conn, destination, consumer, max, None)
            .await?;
        if batch.len() < max {
            let reclaimed = self
                .claim_idle_entries(&mut conn, destination, consumer, max - batch.len())
                .await?;
            batch.extend(reclaimed);
        }
        if !batch.is_empty() {
            return Ok(batch);
        }

        self.read_group(&mut conn, destination, consumer, max, Some(wait))
            .await
    }

    async fn ack(&self, destination: &str, tag: DeliveryTag) -> Result<(), QueueError> {
        let mut conn = self.writer()?;
        redis::pipe()
            .atomic()
            .cmd("XACK")
            .arg(destination)
            .arg(&self.group)
            .arg(tag.as_str())
            .ignore()
            .cmd("XDEL")
            .arg(destination)
            .arg(tag.as_str())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn reject(
        &self,
        destination: &str,
        tag: DeliveryTag,
        requeue: bool,
    ) -> Result<(), QueueError> {
        if requeue {
            self.writer()?;
            return Ok(());
        }
        self.ack(destination, tag).await
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.store(true, Ordering::SeqCst);
        self.readers.lock().await.clear();
        Ok(())
    }
}

/// Map a Redis error onto the queue taxonomy
fn classify(e: RedisError) -> QueueError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
    {
        QueueError::Disconnected(e.to_string())
    } else {
        QueueError::Broker(e.to_string())
    }
}
