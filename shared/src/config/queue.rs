//! Message queue configuration module

use serde::{Deserialize, Serialize};

use super::{env_or, env_string};

/// Broker connection and consumption settings
///
/// The broker URL is opaque to the services: it is handed to whichever
/// broker driver the process is built with.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Broker connection URL (credentials and vhost/database included)
    pub url: String,

    /// Name reported by this process to the broker
    pub connection_name: String,

    /// Destination carrying "send verification email" events
    pub destination: String,

    /// Destination receiving messages that can never be processed
    #[serde(default)]
    pub dead_letter: Option<String>,

    /// Reconnect attempts before the connection is declared lost
    #[serde(default = "default_reconnect_max_attempt")]
    pub reconnect_max_attempt: u32,

    /// Fixed delay between reconnect attempts in milliseconds
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Number of parallel receive loops
    #[serde(default = "default_consumer_count")]
    pub consumer_count: usize,

    /// Maximum unacknowledged messages per receive loop
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: usize,

    /// Bounded wait for a publish confirmation in milliseconds (0 disables confirms)
    #[serde(default = "default_publish_confirm_timeout_ms")]
    pub publish_confirm_timeout_ms: u64,

    /// Deliveries of one message before a transient failure is dead-lettered
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,

    /// Pause before a transiently failed message is handed back, in milliseconds
    #[serde(default = "default_redelivery_delay_ms")]
    pub redelivery_delay_ms: u64,

    /// Idle time after which another consumer may take over an unsettled
    /// message, in milliseconds
    #[serde(default = "default_claim_idle_ms")]
    pub claim_idle_ms: u64,

    /// Approximate cap on entries kept per destination (0 disables trimming)
    #[serde(default = "default_stream_max_len")]
    pub stream_max_len: usize,

    /// Distinguishes consumers of replicas sharing one connection name
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://localhost:6379/1"),
            connection_name: String::from("vouch"),
            destination: String::from("mailQueue"),
            dead_letter: Some(String::from("mailQueue.dead")),
            reconnect_max_attempt: default_reconnect_max_attempt(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            consumer_count: default_consumer_count(),
            prefetch_count: default_prefetch_count(),
            publish_confirm_timeout_ms: default_publish_confirm_timeout_ms(),
            max_deliveries: default_max_deliveries(),
            redelivery_delay_ms: default_redelivery_delay_ms(),
            claim_idle_ms: default_claim_idle_ms(),
            stream_max_len: default_stream_max_len(),
            instance_id: default_instance_id(),
        }
    }
}

impl QueueConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let dead_letter = match std::env::var("QUEUE_DEAD_LETTER") {
            Ok(value) if value.is_empty() => None,
            Ok(value) => Some(value),
            Err(_) => defaults.dead_letter.clone(),
        };

        Self {
            url: env_string("QUEUE_URL", &defaults.url),
            connection_name: env_string("QUEUE_CONNECTION_NAME", &defaults.connection_name),
            destination: env_string("QUEUE_DESTINATION", &defaults.destination),
            dead_letter,
            reconnect_max_attempt: env_or(
                "QUEUE_RECONNECT_MAX_ATTEMPT",
                defaults.reconnect_max_attempt,
            ),
            reconnect_interval_ms: env_or(
                "QUEUE_RECONNECT_INTERVAL_MS",
                defaults.reconnect_interval_ms,
            ),
            consumer_count: env_or("QUEUE_CONSUMER_COUNT", defaults.consumer_count).max(1),
            prefetch_count: env_or("QUEUE_PREFETCH_COUNT", defaults.prefetch_count).max(1),
            publish_confirm_timeout_ms: env_or(
                "QUEUE_PUBLISH_CONFIRM_TIMEOUT_MS",
                defaults.publish_confirm_timeout_ms,
            ),
            max_deliveries: env_or("QUEUE_MAX_DELIVERIES", defaults.max_deliveries).max(1),
            redelivery_delay_ms: env_or("QUEUE_REDELIVERY_DELAY_MS", defaults.redelivery_delay_ms),
            claim_idle_ms: env_or("QUEUE_CLAIM_IDLE_MS", defaults.claim_idle_ms),
            stream_max_len: env_or("QUEUE_STREAM_MAX_LEN", defaults.stream_max_len),
            instance_id: env_string("QUEUE_INSTANCE_ID", &defaults.instance_id),
        }
    }

    /// Whether publishes wait for a broker confirmation
    pub fn confirms_enabled(&self) -> bool {
        self.publish_confirm_timeout_ms > 0
    }

    /// Cap applied to published streams, if trimming is enabled
    pub fn stream_max_len(&self) -> Option<usize> {
        (self.stream_max_len > 0).then_some(self.stream_max_len)
    }
}

fn default_reconnect_max_attempt() -> u32 {
    10
}

fn default_reconnect_interval_ms() -> u64 {
    1000
}

fn default_consumer_count() -> usize {
    1
}

fn default_prefetch_count() -> usize {
    1
}

fn default_publish_confirm_timeout_ms() -> u64 {
    5000
}

fn default_max_deliveries() -> u32 {
    5
}

fn default_redelivery_delay_ms() -> u64 {
    1000
}

fn default_claim_idle_ms() -> u64 {
    30_000
}

fn default_stream_max_len() -> usize {
    10_000
}

/// `HOSTNAME` (set in containers) plus the process id
fn default_instance_id() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|host| !host.trim().is_empty())
        .unwrap_or_else(|| String::from("local"));
    format!("{}-{}", host.trim(), std::process::id())
}
