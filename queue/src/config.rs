//! Queue client configuration
//!
//! Runtime types derived from [`QueueConfig`]; the shared crate holds the
//! environment-facing representation.

use std::time::Duration;

use vouch_shared::config::QueueConfig;

/// Fixed-interval reconnect policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts before the connection is declared lost
    pub max_attempt: u32,
    /// Delay between attempts
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempt: 10,
            interval: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(max_attempt: u32, interval: Duration) -> Self {
        Self {
            max_attempt: max_attempt.max(1),
            interval,
        }
    }

    /// Longest time a full reconnect cycle can take, excluding dial time
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempt
    }
}

impl From<&QueueConfig> for ReconnectPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self::new(
            config.reconnect_max_attempt,
            Duration::from_millis(config.reconnect_interval_ms),
        )
    }
}

/// A named destination plus where its unprocessable messages go
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub name: String,
    pub dead_letter: Option<String>,
}

impl Destination {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dead_letter: None,
        }
    }

    pub fn with_dead_letter(mut self, dead_letter: impl Into<String>) -> Self {
        self.dead_letter = Some(dead_letter.into());
        self
    }
}

impl From<&QueueConfig> for Destination {
    fn from(config: &QueueConfig) -> Self {
        Self {
            name: config.destination.clone(),
            dead_letter: config.dead_letter.clone(),
        }
    }
}

/// Publisher settings
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Name used in logs
    pub name: String,
    /// Bounded wait for the broker confirmation; `None` disables confirms
    pub confirm_timeout: Option<Duration>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            name: String::from("publisher"),
            confirm_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl From<&QueueConfig> for PublisherConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            name: format!("{}-publisher", config.connection_name),
            confirm_timeout: config
                .confirms_enabled()
                .then(|| Duration::from_millis(config.publish_confirm_timeout_ms)),
        }
    }
}

/// Consumer settings
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub destination: Destination,
    /// Base consumer name; each receive loop appends its index
    pub consumer_name: String,
    /// Number of parallel receive loops
    pub consumer_count: usize,
    /// Maximum unacknowledged deliveries per receive loop
    pub prefetch_count: usize,
    /// Bounded wait of a single receive call
    pub poll_interval: Duration,
    /// Reconnect policy applied when a loop observes a broken connection
    pub reconnect: ReconnectPolicy,
    /// Deliveries after which a transient failure is treated as permanent
    pub max_deliveries: u32,
    /// Pause before a transiently failed delivery is requeued
    pub redelivery_delay: Duration,
}

impl ConsumerConfig {
    pub fn new(destination: Destination, consumer_name: impl Into<String>) -> Self {
        Self {
            destination,
            consumer_name: consumer_name.into(),
            consumer_count: 1,
            prefetch_count: 1,
            poll_interval: Duration::from_secs(1),
            reconnect: ReconnectPolicy::default(),
            max_deliveries: 5,
            redelivery_delay: Duration::from_secs(1),
        }
    }

    pub fn with_consumer_count(mut self, count: usize) -> Self {
        self.consumer_count = count.max(1);
        self
    }

    pub fn with_prefetch_count(mut self, count: usize) -> Self {
        self.prefetch_count = count.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }

    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay;
        self
    }
}

impl From<&QueueConfig> for ConsumerConfig {
    fn from(config: &QueueConfig) -> Self {
        ConsumerConfig::new(
            Destination::from(config),
            format!("{}-{}", config.connection_name, config.instance_id),
        )
        .with_consumer_count(config.consumer_count)
        .with_prefetch_count(config.prefetch_count)
        .with_reconnect(ReconnectPolicy::from(config))
        .with_max_deliveries(config.max_deliveries)
        .with_redelivery_delay(Duration::from_millis(config.redelivery_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_config_from_queue_config() {
        let queue = QueueConfig {
            consumer_count: 3,
            prefetch_count: 5,
            reconnect_max_attempt: 4,
            reconnect_interval_ms: 250,
            max_deliveries: 7,
            redelivery_delay_ms: 40,
            instance_id: String::from("worker-a"),
            ..Default::default()
        };

        let config = ConsumerConfig::from(&queue);
        assert_eq!(config.consumer_name, "vouch-worker-a");
        assert_eq!(config.max_deliveries, 7);
        assert_eq!(config.redelivery_delay, Duration::from_millis(40));
        assert_eq!(config.destination.name, "mailQueue");
        assert_eq!(config.destination.dead_letter.as_deref(), Some("mailQueue.dead"));
        assert_eq!(config.consumer_count, 3);
        assert_eq!(config.prefetch_count, 5);
        assert_eq!(config.reconnect.max_attempt, 4);
        assert_eq!(config.reconnect.interval, Duration::from_millis(250));
        assert_eq!(config.reconnect.budget(), Duration::from_secs(1));
    }

    #[test]
    fn test_publisher_config_confirms() {
        let queue = QueueConfig::default();
        assert_eq!(
            PublisherConfig::from(&queue).confirm_timeout,
            Some(Duration::from_secs(5))
        );

        let no_confirm = QueueConfig {
            publish_confirm_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(PublisherConfig::from(&no_confirm).confirm_timeout, None);
    }

    #[test]
    fn test_counts_never_zero() {
        let config = ConsumerConfig::new(Destination::new("q"), "c")
            .with_consumer_count(0)
            .with_prefetch_count(0);
        assert_eq!(config.consumer_count, 1);
        assert_eq!(config.prefetch_count, 1);
        assert_eq!(config.with_max_deliveries(0).max_deliveries, 1);
        assert_eq!(ReconnectPolicy::new(0, Duration::ZERO).max_attempt, 1);
    }
}
