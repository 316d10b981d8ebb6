//! Session configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::usecase::{dispatcher::DEFAULT_HISTORY_CAPACITY, outbound_queue::DEFAULT_QUEUE_CAPACITY};

/// Reconnect backoff settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub min_delay: Duration,
    /// Upper bound for any delay, jitter included
    pub max_delay: Duration,
    /// Growth factor per consecutive failure
    pub multiplier: f64,
    /// Random spread as a ratio of the delay (0.2 = ±20%)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

/// Configuration of a chat session
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tsunagi_core::SessionConfig;
///
/// let config = SessionConfig::new("ws://127.0.0.1:8080/ws")
///     .with_heartbeat(Duration::from_secs(30), Duration::from_secs(10))
///     .with_queue_capacity(50);
/// assert_eq!(config.queue_capacity, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server endpoint, e.g. `ws://127.0.0.1:8080/ws`
    pub endpoint: String,
    /// Heartbeat period while `Ready`
    pub heartbeat_interval: Duration,
    /// Extra silence tolerated after a heartbeat period before the link is stale
    pub heartbeat_timeout: Duration,
    /// Time allowed for the server to accept the auth frame
    pub auth_timeout: Duration,
    /// Time allowed for an ack before an outbound message is `Failed`
    pub send_timeout: Duration,
    pub backoff: BackoffConfig,
    /// Maximum number of retained outbound entries
    pub queue_capacity: usize,
    /// Messages kept per room
    pub history_capacity: usize,
    /// Buffer of the notification channel; slow consumers miss older notifications
    pub notification_capacity: usize,
}

impl SessionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Silence after which a `Ready` connection is declared stale
    pub fn stale_after(&self) -> Duration {
        self.heartbeat_interval + self.heartbeat_timeout
    }

    /// Replace values the session cannot run with, logging each correction.
    ///
    /// Zero durations fall back to their defaults; capacities are at least 1; the
    /// backoff multiplier is at least 1 and the jitter ratio within `0..=1`.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        for (name, value, default) in [
            ("heartbeat_interval", &mut self.heartbeat_interval, defaults.heartbeat_interval),
            ("auth_timeout", &mut self.auth_timeout, defaults.auth_timeout),
            ("send_timeout", &mut self.send_timeout, defaults.send_timeout),
        ] {
            if value.is_zero() {
                tracing::warn!("{} must be non-zero, using {:?}", name, default);
                *value = default;
            }
        }

        for (name, value) in [
            ("queue_capacity", &mut self.queue_capacity),
            ("history_capacity", &mut self.history_capacity),
            ("notification_capacity", &mut self.notification_capacity),
        ] {
            if *value == 0 {
                tracing::warn!("{} must be at least 1, using 1", name);
                *value = 1;
            }
        }

        let backoff = &mut self.backoff;
        if !(backoff.multiplier >= 1.0) {
            tracing::warn!("backoff multiplier {} is below 1, using 1", backoff.multiplier);
            backoff.multiplier = 1.0;
        }
        if !(0.0..=1.0).contains(&backoff.jitter) {
            tracing::warn!("backoff jitter {} is outside 0..=1", backoff.jitter);
            backoff.jitter = if backoff.jitter > 1.0 { 1.0 } else { 0.0 };
        }
        if backoff.max_delay < backoff.min_delay {
            tracing::warn!("backoff max_delay is below min_delay, using min_delay");
            backoff.max_delay = backoff.min_delay;
        }

        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8080/ws".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(15),
            backoff: BackoffConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            notification_capacity: 256,
        }
    }
}
