//! Configuration types for the signage-stream crate
//!
//! This module defines the settings that control how a display reaches its
//! server: endpoints, fallback polling, heartbeats and reconnect backoff.

use std::time::Duration;

use crate::error::{Result, StreamError};

/// Configuration for the connection supervisor
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Base URL for HTTP pulls, e.g. `http://signage.local:3000`
    pub server_url: String,

    /// Base URL for the push channel, e.g. `ws://signage.local:3000/ws`
    pub push_url: String,

    /// Interval between fallback polls while the push channel is down
    /// Default: 15 seconds
    pub poll_interval: Duration,

    /// Deadline for establishing the push channel
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Deadline for a single HTTP pull
    /// Default: 10 seconds
    pub request_timeout: Duration,

    /// Interval between heartbeats on a live channel
    /// Default: 30 seconds
    pub heartbeat_interval: Duration,

    /// Silence after which a live channel is considered dead
    /// Default: 75 seconds
    pub heartbeat_timeout: Duration,

    /// First reconnect delay
    /// Default: 1 second
    pub reconnect_base_delay: Duration,

    /// Upper bound for reconnect delays
    /// Default: 60 seconds
    pub reconnect_max_delay: Duration,

    /// Fraction of each reconnect delay that is randomized, in `0.0..=1.0`
    /// Default: 0.3
    pub reconnect_jitter: f64,

    /// Buffer size for event channels
    /// Default: 256
    pub event_buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            push_url: "ws://localhost:3000/ws".to_string(),
            poll_interval: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(75),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            reconnect_jitter: 0.3,
            event_buffer_size: 256,
        }
    }
}

impl StreamConfig {
    /// Create a new StreamConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a StreamConfig that notices outages and recovers quickly
    pub fn fast_reconnect() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(25),
            reconnect_base_delay: Duration::from_millis(250),
            reconnect_max_delay: Duration::from_secs(15),
            ..Default::default()
        }
    }

    /// Create a StreamConfig for metered or congested links
    pub fn low_bandwidth() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(60),
            heartbeat_timeout: Duration::from_secs(150),
            reconnect_max_delay: Duration::from_secs(300),
            event_buffer_size: 64,
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.server_url)?;
        let push = url::Url::parse(&self.push_url)?;
        if !matches!(push.scheme(), "ws" | "wss") {
            return Err(StreamError::Configuration(format!(
                "Push URL must use ws:// or wss://, got {}://",
                push.scheme()
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(StreamError::Configuration(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.heartbeat_interval.is_zero() || self.heartbeat_timeout <= self.heartbeat_interval {
            return Err(StreamError::Configuration(
                "Heartbeat timeout must exceed a non-zero heartbeat interval".to_string(),
            ));
        }

        if self.reconnect_base_delay.is_zero()
            || self.reconnect_base_delay > self.reconnect_max_delay
        {
            return Err(StreamError::Configuration(
                "Invalid reconnect delay: base must be non-zero and not exceed max".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            return Err(StreamError::Configuration(
                "Reconnect jitter must be within 0.0..=1.0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(StreamError::Configuration(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.reconnect_jitter = jitter;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }
}
