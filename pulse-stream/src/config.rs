//! Configuration types for the pulse-stream crate
//!
//! This module defines the configuration structure that controls connection
//! behavior: endpoint location, reconnection backoff, the retry attempt cap,
//! and the optional heartbeat liveness check.

use std::time::Duration;

use url::Url;

use crate::error::{Result, StreamError};

/// Configuration for the connection manager.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Base URL of the event gateway, e.g. `https://api.example.com`
    /// Default: `http://localhost:8080`
    pub base_url: String,

    /// Delay before the first reconnection attempt
    /// Default: 1 second
    pub base_delay: Duration,

    /// Maximum delay between reconnection attempts
    /// Default: 30 seconds
    pub max_delay: Duration,

    /// Maximum number of consecutive failed attempts before a channel stops
    /// retrying and waits for manual or network-triggered recovery
    /// Default: 5
    pub max_attempts: u32,

    /// Timeout for establishing the underlying HTTP connection
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Optional liveness supplement: treat the stream as dropped when no
    /// traffic (frames or comments) arrives within this window. Transport
    /// closure remains the primary liveness signal.
    /// Default: disabled
    pub heartbeat_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
            connect_timeout: Duration::from_secs(10),
            heartbeat_timeout: None,
        }
    }
}

impl StreamConfig {
    /// Create a configuration pointing at the given gateway.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Create a configuration tuned for fast recovery on flaky links.
    pub fn fast_reconnect(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url)
            .map_err(|e| StreamError::Configuration(format!("invalid base url: {e}")))?;

        if self.base_delay.is_zero() {
            return Err(StreamError::Configuration(
                "base delay must be greater than zero".to_string(),
            ));
        }

        if self.base_delay > self.max_delay {
            return Err(StreamError::Configuration(
                "base delay must not exceed max delay".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(StreamError::Configuration(
                "max attempts must be greater than zero".to_string(),
            ));
        }

        if matches!(self.heartbeat_timeout, Some(t) if t.is_zero()) {
            return Err(StreamError::Configuration(
                "heartbeat timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }
}
