//! Session configuration.

use std::time::Duration;

use crate::core::constants;

/// Session loop configuration.
///
/// Reconnect values are policy the core only stores and forwards; actual
/// reconnection is driven by the caller.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often to attempt a fresh unreliable-transport session while
    /// none is active. `None` disables the unreliable transport attempts
    /// entirely.
    pub unreliable_attempt_period: Option<Duration>,

    /// Total time to keep retrying a lost connection.
    pub reconnect_timeout: Duration,

    /// Delay between reconnection attempts.
    pub reconnect_interval: Duration,

    /// Capacity of the readiness event buffer.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            unreliable_attempt_period: Some(constants::DEFAULT_UNRELIABLE_ATTEMPT_PERIOD),
            reconnect_timeout: constants::DEFAULT_RECONNECT_TIMEOUT,
            reconnect_interval: constants::DEFAULT_RECONNECT_INTERVAL,
            event_capacity: constants::DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unreliable-transport attempt period (`None` disables).
    pub fn unreliable_attempt_period(mut self, period: Option<Duration>) -> Self {
        self.config.unreliable_attempt_period = period;
        self
    }

    /// Set the reconnect timeout.
    pub fn reconnect_timeout(mut self, timeout: Duration) -> Self {
        self.config.reconnect_timeout = timeout;
        self
    }

    /// Set the reconnect interval.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval = interval;
        self
    }

    /// Set the readiness event buffer capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
