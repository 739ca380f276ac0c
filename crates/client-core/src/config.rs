//! Coordinator configuration

use std::time::Duration;

use crate::retry::RetryConfig;

/// Configuration for a [`CallCoordinator`](crate::CallCoordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Capacity of the broadcast event channel.
    pub event_capacity: usize,
    /// How long a call may sit in ringing before it is ended locally.
    ///
    /// `None` (the default) preserves the original behavior: ringing
    /// persists until the far end answers, declines, or ends.
    pub ring_timeout: Option<Duration>,
    /// Retry policy for offer/answer publishes. ICE candidate publishes
    /// are never retried.
    pub setup_retry: RetryConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            event_capacity: 128,
            ring_timeout: None,
            setup_retry: RetryConfig::quick(),
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the broadcast event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Enable a ring timeout.
    pub fn with_ring_timeout(mut self, timeout: Duration) -> Self {
        self.ring_timeout = Some(timeout);
        self
    }

    /// Set the retry policy for setup-phase publishes.
    pub fn with_setup_retry(mut self, retry: RetryConfig) -> Self {
        self.setup_retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_compose() {
        let config = CoordinatorConfig::new()
            .with_event_capacity(16)
            .with_ring_timeout(Duration::from_secs(45));
        assert_eq!(config.event_capacity, 16);
        assert_eq!(config.ring_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn default_has_no_ring_timeout() {
        assert!(CoordinatorConfig::default().ring_timeout.is_none());
    }
}
