//! Polling cadence.

use std::time::Duration;

/// Polling cadence, fixed for the life of a [`Poller`](crate::Poller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Time between timer-driven status checks.
    pub status_interval: Duration,
    /// An address check runs on every `address_every`-th status check.
    pub address_every: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(5),
            address_every: 12,
        }
    }
}

impl PollConfig {
    /// Builds a cadence from whole seconds. Zero values are raised to 1.
    pub fn new(interval_secs: u64, address_every: u32) -> Self {
        Self {
            status_interval: Duration::from_secs(interval_secs.max(1)),
            address_every: address_every.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PollConfig::default();
        assert_eq!(config.status_interval, Duration::from_secs(5));
        assert_eq!(config.address_every, 12);
    }

    #[test]
    fn zero_values_are_clamped() {
        let config = PollConfig::new(0, 0);
        assert_eq!(config.status_interval, Duration::from_secs(1));
        assert_eq!(config.address_every, 1);
    }
}
