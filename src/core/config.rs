//! Configuration for the recovery pipeline
//!
//! The debounce threshold, probe timeout and retry/backoff parameters are
//! deliberately configuration with documented defaults rather than hidden
//! constants. Hosts tune them for their platform's scheduling behavior.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{RecoveryError, Result};

/// Default monitor polling interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// Default probe time box
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;
/// Default consecutive failed probes required before declaring degradation
pub const DEFAULT_DEBOUNCE_THRESHOLD: u32 = 2;
/// Default bounded attempt count for one recovery sequence
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay for exponential backoff between attempts
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
/// Default cap on the backoff delay
pub const DEFAULT_BACKOFF_CAP_MS: u64 = 10_000;
/// Default capacity of the transition-record ring buffer
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;
/// Default capacity of the monitor status broadcast channel
pub const DEFAULT_STATUS_CHANNEL_CAPACITY: usize = 32;

/// Recovery pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Monitor polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// Probe timeout in milliseconds; a probe that has not answered by
    /// then is classified Unresponsive
    pub probe_timeout_ms: u64,

    /// Consecutive non-Healthy probes required before a degradation is
    /// confirmed (suppresses transient scheduling jitter)
    pub debounce_threshold: u32,

    /// Maximum attempts within one recovery sequence
    pub max_attempts: u32,

    /// Base backoff delay between attempts in milliseconds (doubles per
    /// attempt)
    pub backoff_base_ms: u64,

    /// Upper bound on the backoff delay in milliseconds
    pub backoff_cap_ms: u64,

    /// Capacity of the in-memory transition history ring buffer
    pub history_capacity: usize,

    /// Capacity of the monitor status broadcast channel; slow subscribers
    /// lose the oldest snapshots
    pub status_channel_capacity: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            debounce_threshold: DEFAULT_DEBOUNCE_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_cap_ms: DEFAULT_BACKOFF_CAP_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            status_channel_capacity: DEFAULT_STATUS_CHANNEL_CAPACITY,
        }
    }
}

impl RecoveryConfig {
    /// Validate the configuration, rejecting values that would make the
    /// pipeline degenerate (zero intervals, zero attempts).
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", self.poll_interval_ms));
        }
        if self.probe_timeout_ms == 0 {
            return Err(invalid("probe_timeout_ms", self.probe_timeout_ms));
        }
        if self.debounce_threshold == 0 {
            return Err(invalid("debounce_threshold", self.debounce_threshold));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", self.max_attempts));
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(invalid("backoff_cap_ms", self.backoff_cap_ms));
        }
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity", self.history_capacity));
        }
        if self.status_channel_capacity == 0 {
            return Err(invalid(
                "status_channel_capacity",
                self.status_channel_capacity,
            ));
        }
        Ok(())
    }

    /// Monitor polling interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Probe time box
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Backoff delay before the given retry, exponential and capped.
    /// `attempt` is 1-based; the first retry waits the base delay.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        let delay = self
            .backoff_base_ms
            .saturating_mul(factor)
            .min(self.backoff_cap_ms);
        Duration::from_millis(delay)
    }
}

fn invalid(field: &str, value: impl std::fmt::Display) -> RecoveryError {
    RecoveryError::Config {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RecoveryConfig::default();
        assert!(config.validate().is_ok());

        // Timeout and interval pair must leave room for a probe per tick
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.probe_timeout_ms, DEFAULT_PROBE_TIMEOUT_MS);
        assert_eq!(config.debounce_threshold, DEFAULT_DEBOUNCE_THRESHOLD);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut config = RecoveryConfig::default();
        config.debounce_threshold = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RecoveryError::Config { ref field, .. } if field == "debounce_threshold"));

        let mut config = RecoveryConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = RecoveryConfig::default();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RecoveryConfig {
            backoff_base_ms: 500,
            backoff_cap_ms: 3000,
            ..Default::default()
        };

        assert_eq!(config.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(2000));
        assert_eq!(config.backoff_delay(4), Duration::from_millis(3000));
        // Far past the cap, still the cap (no overflow)
        assert_eq!(config.backoff_delay(64), Duration::from_millis(3000));
    }

    #[test]
    fn cap_below_base_is_rejected() {
        let config = RecoveryConfig {
            backoff_base_ms: 1000,
            backoff_cap_ms: 500,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = RecoveryConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RecoveryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.poll_interval_ms, config.poll_interval_ms);
        assert_eq!(parsed.history_capacity, config.history_capacity);
    }
}
