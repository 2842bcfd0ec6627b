//! Reconnect backoff.

use std::time::Duration;

use fleetdesk_config::RealtimeConfig;

/// Delay and attempt budget for reconnecting.
///
/// The delay never decreases from one attempt to the next and never exceeds
/// `max_delay` (or `base_delay`, whichever is larger).
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    /// Growth per attempt. Values below 1.0 are treated as 1.0.
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Failed attempts tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for ReconnectPolicy {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            base_delay: config.reconnect_delay(),
            multiplier: config.backoff_multiplier,
            max_delay: config.max_reconnect_delay(),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_attempts,
        }
    }

    /// Delay before the attempt that follows `failures` consecutive failures.
    /// `failures` of 0 and 1 both give the base delay.
    pub fn delay_for_attempt(&self, failures: u32) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier > 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let exponent = failures.saturating_sub(1).min(64) as i32;
        let cap = self.max_delay.max(self.base_delay).as_millis() as f64;
        let delay = (self.base_delay.as_millis() as f64 * multiplier.powi(exponent)).min(cap);
        Duration::from_millis(delay as u64)
    }
}
