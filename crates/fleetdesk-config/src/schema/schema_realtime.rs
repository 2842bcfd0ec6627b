//! Realtime connection and transfer queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::default_true;

/// Realtime connection and reconnect policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Realtime endpoint. `http(s)://` is accepted and mapped to `ws(s)://`.
    #[serde(default = "default_realtime_url")]
    pub url: String,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Failed attempts tolerated before the connection gives up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// 1.0 keeps the delay constant.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Connect after authentication and disconnect after logout.
    #[serde(default = "default_true")]
    pub auto_connect: bool,
}

fn default_realtime_url() -> String {
    "ws://127.0.0.1:3000/realtime".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_realtime_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            backoff_multiplier: default_backoff_multiplier(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            auto_connect: default_true(),
        }
    }
}

impl RealtimeConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }
}

/// Transfer queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Maximum number of simultaneously active transfers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    3
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}
