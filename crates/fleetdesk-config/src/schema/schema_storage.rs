//! Token storage and logging configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::default_true;
use crate::ConfigLoader;

/// Durable token store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: String,

    /// Fixed key the credential is stored under.
    #[serde(default = "default_token_key")]
    pub token_key: String,

    /// Fixed key the cached profile is stored under.
    #[serde(default = "default_user_key")]
    pub user_key: String,
}

fn default_storage_dir() -> String {
    "~/.fleetdesk".to_string()
}

fn default_token_key() -> String {
    "auth_token".to_string()
}

fn default_user_key() -> String {
    "user_info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            token_key: default_token_key(),
            user_key: default_user_key(),
        }
    }
}

impl StorageConfig {
    /// Storage directory with `~` expanded.
    pub fn resolved_dir(&self) -> PathBuf {
        PathBuf::from(ConfigLoader::expand_path(&self.dir))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolved_dir().join("logs")
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Also write daily-rotated log files.
    #[serde(default = "default_true")]
    pub file: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: default_true(),
        }
    }
}
