//! Token store trait.

use async_trait::async_trait;

use fleetdesk_config::StorageConfig;
use fleetdesk_protocols::{StorageError, UserProfile};

/// Fixed key names the credential and profile are persisted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    pub token: String,
    pub user: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for StoreKeys {
    fn from(config: &StorageConfig) -> Self {
        Self {
            token: config.token_key.clone(),
            user: config.user_key.clone(),
        }
    }
}

/// What a store currently holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredCredentials {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

impl StoredCredentials {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.user.is_none()
    }
}

/// Durable holder of the credential and cached profile. Makes no network
/// calls. The session manager is its only writer.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<StoredCredentials, StorageError>;

    /// Persist a fresh credential together with its profile.
    async fn save(&self, token: &str, user: &UserProfile) -> Result<(), StorageError>;

    /// Replace the cached profile, keeping the credential.
    async fn save_user(&self, user: &UserProfile) -> Result<(), StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;
}
