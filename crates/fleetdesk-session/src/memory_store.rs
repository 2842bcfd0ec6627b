//! In-memory token store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use fleetdesk_protocols::{StorageError, UserProfile};

use crate::store::{StoreKeys, StoredCredentials, TokenStore};

/// Key/value token store held in memory. Values are stored exactly as the
/// file store writes them, so `raw` shows what would be persisted.
#[derive(Default)]
pub struct MemoryTokenStore {
    keys: StoreKeys,
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(keys: StoreKeys) -> Self {
        Self {
            keys,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Raw stored value under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<StoredCredentials, StorageError> {
        let entries = self.entries.lock();
        let token = entries.get(&self.keys.token).cloned();
        let user = match entries.get(&self.keys.user) {
            Some(json) => Some(serde_json::from_str(json)?),
            None => None,
        };
        Ok(StoredCredentials { token, user })
    }

    async fn save(&self, token: &str, user: &UserProfile) -> Result<(), StorageError> {
        let json = serde_json::to_string(user)?;
        let mut entries = self.entries.lock();
        entries.insert(self.keys.user.clone(), json);
        entries.insert(self.keys.token.clone(), token.to_string());
        Ok(())
    }

    async fn save_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        let json = serde_json::to_string(user)?;
        self.entries.lock().insert(self.keys.user.clone(), json);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        entries.remove(&self.keys.token);
        entries.remove(&self.keys.user);
        Ok(())
    }
}
