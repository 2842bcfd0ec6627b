//! File-based token store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use fleetdesk_protocols::{StorageError, UserProfile};

use crate::store::{StoreKeys, StoredCredentials, TokenStore};

/// Stores the credential in `<dir>/<token key>` and the profile in
/// `<dir>/<user key>.json`. Writes go through a temporary file and a rename.
pub struct FileTokenStore {
    directory: PathBuf,
    keys: StoreKeys,
}

impl FileTokenStore {
    pub fn new(directory: PathBuf, keys: StoreKeys) -> Self {
        Self { directory, keys }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub(crate) fn token_path(&self) -> PathBuf {
        self.directory.join(&self.keys.token)
    }

    pub(crate) fn user_path(&self) -> PathBuf {
        self.directory.join(format!("{}.json", self.keys.user))
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        restrict_permissions(&tmp).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn read_if_exists(path: &Path) -> Result<Option<String>, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<StoredCredentials, StorageError> {
        let token = read_if_exists(&self.token_path())
            .await?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let user = match read_if_exists(&self.user_path()).await? {
            Some(json) => Some(serde_json::from_str::<UserProfile>(&json)?),
            None => None,
        };

        Ok(StoredCredentials { token, user })
    }

    async fn save(&self, token: &str, user: &UserProfile) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(user)?;
        // profile first: a token on disk always has its profile next to it
        self.write_atomic(&self.user_path(), &json).await?;
        self.write_atomic(&self.token_path(), token.as_bytes()).await?;
        debug!("Saved credentials to {:?}", self.directory);
        Ok(())
    }

    async fn save_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(user)?;
        self.write_atomic(&self.user_path(), &json).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        remove_if_exists(&self.token_path()).await?;
        remove_if_exists(&self.user_path()).await?;
        debug!("Cleared credentials in {:?}", self.directory);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileTokenStore {
        FileTokenStore::new(dir.path().join("state"), StoreKeys::default())
    }

    #[tokio::test]
    async fn test_load_empty_directory() {
        let dir = TempDir::new().unwrap();
        let loaded = store(&dir).load().await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let user = UserProfile::new("u-1").with_email("a@b.com");

        store.save("tok-123", &user).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.token.as_deref(), Some("tok-123"));
        assert_eq!(loaded.user, Some(user));
    }

    #[tokio::test]
    async fn test_fixed_key_file_names() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("tok", &UserProfile::new("u-1")).await.unwrap();

        assert!(dir.path().join("state/auth_token").exists());
        assert!(dir.path().join("state/user_info.json").exists());
        assert!(!dir.path().join("state/auth_token.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_user_keeps_token() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("tok", &UserProfile::new("u-1")).await.unwrap();
        store
            .save_user(&UserProfile::new("u-1").with_name("Dana"))
            .await
            .unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.token.as_deref(), Some("tok"));
        assert_eq!(loaded.user.unwrap().name.as_deref(), Some("Dana"));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("tok", &UserProfile::new("u-1")).await.unwrap();

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_profile_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.directory()).unwrap();
        std::fs::write(store.user_path(), "{not json").unwrap();

        let result = store.load().await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save("tok", &UserProfile::new("u-1")).await.unwrap();

        let mode = std::fs::metadata(store.token_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
