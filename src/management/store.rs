//! Durable storage for the refresh credential.

use std::{collections::HashMap, env, path::PathBuf, sync::Mutex};

use async_trait::async_trait;
use keyring::Entry;

use crate::{config, error::StoreError};

pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const KEYRING_SERVICE: &str = "lofisync";

/// Key/value persistence scoped to the local OS user.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// OS keychain backed store.
///
/// Uses platform-specific secure storage:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service, with keyutils as a session cache
///
/// Keychain calls block, so each one runs on the blocking thread pool.
pub struct KeyringCredentialStore {
    service: String,
    user: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: local_user(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, &format!("{key}@{}", self.user)).map_err(map_keyring_error)
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entry = self.entry(key)?;
        blocking(move || match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(map_keyring_error(e)),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let entry = self.entry(key)?;
        let value = value.to_string();
        blocking(move || entry.set_password(&value).map_err(map_keyring_error)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let entry = self.entry(key)?;
        blocking(move || match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(map_keyring_error(e)),
        })
        .await
    }
}

async fn blocking<T, F>(call: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| StoreError::Backend(format!("keychain task failed: {e}")))?
}

fn map_keyring_error(e: keyring::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn local_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "default".to_string())
}

/// JSON file store for hosts without a usable keychain.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new() -> Self {
        Self::at(config::data_dir().join("credentials.json"))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match async_fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, values: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(values)?;
        async_fs::write(&self.path, json).await?;
        Ok(())
    }
}

impl Default for FileCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());
        self.persist(&values).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            self.persist(&values).await?;
        }
        Ok(())
    }
}

/// Process-local store, used by tests and one-off runs.
#[derive(Default)]
pub struct MemoryCredentialStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh_token(token: impl Into<String>) -> Self {
        let store = Self::default();
        if let Ok(mut values) = store.values.lock() {
            values.insert(REFRESH_TOKEN_KEY.to_string(), token.into());
        }
        store
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.values
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);

        store.set(REFRESH_TOKEN_KEY, "abc").await.unwrap();
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("abc")
        );

        store.delete(REFRESH_TOKEN_KEY).await.unwrap();
        store.delete(REFRESH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let path = std::env::temp_dir().join(format!(
            "lofisync-store-{}/credentials.json",
            crate::utils::generate_state()
        ));

        let store = FileCredentialStore::at(path.clone());
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);
        store.set(REFRESH_TOKEN_KEY, "persisted").await.unwrap();

        let reopened = FileCredentialStore::at(path.clone());
        assert_eq!(
            reopened.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("persisted")
        );

        reopened.delete(REFRESH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn keychain_calls_leave_the_runtime_thread() {
        let runtime_thread = std::thread::current().id();

        let ran_on = blocking(|| Ok(std::thread::current().id())).await.unwrap();
        assert_ne!(ran_on, runtime_thread);

        let err = blocking::<(), _>(|| Err(StoreError::Backend("locked".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(reason) if reason == "locked"));
    }

    // Needs an unlocked Secret Service / Keychain session.
    #[tokio::test]
    #[ignore]
    async fn keyring_store_round_trip() {
        let store = KeyringCredentialStore::with_service(format!(
            "lofisync-test-{}",
            crate::utils::generate_state()
        ));

        store.set(REFRESH_TOKEN_KEY, "kept").await.unwrap();
        let reopened = KeyringCredentialStore::with_service(store.service.clone());
        assert_eq!(
            reopened.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(),
            Some("kept")
        );

        reopened.delete(REFRESH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(REFRESH_TOKEN_KEY).await.unwrap(), None);
    }
}
