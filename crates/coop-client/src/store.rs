//! Token storage.
//!
//! The client never keeps credentials in its own memory between requests:
//! the access token is read from a [`TokenStore`] before every request, and
//! refresh/login/logout write through it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::Credentials;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ============================================================================
// TokenStore Trait
// ============================================================================

/// Secure key-value storage for credentials.
#[async_trait]
pub trait TokenStore: Send + Sync + std::fmt::Debug {
    /// Read a value. Absent keys yield `None`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove a value. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Load both tokens, if both are present.
    async fn load_credentials(&self) -> StoreResult<Option<Credentials>> {
        let access = self.get(ACCESS_TOKEN_KEY).await?;
        let refresh = self.get(REFRESH_TOKEN_KEY).await?;
        Ok(match (access, refresh) {
            (Some(access_token), Some(refresh_token)) => Some(Credentials {
                access_token,
                refresh_token,
            }),
            _ => None,
        })
    }

    /// Persist both tokens.
    async fn save_credentials(&self, credentials: &Credentials) -> StoreResult<()> {
        self.set(ACCESS_TOKEN_KEY, &credentials.access_token).await?;
        self.set(REFRESH_TOKEN_KEY, &credentials.refresh_token)
            .await
    }

    /// Delete both tokens.
    ///
    /// Both deletes are always attempted; the first error is returned.
    async fn clear(&self) -> StoreResult<()> {
        let access = self.delete(ACCESS_TOKEN_KEY).await;
        let refresh = self.delete(REFRESH_TOKEN_KEY).await;
        access.and(refresh)
    }
}

/// Shared token store for use across async contexts.
pub type SharedTokenStore = Arc<dyn TokenStore>;

// ============================================================================
// InMemoryTokenStore
// ============================================================================

/// In-memory token store. Default backend, and the one used in tests.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with credentials.
    pub fn with_credentials(credentials: &Credentials) -> Self {
        let mut values = HashMap::new();
        values.insert(
            ACCESS_TOKEN_KEY.to_string(),
            credentials.access_token.clone(),
        );
        values.insert(
            REFRESH_TOKEN_KEY.to_string(),
            credentials.refresh_token.clone(),
        );
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// FileTokenStore
// ============================================================================

/// Default token file name within the coop config directory.
pub const TOKEN_FILE: &str = "tokens.json";

/// File-backed token store: a single JSON object, readable only by the owner.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cache: RwLock<Option<HashMap<String, String>>>,
}

impl FileTokenStore {
    /// Create a store at `<dir>/tokens.json`.
    pub fn new(dir: &Path) -> Self {
        Self::with_path(dir.join(TOKEN_FILE))
    }

    /// Create with a custom file path.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            cache: RwLock::new(None),
        }
    }

    /// Get the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_file(&self) -> StoreResult<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write_file(&self, values: &HashMap<String, String>) -> StoreResult<()> {
        if values.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.io_error(e)),
            };
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, json).map_err(|e| self.io_error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| self.io_error(e))?;
        }

        Ok(())
    }

    async fn update<F>(&self, apply: F) -> StoreResult<()>
    where
        F: FnOnce(&mut HashMap<String, String>) + Send,
    {
        let mut cache = self.cache.write().await;
        let mut values = match cache.take() {
            Some(values) => values,
            None => self.read_file()?,
        };
        apply(&mut values);
        self.write_file(&values)?;
        *cache = Some(values);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        {
            let cache = self.cache.read().await;
            if let Some(values) = cache.as_ref() {
                return Ok(values.get(key).cloned());
            }
        }

        let values = self.read_file()?;
        let value = values.get(key).cloned();
        *self.cache.write().await = Some(values);
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.update(move |values| {
            values.insert(key, value);
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let owned = key.to_string();
        self.update(move |values| {
            values.remove(&owned);
        })
        .await?;
        tracing::debug!(path = %self.path.display(), %key, "Deleted stored token");
        Ok(())
    }
}

// ============================================================================
// KeyringTokenStore
// ============================================================================

/// Keyring service name.
#[cfg(feature = "keyring")]
const SERVICE_NAME: &str = "coop";

/// OS keyring token store (macOS Keychain, Linux secret-service, Windows
/// Credential Manager). Entries are service="coop", user=`<key>`.
#[cfg(feature = "keyring")]
#[derive(Debug, Default)]
pub struct KeyringTokenStore {
    service: String,
}

#[cfg(feature = "keyring")]
impl KeyringTokenStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Use a different keyring service name (one per server, for example).
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> StoreResult<keyring::Entry> {
        keyring::Entry::new(&self.service, key).map_err(|e| StoreError::Keyring(e.to_string()))
    }
}

#[cfg(feature = "keyring")]
#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keyring(e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| StoreError::Keyring(format!("failed to store in keyring: {}", e)))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keyring(format!(
                "failed to delete from keyring: {}",
                e
            ))),
        }
    }
}
