//! Login, logout and logout listeners.

use std::sync::Arc;

use crate::client::ApiClient;
use crate::error::{NormalizedError, Result};
use crate::listeners::{BoxError, ListenerId};
use crate::types::Credentials;

impl ApiClient {
    /// Store freshly issued credentials and restore the full refresh budget.
    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        self.inner()
            .store
            .save_credentials(credentials)
            .await
            .map_err(|e| NormalizedError::connection_failed(e.to_string()))?;
        self.inner().refresh.reset();
        tracing::info!("Credentials stored");
        Ok(())
    }

    /// Whether both tokens are present in the store.
    pub async fn is_logged_in(&self) -> bool {
        matches!(self.inner().store.load_credentials().await, Ok(Some(_)))
    }

    /// End the session.
    ///
    /// Deletes both tokens, then invokes every logout listener exactly once.
    /// Never fails: storage and listener errors are logged.
    pub async fn logout(&self) {
        let inner = self.inner();

        if let Err(e) = inner.store.clear().await {
            tracing::error!(error = %e, "Failed to delete stored tokens during logout");
        }
        inner.refresh.reset();

        let total = inner.listeners.len();
        let ok = inner.listeners.notify();
        tracing::info!(listeners = total, failed = total - ok, "Logged out");
    }

    /// Register a callback invoked on every logout.
    pub fn on_logout<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.inner().listeners.register(Arc::new(listener))
    }

    /// Remove a previously registered callback. Returns false if it was unknown.
    pub fn remove_logout_listener(&self, id: ListenerId) -> bool {
        self.inner().listeners.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::StoreError;
    use crate::store::{ACCESS_TOKEN_KEY, InMemoryTokenStore, REFRESH_TOKEN_KEY, StoreResult, TokenStore};

    /// Store whose deletes always fail.
    #[derive(Debug, Default)]
    struct StuckStore {
        inner: InMemoryTokenStore,
    }

    #[async_trait]
    impl TokenStore for StuckStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            self.inner.set(key, value).await
        }

        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::Keyring("locked".to_string()))
        }
    }

    fn client_with(store: Arc<dyn TokenStore>) -> ApiClient {
        ApiClient::builder()
            .base_url("http://localhost:8080")
            .token_store(store)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let store = Arc::new(InMemoryTokenStore::new());
        let client = client_with(store.clone());

        client.login(&Credentials::new("a", "r")).await.unwrap();
        assert!(client.is_logged_in().await);
        assert_eq!(
            store.load_credentials().await.unwrap(),
            Some(Credentials::new("a", "r"))
        );

        client.logout().await;
        assert!(!client.is_logged_in().await);
        assert!(store.get(ACCESS_TOKEN_KEY).await.unwrap().is_none());
        assert!(store.get(REFRESH_TOKEN_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_notifies_each_listener_once() {
        let client = client_with(Arc::new(InMemoryTokenStore::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        client.on_logout(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        client.on_logout(|| Err("navigation unavailable".into()));
        let c = calls.clone();
        client.on_logout(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        client.logout().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_listeners_fire_when_delete_fails() {
        let client = client_with(Arc::new(StuckStore::default()));
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        client.on_logout(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        client.logout().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_removed_listener_is_not_called() {
        let client = client_with(Arc::new(InMemoryTokenStore::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let id = client.on_logout(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(client.remove_logout_listener(id));
        client.logout().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
