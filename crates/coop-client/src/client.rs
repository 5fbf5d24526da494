//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{BuildError, NormalizedError, Result, normalize_status};
use crate::listeners::LogoutListeners;
use crate::refresh::RefreshState;
use crate::store::{ACCESS_TOKEN_KEY, InMemoryTokenStore, SharedTokenStore};
use crate::upload::Upload;

/// Default timeout for requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Default API version path segment.
pub const DEFAULT_API_VERSION: &str = "v1";

/// Default number of token refreshes allowed before forcing logout.
pub const DEFAULT_MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Coop API client.
///
/// Attaches the stored access token to every request, normalizes every
/// failure into a [`NormalizedError`], and recovers from an expired token by
/// refreshing it and retrying the request once.
///
/// Clones share state, including the refresh budget.
///
/// # Example
///
/// ```no_run
/// use coop_client::{ApiClient, Credentials};
///
/// # async fn example() -> coop_client::Result<()> {
/// let client = ApiClient::builder()
///     .base_url("https://api.example.com")
///     .build()
///     .expect("valid config");
///
/// client.login(&Credentials::new("access", "refresh")).await?;
/// let flocks: serde_json::Value = client.get("flocks").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    /// Inner shared state.
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct ClientInner {
    /// HTTP client.
    pub(crate) http: reqwest::Client,
    /// Request base: `{base_url}/api/{api_version}/`.
    pub(crate) api_base: Url,
    /// Request timeout.
    pub(crate) timeout: Duration,
    /// Credential storage.
    pub(crate) store: SharedTokenStore,
    /// Callbacks fired on logout.
    pub(crate) listeners: LogoutListeners,
    /// Refresh budget and single-flight gate.
    pub(crate) refresh: RefreshState,
}

/// Body of an outbound request.
pub(crate) enum Payload {
    Empty,
    Json(serde_json::Value),
    Multipart(Upload),
}

/// Everything needed to send (and re-send) one logical request.
pub(crate) struct PreparedRequest<'a> {
    pub(crate) method: Method,
    pub(crate) path: &'a str,
    pub(crate) payload: Payload,
    pub(crate) timeout: Duration,
    pub(crate) cancel: Option<CancellationToken>,
}

impl<'a> PreparedRequest<'a> {
    fn new(method: Method, path: &'a str, payload: Payload, timeout: Duration) -> Self {
        Self {
            method,
            path,
            payload,
            timeout,
            cancel: None,
        }
    }
}

impl ApiClient {
    /// Get access to the inner client state.
    pub(crate) fn inner(&self) -> &ClientInner {
        &self.inner
    }

    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the request base URL (`{base_url}/api/{api_version}/`).
    pub fn base_url(&self) -> &Url {
        &self.inner.api_base
    }

    /// Get the default request timeout.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Get the token store this client reads credentials from.
    pub fn token_store(&self) -> &SharedTokenStore {
        &self.inner.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verbs
    // ─────────────────────────────────────────────────────────────────────────

    /// Make a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = PreparedRequest::new(Method::GET, path, Payload::Empty, self.inner.timeout);
        self.execute(&request).await
    }

    /// Make a POST request.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.with_body(Method::POST, path, body).await
    }

    /// Make a PUT request.
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.with_body(Method::PUT, path, body).await
    }

    /// Make a PATCH request.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.with_body(Method::PATCH, path, body).await
    }

    /// Make a DELETE request.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request =
            PreparedRequest::new(Method::DELETE, path, Payload::Empty, self.inner.timeout);
        self.execute(&request).await
    }

    /// Upload a file as `multipart/form-data` with a POST request.
    ///
    /// Honors the upload's progress callback, cancellation token and timeout
    /// override. Cancellation is reported as a request timeout.
    pub async fn upload_file<T: DeserializeOwned>(&self, path: &str, upload: Upload) -> Result<T> {
        let timeout = upload.timeout_override().unwrap_or(self.inner.timeout);
        let cancel = upload.cancellation().cloned();
        let mut request = PreparedRequest::new(Method::POST, path, Payload::Multipart(upload), timeout);
        request.cancel = cancel;
        self.execute(&request).await
    }

    async fn with_body<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let value = serde_json::to_value(body).map_err(|e| {
            NormalizedError::connection_failed(format!("failed to encode request body: {}", e))
        })?;
        let request = PreparedRequest::new(method, path, Payload::Json(value), self.inner.timeout);
        self.execute(&request).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner.api_base.join(path).map_err(|e| {
            NormalizedError::connection_failed(format!("invalid request path '{}': {}", path, e))
        })
    }

    /// Send a request, refreshing credentials and retrying once on 401/403.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        request: &PreparedRequest<'_>,
    ) -> Result<T> {
        let mut retried = false;
        loop {
            let generation = self.inner.refresh.generation();
            match self.dispatch(request).await {
                Ok(value) => {
                    self.inner.refresh.reset();
                    return Ok(value);
                }
                Err(err) if err.is_auth_rejection() && !retried => {
                    tracing::debug!(
                        method = %request.method,
                        path = request.path,
                        status = err.status,
                        "Request rejected, refreshing credentials"
                    );
                    self.handle_unauthorized(generation).await?;
                    retried = true;
                }
                Err(err) => {
                    tracing::debug!(
                        method = %request.method,
                        path = request.path,
                        kind = ?err.kind,
                        status = err.status,
                        "Request failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Send a single attempt.
    async fn dispatch<T: DeserializeOwned>(&self, request: &PreparedRequest<'_>) -> Result<T> {
        let url = self.url(request.path)?;
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .timeout(request.timeout);

        if let Some(token) = self.access_token().await {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.payload {
            Payload::Empty => builder,
            Payload::Json(value) => builder.json(value),
            Payload::Multipart(upload) => builder.multipart(upload.to_form()?),
        };

        tracing::debug!(method = %request.method, path = request.path, "Sending request");

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, NormalizedError>((status, body))
        };

        let (status, body) = match &request.cancel {
            Some(cancel) => tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(NormalizedError::request_timeout().with_detail("request cancelled"));
                }
                result = exchange => result?,
            },
            None => exchange.await?,
        };

        if status.is_success() {
            decode_body(&body)
        } else {
            Err(normalize_status(status.as_u16(), Some(&body)))
        }
    }

    /// Read the access token. Storage failures count as "no token".
    async fn access_token(&self) -> Option<String> {
        match self.inner.store.get(ACCESS_TOKEN_KEY).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read access token, sending unauthenticated");
                None
            }
        }
    }
}

/// Decode a success body. An empty body decodes as JSON `null`.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| {
        NormalizedError::connection_failed(format!("failed to decode response body: {}", e))
    })
}

/// Builder for creating an ApiClient.
pub struct ClientBuilder {
    base_url: Option<String>,
    api_version: String,
    timeout: Duration,
    max_refresh_attempts: u32,
    token_store: Option<SharedTokenStore>,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_refresh_attempts: DEFAULT_MAX_REFRESH_ATTEMPTS,
            token_store: None,
            user_agent: None,
        }
    }

    /// Set the base URL for the server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the API version path segment.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the request timeout in milliseconds.
    pub fn timeout_ms(self, millis: u64) -> Self {
        self.timeout(Duration::from_millis(millis))
    }

    /// Set how many refreshes may happen before logout is forced.
    pub fn max_refresh_attempts(mut self, attempts: u32) -> Self {
        self.max_refresh_attempts = attempts;
        self
    }

    /// Set the credential store.
    pub fn token_store(mut self, store: SharedTokenStore) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> std::result::Result<ApiClient, BuildError> {
        let base_url = self
            .base_url
            .ok_or_else(|| BuildError::Config("base_url is required".to_string()))?;

        let version = self.api_version.trim_matches('/');
        if version.is_empty() {
            return Err(BuildError::Config("api_version must not be empty".to_string()));
        }

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(BuildError::Config(format!(
                "'{}' cannot be used as a base URL",
                base_url
            )));
        }
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let api_base = base_url.join(&format!("api/{}/", version))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("coop-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        let store = self
            .token_store
            .unwrap_or_else(|| Arc::new(InMemoryTokenStore::new()));

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                api_base,
                timeout: self.timeout,
                store,
                listeners: LogoutListeners::default(),
                refresh: RefreshState::new(self.max_refresh_attempts),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .field("max_refresh_attempts", &self.max_refresh_attempts)
            .field("token_store", &self.token_store)
            .finish()
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.api_base.as_str())
            .field("timeout", &self.inner.timeout)
            .field("refresh_attempts", &self.inner.refresh.attempts())
            .finish()
    }
}
