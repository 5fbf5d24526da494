//! Token refresh.
//!
//! Refreshes are single-flight: concurrent requests that are rejected with
//! the same (stale) token queue on one gate, the first one calls the refresh
//! endpoint, and the rest reuse its outcome. A shared attempt counter bounds
//! how many refreshes can happen before the session is forcibly ended.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::client::ApiClient;
use crate::error::{
    NO_REFRESH_TOKEN_MESSAGE, NormalizedError, REFRESH_FAILED_MESSAGE, Result, normalize_status,
    status,
};
use crate::store::REFRESH_TOKEN_KEY;
use crate::types::{Credentials, RefreshTokenRequest, RefreshTokenResponse};

/// Refresh endpoint, relative to the API base.
pub const REFRESH_PATH: &str = "auth/refresh-token";

/// Shared refresh state.
#[derive(Debug)]
pub(crate) struct RefreshState {
    max_attempts: u32,
    attempts: AtomicU32,
    /// Bumped each time a refresh finishes, successfully or not.
    generation: AtomicU64,
    /// Serializes refreshes; holds the outcome of the last one.
    gate: Mutex<Option<Result<()>>>,
}

impl RefreshState {
    pub(crate) fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            gate: Mutex::new(None),
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.attempts.store(0, Ordering::Release);
    }
}

impl ApiClient {
    /// Number of refreshes since the server last accepted a request.
    pub fn refresh_attempts(&self) -> u32 {
        self.inner().refresh.attempts()
    }

    /// Refresh budget before logout is forced.
    pub fn max_refresh_attempts(&self) -> u32 {
        self.inner().refresh.max_attempts
    }

    /// Exchange the stored refresh token for a new token pair now.
    ///
    /// Counts against the refresh budget exactly like an automatic refresh.
    pub async fn refresh(&self) -> Result<()> {
        let generation = self.inner().refresh.generation();
        self.handle_unauthorized(generation).await
    }

    /// Recover from a 401/403 seen by a request sent at `observed_generation`.
    ///
    /// If another task finished a refresh after that request was sent, its
    /// outcome is returned without calling the endpoint again.
    pub(crate) async fn handle_unauthorized(&self, observed_generation: u64) -> Result<()> {
        let state = &self.inner().refresh;
        let mut last_outcome = state.gate.lock().await;

        if state.generation() != observed_generation {
            tracing::debug!("Credentials already refreshed by a concurrent request");
            return last_outcome.clone().unwrap_or(Ok(()));
        }

        let outcome = self.run_refresh().await;
        *last_outcome = Some(outcome.clone());
        state.generation.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn run_refresh(&self) -> Result<()> {
        let state = &self.inner().refresh;

        let attempts = state.attempts();
        if attempts >= state.max_attempts {
            tracing::warn!(
                attempts,
                max = state.max_attempts,
                "Max refresh attempts exceeded, logging out"
            );
            self.logout().await;
            return Err(NormalizedError::max_refresh_exceeded());
        }

        let attempt = state.attempts.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(attempt, max = state.max_attempts, "Refreshing access token");

        match self.request_new_tokens().await {
            Ok(()) => {
                tracing::info!(attempt, "Access token refreshed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    attempt,
                    status = err.status,
                    message = %err.message,
                    "Token refresh failed, logging out"
                );
                self.logout().await;
                Err(err)
            }
        }
    }

    /// Call the refresh endpoint and persist the new pair.
    async fn request_new_tokens(&self) -> Result<()> {
        let inner = self.inner();

        let refresh_token = match inner.store.get(REFRESH_TOKEN_KEY).await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return Err(NormalizedError::unauthorized(NO_REFRESH_TOKEN_MESSAGE)),
            Err(e) => {
                return Err(
                    NormalizedError::unauthorized(NO_REFRESH_TOKEN_MESSAGE).with_detail(e.to_string())
                );
            }
        };

        // No bearer header: the refresh token in the body is the credential.
        let url = self.url(REFRESH_PATH)?;
        let response = inner
            .http
            .post(url)
            .json(&RefreshTokenRequest {
                refresh_token: &refresh_token,
            })
            .timeout(inner.timeout)
            .send()
            .await?;

        let code = response.status().as_u16();
        let body = response.bytes().await?;
        if code != status::OK {
            return Err(normalize_status(code, Some(&body)));
        }

        let parsed: RefreshTokenResponse = serde_json::from_slice(&body).map_err(|e| {
            NormalizedError::unauthorized(REFRESH_FAILED_MESSAGE).with_detail(e.to_string())
        })?;
        let credentials: Credentials = parsed.into_credentials().map_err(|message| {
            NormalizedError::unauthorized(
                message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| REFRESH_FAILED_MESSAGE.to_string()),
            )
        })?;

        inner
            .store
            .save_credentials(&credentials)
            .await
            .map_err(|e| NormalizedError::connection_failed(e.to_string()))
    }
}
