//! Client error types.
//!
//! Every request-time failure is reported as a [`NormalizedError`]: a stable
//! `{ success: false, status, message, error? }` shape that callers can show
//! or serialize without knowing which layer failed. Transport errors from
//! `reqwest` never escape the client.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status codes used by the client.
///
/// The synthetic codes sit outside the HTTP range (100-599) so they can never
/// be confused with a status the server actually sent.
pub mod status {
    pub const OK: u16 = 200;
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;

    pub const NETWORK_ERROR: u16 = 900;
    pub const SERVER_UNREACHABLE: u16 = 903;
    pub const REQUEST_TIMEOUT: u16 = 908;
    pub const CONNECTION_FAILED: u16 = 999;
}

pub(crate) const SERVER_ERROR_MESSAGE: &str = "Server error - please try again later";
pub(crate) const DEFAULT_SERVER_MESSAGE: &str = "An error occurred";
pub(crate) const TIMEOUT_MESSAGE: &str =
    "Request timeout - please check your connection and try again";
pub(crate) const NETWORK_MESSAGE: &str =
    "No internet connection - please check your network and try again";
pub(crate) const UNREACHABLE_MESSAGE: &str = "Cannot reach server - please try again later";
pub(crate) const CONNECTION_FAILED_MESSAGE: &str = "Connection failed";
pub(crate) const MAX_REFRESH_MESSAGE: &str = "Max refresh attempts exceeded";
pub(crate) const NO_REFRESH_TOKEN_MESSAGE: &str = "No refresh token available";
pub(crate) const REFRESH_FAILED_MESSAGE: &str = "Token refresh failed";

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The server answered with a 5xx status.
    ServerError,
    /// The server answered with a 4xx status other than 401/403.
    ClientError,
    /// 401 from the server, or a refresh that could not produce new tokens.
    Unauthorized,
    /// 403 from the server.
    Forbidden,
    /// Local timeout or aborted request.
    RequestTimeout,
    /// No network connectivity.
    NetworkError,
    /// Connection refused or host lookup failed.
    ServerUnreachable,
    /// Anything that fits nowhere else.
    ConnectionFailed,
    /// The refresh budget ran out; the session was logged out.
    MaxRefreshExceeded,
}

/// The single error shape surfaced by every request operation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} (status {status})")]
pub struct NormalizedError {
    /// Always `false`; kept so the serialized form matches API envelopes.
    pub success: bool,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Real HTTP status, or one of the synthetic codes in [`status`].
    pub status: u16,
    /// Human-readable message.
    pub message: String,
    /// Underlying detail (server `error` field or transport error text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NormalizedError {
    /// Create an error without detail.
    pub fn new(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            kind,
            status,
            message: message.into(),
            error: None,
        }
    }

    /// Attach underlying detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.error = Some(detail.into());
        self
    }

    pub(crate) fn request_timeout() -> Self {
        Self::new(
            ErrorKind::RequestTimeout,
            status::REQUEST_TIMEOUT,
            TIMEOUT_MESSAGE,
        )
    }

    pub(crate) fn connection_failed(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::ConnectionFailed,
            status::CONNECTION_FAILED,
            CONNECTION_FAILED_MESSAGE,
        )
        .with_detail(detail)
    }

    pub(crate) fn max_refresh_exceeded() -> Self {
        Self::new(
            ErrorKind::MaxRefreshExceeded,
            status::UNAUTHORIZED,
            MAX_REFRESH_MESSAGE,
        )
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, status::UNAUTHORIZED, message)
    }

    /// True for 401 and 403 responses, the two that trigger a token refresh.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.kind, ErrorKind::Unauthorized | ErrorKind::Forbidden)
            && matches!(self.status, status::UNAUTHORIZED | status::FORBIDDEN)
    }

    /// True if no response was received at all.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::RequestTimeout
                | ErrorKind::NetworkError
                | ErrorKind::ServerUnreachable
                | ErrorKind::ConnectionFailed
        )
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::ClientError && self.status == 404
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        self.kind == ErrorKind::ServerError
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, NormalizedError>;

/// Errors raised while building an [`ApiClient`](crate::ApiClient).
#[derive(Debug, Error)]
pub enum BuildError {
    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be created.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised by a [`TokenStore`](crate::TokenStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("token file error at '{path}': {source}")]
    Io { path: String, source: io::Error },

    /// Stored data could not be (de)serialized.
    #[error("token serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// OS keyring failure.
    #[error("keyring error: {0}")]
    Keyring(String),
}

/// Error body returned by the API on failure.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Classify a response that arrived with a non-success status.
///
/// Server errors are checked first, then the status is echoed back with the
/// server's own message when one was sent.
pub fn normalize_status(code: u16, body: Option<&[u8]>) -> NormalizedError {
    let parsed: ErrorResponse = body
        .and_then(|b| serde_json::from_slice(b).ok())
        .unwrap_or_default();

    if code >= 500 {
        let err = NormalizedError::new(ErrorKind::ServerError, code, SERVER_ERROR_MESSAGE);
        return match parsed.error.or(parsed.message) {
            Some(detail) => err.with_detail(detail),
            None => err,
        };
    }

    let kind = match code {
        status::UNAUTHORIZED => ErrorKind::Unauthorized,
        status::FORBIDDEN => ErrorKind::Forbidden,
        _ => ErrorKind::ClientError,
    };
    let message = parsed
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER_MESSAGE.to_string());

    NormalizedError {
        success: false,
        kind,
        status: code,
        message,
        error: parsed.error,
    }
}

/// What could be learned about a request that never got a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportSignature {
    /// The request timed out or was aborted.
    pub timed_out: bool,
    /// Innermost I/O error kind in the source chain, if any.
    pub io_kind: Option<io::ErrorKind>,
    /// Flattened error text, outermost first. Never contains the request URL.
    pub message: String,
}

impl TransportSignature {
    /// Collect the signature of a `reqwest` error by walking its source chain.
    ///
    /// The request URL is stripped from the outer message so that paths or
    /// hosts cannot match the text checks.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let mut io_kind = None;
        let mut message = err.to_string();
        if let Some(url) = err.url() {
            message = message.replace(&format!(" for url ({})", url), "");
            message = message.replace(url.as_str(), "");
        }
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                io_kind = Some(io_err.kind());
            }
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self {
            timed_out: err.is_timeout(),
            io_kind,
            message,
        }
    }

    fn is_network(&self) -> bool {
        matches!(
            self.io_kind,
            Some(
                io::ErrorKind::NetworkUnreachable
                    | io::ErrorKind::NetworkDown
                    | io::ErrorKind::HostUnreachable
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            )
        ) || self.message.contains("Network Error")
            || self.message.contains("fetch")
    }

    fn is_unreachable(&self) -> bool {
        if self.io_kind == Some(io::ErrorKind::ConnectionRefused) {
            return true;
        }
        let lower = self.message.to_lowercase();
        lower.contains("connection refused")
            || lower.contains("dns error")
            || lower.contains("failed to lookup address")
            || lower.contains("name or service not known")
            || lower.contains("no such host")
    }
}

/// Classify a request that failed without a response. The first match wins.
pub fn normalize_transport(signature: &TransportSignature) -> NormalizedError {
    let err = if signature.timed_out {
        NormalizedError::request_timeout()
    } else if signature.is_network() {
        NormalizedError::new(
            ErrorKind::NetworkError,
            status::NETWORK_ERROR,
            NETWORK_MESSAGE,
        )
    } else if signature.is_unreachable() {
        NormalizedError::new(
            ErrorKind::ServerUnreachable,
            status::SERVER_UNREACHABLE,
            UNREACHABLE_MESSAGE,
        )
    } else {
        NormalizedError::new(
            ErrorKind::ConnectionFailed,
            status::CONNECTION_FAILED,
            CONNECTION_FAILED_MESSAGE,
        )
    };
    err.with_detail(signature.message.clone())
}

impl From<reqwest::Error> for NormalizedError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(code) = err.status() {
            return normalize_status(code.as_u16(), None);
        }
        if err.is_decode() {
            return NormalizedError::connection_failed(err.to_string());
        }
        normalize_transport(&TransportSignature::from_reqwest(&err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(timed_out: bool, io_kind: Option<io::ErrorKind>, message: &str) -> TransportSignature {
        TransportSignature {
            timed_out,
            io_kind,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_server_errors_are_not_timeouts() {
        for code in [500, 502, 503, 504, 599] {
            let err = normalize_status(code, None);
            assert_eq!(err.kind, ErrorKind::ServerError);
            assert_eq!(err.status, code);
            assert_eq!(err.message, SERVER_ERROR_MESSAGE);
            assert_ne!(err.status, status::REQUEST_TIMEOUT);
            assert!(err.is_server_error());
        }
        assert!(!normalize_status(404, None).is_server_error());
    }

    #[test]
    fn test_client_error_uses_server_message() {
        let body = br#"{"message":"Flock not found","error":"NOT_FOUND"}"#;
        let err = normalize_status(404, Some(body));
        assert_eq!(err.kind, ErrorKind::ClientError);
        assert_eq!(err.status, 404);
        assert_eq!(err.message, "Flock not found");
        assert_eq!(err.error.as_deref(), Some("NOT_FOUND"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_client_error_default_message() {
        let err = normalize_status(422, Some(b"not json"));
        assert_eq!(err.message, DEFAULT_SERVER_MESSAGE);
        assert!(err.error.is_none());

        let err = normalize_status(400, Some(br#"{"message":""}"#));
        assert_eq!(err.message, DEFAULT_SERVER_MESSAGE);
    }

    #[test]
    fn test_auth_statuses() {
        let unauthorized = normalize_status(401, Some(br#"{"message":"Token expired"}"#));
        assert_eq!(unauthorized.kind, ErrorKind::Unauthorized);
        assert_eq!(unauthorized.message, "Token expired");
        assert!(unauthorized.is_auth_rejection());

        let forbidden = normalize_status(403, None);
        assert_eq!(forbidden.kind, ErrorKind::Forbidden);
        assert!(forbidden.is_auth_rejection());

        assert!(!normalize_status(404, None).is_auth_rejection());
        assert!(!NormalizedError::unauthorized(NO_REFRESH_TOKEN_MESSAGE)
            .with_detail("x")
            .is_transport());
    }

    #[test]
    fn test_timeout_wins_over_network_signature() {
        let err = normalize_transport(&signature(
            true,
            Some(io::ErrorKind::NetworkUnreachable),
            "Network Error",
        ));
        assert_eq!(err.kind, ErrorKind::RequestTimeout);
        assert_eq!(err.status, status::REQUEST_TIMEOUT);
        assert_eq!(err.message, TIMEOUT_MESSAGE);
    }

    #[test]
    fn test_network_signatures() {
        for sig in [
            signature(false, Some(io::ErrorKind::NetworkUnreachable), "io"),
            signature(false, None, "Network Error"),
            signature(false, None, "failed to fetch"),
        ] {
            assert_eq!(normalize_transport(&sig).kind, ErrorKind::NetworkError);
        }
    }

    #[test]
    fn test_unreachable_signatures() {
        for sig in [
            signature(false, Some(io::ErrorKind::ConnectionRefused), "io"),
            signature(false, None, "error trying to connect: dns error: failed to lookup address information"),
            signature(false, None, "tcp connect error: Connection refused (os error 111)"),
        ] {
            let err = normalize_transport(&sig);
            assert_eq!(err.kind, ErrorKind::ServerUnreachable);
            assert_eq!(err.status, status::SERVER_UNREACHABLE);
        }
    }

    #[test]
    fn test_unknown_transport_is_connection_failed() {
        let err = normalize_transport(&signature(false, None, "builder error"));
        assert_eq!(err.kind, ErrorKind::ConnectionFailed);
        assert_eq!(err.status, status::CONNECTION_FAILED);
        assert_eq!(err.error.as_deref(), Some("builder error"));
    }

    #[test]
    fn test_synthetic_codes_outside_http_range() {
        for code in [
            status::NETWORK_ERROR,
            status::SERVER_UNREACHABLE,
            status::REQUEST_TIMEOUT,
            status::CONNECTION_FAILED,
        ] {
            assert!(!(100..=599).contains(&code));
        }
    }

    #[test]
    fn test_serialized_shape() {
        let err = normalize_status(400, Some(br#"{"message":"Bad egg count"}"#));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["status"], 400);
        assert_eq!(json["message"], "Bad egg count");
        assert!(json.get("error").is_none());
    }
}
