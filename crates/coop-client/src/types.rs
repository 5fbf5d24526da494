//! Request and response types shared by the client and its callers.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

/// Access/refresh token pair issued at login and rotated on refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Short-lived bearer token.
    pub access_token: String,
    /// Longer-lived token exchanged for a new pair.
    pub refresh_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// Body sent to `auth/refresh-token`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

/// Body returned by `auth/refresh-token`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RefreshTokenResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Credentials>,
}

impl RefreshTokenResponse {
    /// The new credentials, if the server reported success and sent both tokens.
    pub(crate) fn into_credentials(self) -> std::result::Result<Credentials, Option<String>> {
        match (self.success, self.data) {
            (true, Some(data))
                if !data.access_token.is_empty() && !data.refresh_token.is_empty() =>
            {
                Ok(data)
            }
            _ => Err(self.message),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Upload
// ─────────────────────────────────────────────────────────────────────────────

/// Bytes streamed so far for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes of the file part handed to the transport.
    pub sent: u64,
    /// Total size of the file part.
    pub total: u64,
}

impl UploadProgress {
    /// Completion in the range `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.sent as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_wire_format() {
        let creds = Credentials::new("a", "r");
        let json = serde_json::to_value(&creds).unwrap();
        assert_eq!(json, serde_json::json!({"accessToken": "a", "refreshToken": "r"}));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let debug = format!("{:?}", Credentials::new("secret-a", "secret-r"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_refresh_response_success() {
        let resp: RefreshTokenResponse = serde_json::from_str(
            r#"{"success":true,"data":{"accessToken":"new-a","refreshToken":"new-r"}}"#,
        )
        .unwrap();
        assert_eq!(resp.into_credentials().unwrap(), Credentials::new("new-a", "new-r"));
    }

    #[test]
    fn test_refresh_response_failure() {
        let resp: RefreshTokenResponse =
            serde_json::from_str(r#"{"success":false,"message":"Refresh token revoked"}"#).unwrap();
        assert_eq!(
            resp.into_credentials().unwrap_err().as_deref(),
            Some("Refresh token revoked")
        );

        let resp: RefreshTokenResponse =
            serde_json::from_str(r#"{"success":true,"data":{"accessToken":"","refreshToken":"r"}}"#)
                .unwrap();
        assert!(resp.into_credentials().is_err());
    }

    #[test]
    fn test_upload_progress_fraction() {
        assert_eq!(UploadProgress { sent: 5, total: 10 }.fraction(), 0.5);
        assert_eq!(UploadProgress { sent: 0, total: 0 }.fraction(), 1.0);
    }
}
