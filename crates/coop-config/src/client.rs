//! Client configuration for connecting to Coop API servers.
//!
//! Implements a kubeconfig-style configuration with named contexts:
//!
//! ```yaml
//! api-version: v1
//! kind: ClientConfig
//!
//! current-context: farm
//!
//! contexts:
//!   - name: farm
//!     base-url: https://api.example.com
//!     api-path: v1
//!     timeout-ms: 20000
//!     token-store: file
//!   - name: staging
//!     base-url: https://staging.example.com
//!     max-refresh-attempts: 5
//!     token-store: keyring
//!
//! defaults:
//!   timeout-ms: 20000
//!   max-refresh-attempts: 3
//!   token-store: file
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Client Config
// ─────────────────────────────────────────────────────────────────────────────

/// API version for the client config file format.
pub const API_VERSION: &str = "v1";

/// Kind identifier for client config files.
pub const KIND: &str = "ClientConfig";

/// Default config filename.
pub(crate) const CLIENT_CONFIG_FILE: &str = "client.yaml";

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Default refresh budget.
pub const DEFAULT_MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Default API path segment.
pub const DEFAULT_API_PATH: &str = "v1";

/// Root client configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    /// API version (always "v1" currently).
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Config kind (always "ClientConfig").
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Name of the current/default context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,

    /// Named connection contexts.
    #[serde(default)]
    pub contexts: Vec<Context>,

    /// Default settings applied to all contexts.
    #[serde(default)]
    pub defaults: ClientDefaults,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

impl ClientConfig {
    /// Create an empty client config.
    pub fn new() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            ..Default::default()
        }
    }

    /// Parse from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        serde_yaml::from_str(yaml_str).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Get the current context, if set and valid.
    pub fn current(&self) -> Option<&Context> {
        self.current_context
            .as_ref()
            .and_then(|name| self.get_context(name))
    }

    /// Get a context by name.
    pub fn get_context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// Get a mutable context by name.
    pub fn get_context_mut(&mut self, name: &str) -> Option<&mut Context> {
        self.contexts.iter_mut().find(|c| c.name == name)
    }

    /// Add or update a context.
    pub fn set_context(&mut self, context: Context) {
        if let Some(existing) = self.get_context_mut(&context.name) {
            *existing = context;
        } else {
            self.contexts.push(context);
        }
    }

    /// Remove a context by name.
    pub fn remove_context(&mut self, name: &str) -> Option<Context> {
        let pos = self.contexts.iter().position(|c| c.name == name)?;
        if self.current_context.as_deref() == Some(name) {
            self.current_context = None;
        }
        Some(self.contexts.remove(pos))
    }

    /// Set the current context by name.
    ///
    /// Returns an error if the context doesn't exist.
    pub fn use_context(&mut self, name: &str) -> Result<()> {
        if self.get_context(name).is_some() {
            self.current_context = Some(name.to_string());
            Ok(())
        } else {
            Err(ConfigError::ContextNotFound(name.to_string()))
        }
    }

    /// List all context names.
    pub fn context_names(&self) -> Vec<&str> {
        self.contexts.iter().map(|c| c.name.as_str()).collect()
    }

    /// Merge a context over the defaults.
    ///
    /// With `name = None` the current context is used.
    pub fn resolve(&self, name: Option<&str>) -> Result<ResolvedContext> {
        let context = match name {
            Some(name) => self
                .get_context(name)
                .ok_or_else(|| ConfigError::ContextNotFound(name.to_string()))?,
            None => self.current().ok_or(ConfigError::NoCurrentContext)?,
        };

        let resolved = ResolvedContext {
            name: context.name.clone(),
            base_url: context.base_url.clone(),
            api_path: context
                .api_path
                .clone()
                .unwrap_or_else(|| self.defaults.api_path.clone()),
            timeout_ms: context.timeout_ms.unwrap_or(self.defaults.timeout_ms),
            max_refresh_attempts: context
                .max_refresh_attempts
                .unwrap_or(self.defaults.max_refresh_attempts),
            token_store: context
                .token_store
                .unwrap_or(self.defaults.token_store),
            token_file: context.token_file.as_deref().map(expand_path),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// Where a context keeps its tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenStoreKind {
    /// Process memory only; tokens are lost on exit.
    Memory,
    /// JSON file in the config directory.
    #[default]
    File,
    /// OS keyring.
    Keyring,
}

impl std::fmt::Display for TokenStoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenStoreKind::Memory => write!(f, "memory"),
            TokenStoreKind::File => write!(f, "file"),
            TokenStoreKind::Keyring => write!(f, "keyring"),
        }
    }
}

impl std::str::FromStr for TokenStoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(TokenStoreKind::Memory),
            "file" => Ok(TokenStoreKind::File),
            "keyring" => Ok(TokenStoreKind::Keyring),
            other => Err(ConfigError::Invalid {
                field: "token-store".to_string(),
                reason: format!("unknown backend '{}' (expected memory, file or keyring)", other),
            }),
        }
    }
}

/// A named connection context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Context {
    /// Unique name for this context.
    pub name: String,

    /// Server URL (e.g., "https://api.example.com").
    pub base_url: String,

    /// API version path segment (`{base-url}/api/{api-path}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_path: Option<String>,

    /// Request timeout override (milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Refresh budget override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_refresh_attempts: Option<u32>,

    /// Token storage backend override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_store: Option<TokenStoreKind>,

    /// Token file path for the `file` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Context {
    /// Create a new context with just a name and base URL.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_path: None,
            timeout_ms: None,
            max_refresh_attempts: None,
            token_store: None,
            token_file: None,
        }
    }

    /// Set the API path segment.
    pub fn with_api_path(mut self, api_path: impl Into<String>) -> Self {
        self.api_path = Some(api_path.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the refresh budget.
    pub fn with_max_refresh_attempts(mut self, attempts: u32) -> Self {
        self.max_refresh_attempts = Some(attempts);
        self
    }

    /// Set the token storage backend.
    pub fn with_token_store(mut self, kind: TokenStoreKind) -> Self {
        self.token_store = Some(kind);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default settings applied to all contexts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientDefaults {
    /// Default API path segment.
    pub api_path: String,

    /// Default request timeout in milliseconds.
    pub timeout_ms: u64,

    /// Default refresh budget.
    pub max_refresh_attempts: u32,

    /// Default token storage backend.
    pub token_store: TokenStoreKind,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            api_path: DEFAULT_API_PATH.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_refresh_attempts: DEFAULT_MAX_REFRESH_ATTEMPTS,
            token_store: TokenStoreKind::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolved
// ─────────────────────────────────────────────────────────────────────────────

/// A context with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContext {
    pub name: String,
    pub base_url: String,
    pub api_path: String,
    pub timeout_ms: u64,
    pub max_refresh_attempts: u32,
    pub token_store: TokenStoreKind,
    /// Explicit token file; `None` means the default under the config dir.
    pub token_file: Option<PathBuf>,
}

impl ResolvedContext {
    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(invalid("base-url", "must not be empty"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(invalid("base-url", "must start with http:// or https://"));
        }
        if self.api_path.trim_matches('/').is_empty() {
            return Err(invalid("api-path", "must not be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeout-ms", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading / Saving
// ─────────────────────────────────────────────────────────────────────────────

/// Get the path to the client config file.
pub fn client_config_path() -> Option<PathBuf> {
    crate::xdg_config_dir().map(|d| d.join(CLIENT_CONFIG_FILE))
}

/// Load the client configuration.
///
/// Returns a default config if the file doesn't exist.
pub fn load_client_config() -> Result<ClientConfig> {
    load_client_config_from(client_config_path().as_deref())
}

/// Load client config from a specific path.
pub fn load_client_config_from(path: Option<&Path>) -> Result<ClientConfig> {
    let Some(path) = path else {
        return Ok(ClientConfig::new());
    };

    if !path.exists() {
        return Ok(ClientConfig::new());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;

    ClientConfig::from_yaml(&contents)
}

/// Save the client configuration.
pub fn save_client_config(config: &ClientConfig) -> Result<()> {
    let path = client_config_path()
        .ok_or_else(|| ConfigError::Other("Could not determine config directory".to_string()))?;
    save_client_config_to(config, &path)
}

/// Save client config to a specific path.
pub fn save_client_config_to(config: &ClientConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_yaml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Expand ~ to home directory in paths.
fn expand_path(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/"))
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
