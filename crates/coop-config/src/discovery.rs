//! Config directory discovery.

use std::path::PathBuf;

use crate::client::ResolvedContext;

/// Application name for XDG directory resolution.
const APP_NAME: &str = "coop";

/// Environment variable that overrides the config directory.
///
/// When set, this takes precedence over the platform default (XDG/Application Support).
/// Useful for testing and running multiple instances with different configs.
pub const CONFIG_DIR_ENV: &str = "COOP_CONFIG_DIR";

/// Directory holding per-context token files.
const TOKENS_DIR: &str = "tokens";

/// Directory holding log files.
const LOGS_DIR: &str = "logs";

/// Get the XDG config directory for coop.
///
/// Checks `COOP_CONFIG_DIR` env var first, then falls back to platform default
/// (`~/.config/coop` on Linux, `~/Library/Application Support/coop` on macOS).
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Directory for log files.
pub fn log_dir() -> PathBuf {
    xdg_config_dir()
        .map(|d| d.join(LOGS_DIR))
        .unwrap_or_else(|| PathBuf::from(LOGS_DIR))
}

/// Token file for a resolved context.
///
/// An explicit `token-file` wins; otherwise `<config dir>/tokens/<context>.json`.
pub fn token_file_path(context: &ResolvedContext) -> Option<PathBuf> {
    if let Some(path) = &context.token_file {
        return Some(path.clone());
    }
    xdg_config_dir().map(|d| d.join(TOKENS_DIR).join(format!("{}.json", context.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenStoreKind;

    fn resolved(token_file: Option<PathBuf>) -> ResolvedContext {
        ResolvedContext {
            name: "farm".to_string(),
            base_url: "https://api.example.com".to_string(),
            api_path: "v1".to_string(),
            timeout_ms: 20_000,
            max_refresh_attempts: 3,
            token_store: TokenStoreKind::File,
            token_file,
        }
    }

    #[test]
    fn test_explicit_token_file_wins() {
        let path = PathBuf::from("/srv/coop/farm.json");
        assert_eq!(token_file_path(&resolved(Some(path.clone()))), Some(path));
    }

    #[test]
    fn test_default_token_file_is_per_context() {
        if let Some(path) = token_file_path(&resolved(None)) {
            assert!(path.ends_with("tokens/farm.json"));
        }
    }
}
