//! Configuration for the Coop API client.
//!
//! Client configuration is kubeconfig-style YAML (`client.yaml`):
//! - Named connection contexts (base URL, API path, timeout, refresh budget)
//! - `current-context` for default selection
//! - Per-context token storage backend (memory, file, keyring)
//!
//! The config directory is `$COOP_CONFIG_DIR` or the platform default.

pub mod client;
pub mod discovery;
pub mod error;

pub use client::{
    ClientConfig, ClientDefaults, Context, ResolvedContext, TokenStoreKind, client_config_path,
    load_client_config, load_client_config_from, save_client_config, save_client_config_to,
};
pub use discovery::{CONFIG_DIR_ENV, log_dir, token_file_path, xdg_config_dir};
pub use error::{ConfigError, Result};
