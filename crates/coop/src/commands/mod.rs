//! CLI command handlers.

pub mod auth;
pub mod context;
pub mod request;
pub mod upload;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use coop_client::{
    ApiClient, FileTokenStore, InMemoryTokenStore, NormalizedError, SharedTokenStore,
};
use coop_config::{ClientConfig, ResolvedContext, TokenStoreKind};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Context name from `--context`.
    pub context: Option<String>,
    /// Base URL from `--server`.
    pub server_override: Option<String>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Resolve the connection settings for this invocation.
    ///
    /// `--server` alone works without any config file: it runs against an
    /// ad-hoc context named "default" with every default applied.
    pub fn resolve(&self) -> Result<ResolvedContext> {
        let config = coop_config::load_client_config()?;
        self.resolve_with(&config)
    }

    fn resolve_with(&self, config: &ClientConfig) -> Result<ResolvedContext> {
        let selected = self.context.as_deref();
        let no_context = selected.is_none() && config.current().is_none();

        let mut resolved = match (&self.server_override, no_context) {
            (Some(server), true) => {
                let mut adhoc = config.clone();
                adhoc.set_context(coop_config::Context::new("default", server.clone()));
                adhoc.resolve(Some("default"))?
            }
            _ => config.resolve(selected)?,
        };

        if let Some(server) = &self.server_override {
            resolved.base_url = server.clone();
        }
        Ok(resolved)
    }

    /// Build an API client for the resolved context.
    pub fn client(&self) -> Result<ApiClient> {
        let resolved = self.resolve()?;
        build_client(&resolved)
    }
}

/// Build an API client from resolved settings.
pub fn build_client(resolved: &ResolvedContext) -> Result<ApiClient> {
    tracing::debug!(
        context = %resolved.name,
        base_url = %resolved.base_url,
        store = %resolved.token_store,
        "Building client"
    );

    let client = ApiClient::builder()
        .base_url(&resolved.base_url)
        .api_version(&resolved.api_path)
        .timeout_ms(resolved.timeout_ms)
        .max_refresh_attempts(resolved.max_refresh_attempts)
        .token_store(token_store(resolved)?)
        .user_agent(format!("coop/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .with_context(|| format!("invalid settings for context '{}'", resolved.name))?;
    Ok(client)
}

fn token_store(resolved: &ResolvedContext) -> Result<SharedTokenStore> {
    match resolved.token_store {
        TokenStoreKind::Memory => Ok(Arc::new(InMemoryTokenStore::new())),
        TokenStoreKind::File => {
            let path = coop_config::token_file_path(resolved)
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
            Ok(Arc::new(FileTokenStore::with_path(path)))
        }
        TokenStoreKind::Keyring => keyring_store(resolved),
    }
}

#[cfg(feature = "keyring")]
fn keyring_store(resolved: &ResolvedContext) -> Result<SharedTokenStore> {
    Ok(Arc::new(coop_client::KeyringTokenStore::with_service(format!(
        "coop-{}",
        resolved.name
    ))))
}

#[cfg(not(feature = "keyring"))]
fn keyring_store(resolved: &ResolvedContext) -> Result<SharedTokenStore> {
    anyhow::bail!(
        "context '{}' uses the keyring token store, but keyring support is not compiled in (enable the 'keyring' feature)",
        resolved.name
    )
}

/// Print a successful response body.
pub fn print_body(body: &serde_json::Value, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string(body)?);
    } else {
        println!("{}", serde_json::to_string_pretty(body)?);
    }
    Ok(())
}

/// Report a normalized error and turn it into a command failure.
pub fn report(err: NormalizedError, ctx: &Context) -> anyhow::Error {
    if ctx.json_output {
        match serde_json::to_string(&err) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!(error = %e, "Failed to serialize error"),
        }
    } else {
        let red = console::Style::new().red();
        eprintln!("{} {}", red.apply_to("✗"), err.message);
        if ctx.verbose
            && let Some(detail) = &err.error
        {
            eprintln!("  {}", console::style(detail).dim());
        }
    }
    anyhow::Error::new(err)
}
