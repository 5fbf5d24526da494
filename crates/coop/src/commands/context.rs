//! Context command - manage connection contexts in client.yaml.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use coop_config::{ClientConfig, Context as ClientContext, TokenStoreKind};
use serde_json::json;

use super::Context;

/// Arguments for the context command.
#[derive(Args, Debug)]
pub struct ContextArgs {
    #[command(subcommand)]
    pub command: ContextCommand,
}

#[derive(Subcommand, Debug)]
pub enum ContextCommand {
    /// List available contexts
    List,

    /// Show the current context name
    Current,

    /// Switch to a different context
    Use {
        /// Context name to switch to
        name: String,
    },

    /// Create or update a context
    Set(SetArgs),

    /// Delete a context
    Remove {
        /// Context name to delete
        name: String,
    },
}

/// Fields accepted by `context set`.
#[derive(Args, Debug, Default)]
pub struct SetArgs {
    /// Context name
    pub name: String,

    /// Server URL (e.g., https://api.example.com)
    #[arg(long = "url")]
    pub base_url: Option<String>,

    /// API version path segment
    #[arg(long)]
    pub api_path: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Consecutive refresh attempts before forced logout
    #[arg(long)]
    pub max_refresh_attempts: Option<u32>,

    /// Token storage backend: memory, file or keyring
    #[arg(long)]
    pub token_store: Option<TokenStoreKind>,

    /// Token file for the file backend
    #[arg(long)]
    pub token_file: Option<PathBuf>,
}

/// Run the context command.
pub fn run(args: ContextArgs, ctx: &Context) -> Result<()> {
    let mut config = coop_config::load_client_config()?;

    match args.command {
        ContextCommand::List => cmd_list(&config, ctx),
        ContextCommand::Current => cmd_current(&config, ctx),
        ContextCommand::Use { name } => {
            config.use_context(&name)?;
            coop_config::save_client_config(&config)?;
            println!("Switched to context \"{}\".", name);
            Ok(())
        }
        ContextCommand::Set(set) => {
            let name = set.name.clone();
            let (created, made_current) = apply_set(&mut config, set)?;
            coop_config::save_client_config(&config)?;
            if created {
                println!("Context \"{}\" created.", name);
            } else {
                println!("Context \"{}\" modified.", name);
            }
            if made_current {
                println!("Context \"{}\" set as current context.", name);
            }
            Ok(())
        }
        ContextCommand::Remove { name } => {
            if config.remove_context(&name).is_none() {
                anyhow::bail!("Context \"{}\" not found", name);
            }
            coop_config::save_client_config(&config)?;
            println!("Context \"{}\" deleted.", name);
            if config.current_context.is_none() {
                println!("Note: No current context. Use 'coop context use <name>' to set one.");
            }
            Ok(())
        }
    }
}

fn cmd_list(config: &ClientConfig, ctx: &Context) -> Result<()> {
    let current = config.current_context.as_deref();

    if ctx.json_output {
        let contexts: Vec<_> = config
            .contexts
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "baseUrl": c.base_url,
                    "current": current == Some(c.name.as_str()),
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(contexts));
        return Ok(());
    }

    if config.contexts.is_empty() {
        println!("No contexts configured.");
        println!();
        println!("Create one with:");
        println!("  coop context set local --url=http://localhost:3000");
        return Ok(());
    }

    println!("CURRENT   NAME            SERVER");
    for c in &config.contexts {
        let marker = if current == Some(c.name.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{}         {:<15} {}", marker, c.name, c.base_url);
    }
    Ok(())
}

fn cmd_current(config: &ClientConfig, ctx: &Context) -> Result<()> {
    match (&config.current_context, ctx.json_output) {
        (Some(name), true) => println!("{}", json!({ "current": name })),
        (None, true) => println!("{}", json!({ "current": null })),
        (Some(name), false) => println!("{}", name),
        (None, false) => {
            println!("No current context set. Use 'coop context use <name>' to set one.")
        }
    }
    Ok(())
}

/// Create or update a context. Returns `(created, made_current)`.
///
/// The first context ever created becomes current. The result is validated
/// before anything is written.
fn apply_set(config: &mut ClientConfig, set: SetArgs) -> Result<(bool, bool)> {
    let created = config.get_context(&set.name).is_none();

    let mut context = match config.get_context(&set.name) {
        Some(existing) => existing.clone(),
        None => {
            let url = set
                .base_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--url is required when creating a new context"))?;
            ClientContext::new(set.name.clone(), url)
        }
    };

    if let Some(url) = set.base_url {
        context.base_url = url;
    }
    if set.api_path.is_some() {
        context.api_path = set.api_path;
    }
    if set.timeout_ms.is_some() {
        context.timeout_ms = set.timeout_ms;
    }
    if set.max_refresh_attempts.is_some() {
        context.max_refresh_attempts = set.max_refresh_attempts;
    }
    if set.token_store.is_some() {
        context.token_store = set.token_store;
    }
    if set.token_file.is_some() {
        context.token_file = set.token_file;
    }

    let mut updated = config.clone();
    updated.set_context(context);
    updated.resolve(Some(&set.name))?;

    let made_current = updated.current_context.is_none() && updated.contexts.len() == 1;
    if made_current {
        updated.current_context = Some(set.name);
    }

    *config = updated;
    Ok((created, made_current))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(name: &str, url: Option<&str>) -> SetArgs {
        SetArgs {
            name: name.to_string(),
            base_url: url.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_context_becomes_current() {
        let mut config = ClientConfig::new();
        let (created, current) = apply_set(&mut config, set("farm", Some("https://api.example.com"))).unwrap();
        assert!(created);
        assert!(current);
        assert_eq!(config.current_context.as_deref(), Some("farm"));

        let (created, current) = apply_set(&mut config, set("vet", Some("https://vet.example.com"))).unwrap();
        assert!(created);
        assert!(!current);
        assert_eq!(config.current_context.as_deref(), Some("farm"));
    }

    #[test]
    fn test_update_keeps_unset_fields() {
        let mut config = ClientConfig::new();
        let mut first = set("farm", Some("https://api.example.com"));
        first.timeout_ms = Some(5000);
        apply_set(&mut config, first).unwrap();

        let mut second = set("farm", None);
        second.token_store = Some(TokenStoreKind::Memory);
        let (created, _) = apply_set(&mut config, second).unwrap();
        assert!(!created);

        let c = config.get_context("farm").unwrap();
        assert_eq!(c.base_url, "https://api.example.com");
        assert_eq!(c.timeout_ms, Some(5000));
        assert_eq!(c.token_store, Some(TokenStoreKind::Memory));
    }

    #[test]
    fn test_new_context_requires_url() {
        let mut config = ClientConfig::new();
        assert!(apply_set(&mut config, set("farm", None)).is_err());
        assert!(config.contexts.is_empty());
    }

    #[test]
    fn test_invalid_values_are_not_applied() {
        let mut config = ClientConfig::new();
        assert!(apply_set(&mut config, set("farm", Some("ftp://nope"))).is_err());
        assert!(config.contexts.is_empty());

        apply_set(&mut config, set("farm", Some("https://api.example.com"))).unwrap();
        let mut zero = set("farm", None);
        zero.timeout_ms = Some(0);
        assert!(apply_set(&mut config, zero).is_err());
        assert_eq!(config.get_context("farm").unwrap().timeout_ms, None);
    }
}
