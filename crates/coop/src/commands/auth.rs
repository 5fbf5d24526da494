//! Auth command - token management.

use anyhow::Result;
use clap::{Args, Subcommand};
use coop_client::Credentials;
use serde_json::json;

use super::{Context, report};

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Store a token pair issued by the server
    Login {
        /// Access token (sent as the bearer credential)
        #[arg(long, env = "COOP_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,

        /// Refresh token (exchanged for a new pair on 401/403)
        #[arg(long, env = "COOP_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },

    /// Show authentication status
    Status,

    /// Clear stored tokens
    Logout,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login {
            access_token,
            refresh_token,
        } => cmd_login(access_token, refresh_token, ctx).await,
        AuthCommand::Status => cmd_status(ctx).await,
        AuthCommand::Logout => cmd_logout(ctx).await,
    }
}

async fn cmd_login(access_token: String, refresh_token: String, ctx: &Context) -> Result<()> {
    if access_token.trim().is_empty() || refresh_token.trim().is_empty() {
        anyhow::bail!("Both --access-token and --refresh-token must be non-empty");
    }

    let client = ctx.client()?;
    client
        .login(&Credentials::new(access_token, refresh_token))
        .await
        .map_err(|e| report(e, ctx))?;

    if ctx.json_output {
        println!("{}", json!({ "success": true, "loggedIn": true }));
    } else {
        println!("{} Tokens stored", console::style("✓").green());
    }
    Ok(())
}

async fn cmd_status(ctx: &Context) -> Result<()> {
    let resolved = ctx.resolve()?;
    let client = super::build_client(&resolved)?;
    let logged_in = client.is_logged_in().await;

    if ctx.json_output {
        println!(
            "{}",
            json!({
                "context": resolved.name,
                "baseUrl": client.base_url().as_str(),
                "tokenStore": resolved.token_store.to_string(),
                "loggedIn": logged_in,
                "maxRefreshAttempts": client.max_refresh_attempts(),
            })
        );
        return Ok(());
    }

    println!("Authentication Status");
    println!("---------------------");
    println!("Context:     {}", resolved.name);
    println!("API:         {}", client.base_url());
    println!("Token store: {}", resolved.token_store);
    println!("Refresh:     up to {} attempts", client.max_refresh_attempts());
    if logged_in {
        println!("Status:      {}", console::style("logged in").green());
    } else {
        println!("Status:      {}", console::style("not logged in").yellow());
        println!();
        println!("Run 'coop auth login --access-token T --refresh-token R' to log in.");
    }
    Ok(())
}

async fn cmd_logout(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let was_logged_in = client.is_logged_in().await;
    client.logout().await;

    if ctx.json_output {
        println!("{}", json!({ "success": true, "loggedIn": false }));
    } else if was_logged_in {
        println!("Logged out. Tokens removed.");
    } else {
        println!("No stored tokens found.");
    }
    Ok(())
}
