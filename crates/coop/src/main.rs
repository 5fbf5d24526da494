//! Coop - command-line client for the farm management API.
//!
//! Main entry point for the Coop CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{auth, context, request, upload};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Coop - command-line client for the farm management API
#[derive(Parser)]
#[command(name = "coop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Context from client.yaml to use (default: current-context)
    #[arg(long, global = true, env = "COOP_CONTEXT")]
    pub context: Option<String>,

    /// Server URL, overriding the context's base-url
    #[arg(long, global = true, env = "COOP_SERVER_URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authentication management
    Auth(auth::AuthArgs),

    /// Send a GET request
    Get(request::PathArgs),

    /// Send a POST request with a JSON body
    Post(request::BodyArgs),

    /// Send a PUT request with a JSON body
    Put(request::BodyArgs),

    /// Send a PATCH request with a JSON body
    Patch(request::BodyArgs),

    /// Send a DELETE request
    Delete(request::PathArgs),

    /// Upload a file as multipart/form-data
    Upload(upload::UploadArgs),

    /// Manage connection contexts
    Context(context::ContextArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "coop=debug,coop_client=debug,coop_config=debug,warn"
    } else {
        "coop=info,coop_client=warn,coop_config=warn,error"
    };

    let file_appender = tracing_appender::rolling::daily(coop_config::log_dir(), "coop.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "coop=trace,coop_client=trace,coop_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        context: cli.context,
        server_override: cli.server,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    let result = match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Get(args) => request::get(args, &ctx).await,
        Commands::Post(args) => request::post(args, &ctx).await,
        Commands::Put(args) => request::put(args, &ctx).await,
        Commands::Patch(args) => request::patch(args, &ctx).await,
        Commands::Delete(args) => request::delete(args, &ctx).await,
        Commands::Upload(args) => upload::run(args, &ctx).await,
        Commands::Context(args) => context::run(args, &ctx),
    };

    // API errors were already printed by the command; just set the exit code.
    if let Err(e) = &result
        && e.downcast_ref::<coop_client::NormalizedError>().is_some()
    {
        drop(_guard);
        std::process::exit(1);
    }
    result
}
