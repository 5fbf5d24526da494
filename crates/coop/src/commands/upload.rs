//! Upload command - multipart file upload with a progress bar.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use coop_client::{CancellationToken, Upload};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use super::{Context, print_body, report};

/// Arguments for the upload command.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Path relative to the API base (e.g. "flocks/7/photos")
    pub path: String,

    /// File to upload
    pub file: PathBuf,

    /// Form field name for the file part
    #[arg(long, default_value = "file")]
    pub field: String,

    /// MIME type of the file part
    #[arg(long)]
    pub mime: Option<String>,

    /// Extra text fields (repeatable, NAME=VALUE)
    #[arg(long = "form", value_parser = parse_form_field)]
    pub form: Vec<(String, String)>,

    /// Timeout for this upload in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

fn parse_form_field(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

/// Run the upload command.
pub async fn run(args: UploadArgs, ctx: &Context) -> Result<()> {
    let mut upload = Upload::from_path(args.field.as_str(), &args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    if let Some(mime) = &args.mime {
        upload = upload.mime(mime.as_str());
    }
    for (name, value) in &args.form {
        upload = upload.text(name.as_str(), value.as_str());
    }
    if let Some(ms) = args.timeout_ms {
        upload = upload.timeout(Duration::from_millis(ms));
    }

    let bar = if ctx.json_output {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(upload.len());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {bytes:>10}/{total_bytes:10} {msg}")
                .context("invalid progress template")?
                .progress_chars("##-"),
        );
        pb.set_message(args.file.display().to_string());
        pb
    };

    let progress_bar = bar.clone();
    upload = upload.on_progress(move |p| {
        progress_bar.set_length(p.total);
        progress_bar.set_position(p.sent);
    });

    // Ctrl-C aborts the transfer instead of killing the process mid-write.
    let cancel = CancellationToken::new();
    upload = upload.cancel_token(cancel.clone());
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling upload");
                cancel.cancel();
            }
        }
    });

    let client = ctx.client()?;
    tracing::debug!(path = %args.path, file = %args.file.display(), bytes = upload.len(), "UPLOAD");
    let result: coop_client::Result<Value> = client.upload_file(&args.path, upload).await;
    watcher.abort();

    match result {
        Ok(body) => {
            bar.finish_with_message("done");
            print_body(&body, ctx)
        }
        Err(e) => {
            bar.abandon();
            Err(report(e, ctx))
        }
    }
}
