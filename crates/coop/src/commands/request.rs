//! Request commands - GET, POST, PUT, PATCH and DELETE against the API.

use anyhow::{Context as _, Result};
use clap::Args;
use serde_json::Value;

use super::{Context, print_body, report};

/// Arguments for requests without a body.
#[derive(Args, Debug)]
pub struct PathArgs {
    /// Path relative to the API base (e.g. "flocks/7")
    pub path: String,
}

/// Arguments for requests with a JSON body.
#[derive(Args, Debug)]
pub struct BodyArgs {
    /// Path relative to the API base (e.g. "flocks")
    pub path: String,

    /// JSON request body
    #[arg(short, long, default_value = "{}")]
    pub data: String,
}

impl BodyArgs {
    fn body(&self) -> Result<Value> {
        serde_json::from_str(&self.data).context("--data must be valid JSON")
    }
}

pub async fn get(args: PathArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    tracing::debug!(path = %args.path, "GET");
    let body: Value = client.get(&args.path).await.map_err(|e| report(e, ctx))?;
    print_body(&body, ctx)
}

pub async fn delete(args: PathArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    tracing::debug!(path = %args.path, "DELETE");
    let body: Value = client.delete(&args.path).await.map_err(|e| report(e, ctx))?;
    print_body(&body, ctx)
}

pub async fn post(args: BodyArgs, ctx: &Context) -> Result<()> {
    let payload = args.body()?;
    let client = ctx.client()?;
    tracing::debug!(path = %args.path, "POST");
    let body: Value = client
        .post(&args.path, &payload)
        .await
        .map_err(|e| report(e, ctx))?;
    print_body(&body, ctx)
}

pub async fn put(args: BodyArgs, ctx: &Context) -> Result<()> {
    let payload = args.body()?;
    let client = ctx.client()?;
    tracing::debug!(path = %args.path, "PUT");
    let body: Value = client
        .put(&args.path, &payload)
        .await
        .map_err(|e| report(e, ctx))?;
    print_body(&body, ctx)
}

pub async fn patch(args: BodyArgs, ctx: &Context) -> Result<()> {
    let payload = args.body()?;
    let client = ctx.client()?;
    tracing::debug!(path = %args.path, "PATCH");
    let body: Value = client
        .patch(&args.path, &payload)
        .await
        .map_err(|e| report(e, ctx))?;
    print_body(&body, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_parses_json() {
        let args = BodyArgs {
            path: "flocks".to_string(),
            data: r#"{"name":"Layers A","birds":1200}"#.to_string(),
        };
        assert_eq!(args.body().unwrap()["birds"], 1200);
    }

    #[test]
    fn test_body_rejects_invalid_json() {
        let args = BodyArgs {
            path: "flocks".to_string(),
            data: "{not json".to_string(),
        };
        assert!(args.body().is_err());
    }
}
