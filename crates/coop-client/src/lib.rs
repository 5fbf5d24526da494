//! HTTP client SDK for the Coop farm management API.
//!
//! Every screen of the farmer, veterinary, pharmacy and admin apps talks to
//! the backend through one [`ApiClient`]. The client:
//!
//! - reads the access token from a [`TokenStore`] before every request and
//!   sends it as a bearer credential,
//! - reports every failure as a [`NormalizedError`] with a stable shape,
//! - on 401/403 refreshes the token pair (single-flight, bounded by a shared
//!   budget) and retries the request once,
//! - forces logout, notifying registered listeners, when refresh gives up.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use coop_client::{ApiClient, FileTokenStore, Upload};
//!
//! # async fn example() -> coop_client::Result<()> {
//! let client = ApiClient::builder()
//!     .base_url("https://api.example.com")
//!     .api_version("v1")
//!     .token_store(Arc::new(FileTokenStore::new("/var/lib/coop".as_ref())))
//!     .build()
//!     .expect("valid config");
//!
//! client.on_logout(|| {
//!     println!("session ended");
//!     Ok(())
//! });
//!
//! let flock: serde_json::Value = client.get("flocks/7").await?;
//! println!("{}", flock);
//!
//! let upload = Upload::new("photo", "barn.jpg", vec![0u8; 1024])
//!     .mime("image/jpeg")
//!     .on_progress(|p| println!("{:.0}%", p.fraction() * 100.0));
//! let _: serde_json::Value = client.upload_file("flocks/7/photos", upload).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod listeners;
pub mod refresh;
mod session;
pub mod store;
pub mod types;
pub mod upload;

pub use client::{ApiClient, ClientBuilder};
pub use error::{
    BuildError, ErrorKind, NormalizedError, Result, StoreError, TransportSignature,
    normalize_status, normalize_transport, status,
};
pub use listeners::{BoxError, ListenerId};
pub use store::{FileTokenStore, InMemoryTokenStore, SharedTokenStore, TokenStore};
#[cfg(feature = "keyring")]
pub use store::KeyringTokenStore;
pub use types::{Credentials, UploadProgress};
pub use upload::Upload;

pub use tokio_util::sync::CancellationToken;
