//! Multipart uploads.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Body;
use reqwest::multipart::{Form, Part};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::UploadProgress;

/// Size of each streamed chunk of the file part.
const CHUNK_SIZE: usize = 64 * 1024;

/// Callback receiving upload progress.
pub type UploadProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// A file to upload, plus its form fields and request options.
///
/// The file part is streamed in chunks so progress can be reported as the
/// transport consumes it. The data is kept so the request can be rebuilt if
/// it has to be retried after a token refresh.
#[derive(Clone)]
pub struct Upload {
    field: String,
    file_name: String,
    data: Arc<[u8]>,
    mime: Option<String>,
    fields: Vec<(String, String)>,
    progress: Option<UploadProgressCallback>,
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
}

impl Upload {
    /// Create an upload for in-memory file contents.
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            data: Arc::from(data.into()),
            mime: None,
            fields: Vec::new(),
            progress: None,
            cancel: None,
            timeout: None,
        }
    }

    /// Read a file from disk. The part's file name is the path's file name.
    pub async fn from_path(field: impl Into<String>, path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(field, file_name, data))
    }

    /// Set the MIME type of the file part.
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Add a text field to the form.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Report progress while the file part is sent.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Abort the upload when `token` is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Override the client's default timeout for this upload.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Size of the file part in bytes.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// True if the file part is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Build a fresh multipart form for one attempt.
    pub(crate) fn to_form(&self) -> Result<Form> {
        let total = self.len();
        let data = self.data.clone();
        let progress = self.progress.clone();

        let chunk_count = data.len().div_ceil(CHUNK_SIZE);
        let mut sent = 0u64;
        let chunks = (0..chunk_count).map(move |i| {
            let start = i * CHUNK_SIZE;
            let end = (start + CHUNK_SIZE).min(data.len());
            let chunk = data[start..end].to_vec();
            sent += chunk.len() as u64;
            if let Some(callback) = &progress {
                callback(UploadProgress { sent, total });
            }
            Ok::<_, std::io::Error>(chunk)
        });

        let body = Body::wrap_stream(futures::stream::iter(chunks));
        let mut part = Part::stream_with_length(body, total).file_name(self.file_name.clone());
        if let Some(mime) = &self.mime {
            part = part.mime_str(mime)?;
        }

        let mut form = Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        Ok(form.part(self.field.clone(), part))
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("len", &self.data.len())
            .field("mime", &self.mime)
            .field("fields", &self.fields)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_options() {
        let token = CancellationToken::new();
        let upload = Upload::new("photo", "coop.jpg", vec![1u8; 10])
            .mime("image/jpeg")
            .text("flockId", "7")
            .timeout(Duration::from_secs(120))
            .cancel_token(token.clone());

        assert_eq!(upload.len(), 10);
        assert!(!upload.is_empty());
        assert_eq!(upload.timeout_override(), Some(Duration::from_secs(120)));
        assert!(upload.cancellation().is_some());
        assert!(upload.to_form().is_ok());
    }

    #[test]
    fn test_invalid_mime_is_normalized() {
        let upload = Upload::new("file", "x.bin", vec![0u8]).mime("not a mime");
        let err = upload.to_form().unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_from_path_uses_file_name() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("lab-report.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let upload = Upload::from_path("report", &path).await.unwrap();
        assert_eq!(upload.file_name, "lab-report.pdf");
        assert_eq!(upload.len(), 8);
    }
}
