//! The byte-transport seam.
//!
//! How bytes actually move is an external collaborator's concern; the
//! pipeline only needs "fetch this URL into this file". Two implementations
//! are provided: HTTP(S) via `reqwest` streaming, and a local-directory
//! transport for `file://` feeds, air-gapped installs, and tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Fetches feed resources into local files.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the resource at `url` into `dest`, replacing any existing file.
    ///
    /// Implementations report transport-level failures (connectivity, HTTP
    /// status, missing source file) as errors; integrity is the caller's
    /// concern.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Join a feed base URL and a resource name.
#[must_use]
pub fn join_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// HTTP(S) transport backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a fresh client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        debug!(%url, dest = %dest.display(), "http fetch");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("Server rejected request: {url}"))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create file: {}", dest.display()))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Connection interrupted: {url}"))?;
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write: {}", dest.display()))?;
        }

        file.flush().await?;
        Ok(())
    }
}

/// Transport reading from a local directory (a `file://` feed).
#[derive(Debug, Clone)]
pub struct LocalTransport;

#[async_trait]
impl Transport for LocalTransport {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let source = url.strip_prefix("file://").unwrap_or(url);
        debug!(%source, dest = %dest.display(), "local fetch");

        tokio::fs::copy(source, dest)
            .await
            .with_context(|| format!("Failed to copy from feed: {source}"))?;
        Ok(())
    }
}

/// Pick a transport for a feed URL.
///
/// `http://` and `https://` feeds get [`HttpTransport`]; anything else is
/// treated as a local path.
#[must_use]
pub fn transport_for(feed_url: &str) -> std::sync::Arc<dyn Transport> {
    if feed_url.starts_with("http://") || feed_url.starts_with("https://") {
        std::sync::Arc::new(HttpTransport::new())
    } else {
        std::sync::Arc::new(LocalTransport)
    }
}
