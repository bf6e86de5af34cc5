//! Staged, verified artifact downloads.
//!
//! Every planned release package is fetched into the installation's staging
//! directory, hash-verified against the manifest, and only then renamed into
//! place. A package that is already staged and verifies clean is never
//! fetched again, so an interrupted batch resumes where it left off.
//! Verification failure on any artifact aborts the whole batch: a partially
//! trustworthy set of packages is not worth applying.

pub mod transport;

pub use transport::{HttpTransport, LocalTransport, Transport, join_url, transport_for};

use crate::core::UpdraftError;
use crate::manifest::{MANIFEST_FILE, ReleaseEntry};
use crate::utils::{ProgressHandle, hash_file, hash_file_chunked};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Suffix for in-flight fetches. A `.partial` file is never trusted.
const PARTIAL_SUFFIX: &str = "partial";

/// A release package that has been staged locally and hash-verified.
#[derive(Debug, Clone)]
pub struct DownloadedArtifact {
    /// The manifest entry this artifact satisfies.
    pub entry: ReleaseEntry,
    /// Location of the verified package file in the staging directory.
    pub path: PathBuf,
    /// True when the artifact was already staged from an earlier run.
    pub reused: bool,
}

/// Fetches and verifies release packages for one feed.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    feed_url: String,
    staging_dir: PathBuf,
    cancel: CancellationToken,
}

impl Downloader {
    /// Create a downloader staging into `staging_dir`.
    pub fn new(
        transport: Arc<dyn Transport>,
        feed_url: impl Into<String>,
        staging_dir: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            feed_url: feed_url.into(),
            staging_dir: staging_dir.into(),
            cancel,
        }
    }

    /// Fetch the feed's `RELEASES` manifest and return its text.
    pub async fn fetch_manifest(&self) -> Result<String> {
        let url = join_url(&self.feed_url, MANIFEST_FILE);
        let dest = self.staging_dir.join(format!("{MANIFEST_FILE}.{PARTIAL_SUFFIX}"));

        self.fetch_cancellable(&url, &dest, MANIFEST_FILE).await?;

        let content = tokio::fs::read_to_string(&dest).await?;
        let _ = tokio::fs::remove_file(&dest).await;
        Ok(content)
    }

    /// Download every entry in `releases`, verifying each against its
    /// manifest hash and size.
    ///
    /// Progress is byte-weighted across the declared sizes of the whole
    /// batch and reaches 100 only when every artifact has verified clean.
    /// Already-staged artifacts that verify are reused and still contribute
    /// their full weight. Returns the artifacts in input order.
    pub async fn download(
        &self,
        releases: &[ReleaseEntry],
        progress: &ProgressHandle,
    ) -> Result<Vec<DownloadedArtifact>> {
        let total: u64 = releases.iter().map(|e| e.filesize).sum();
        let done = Arc::new(AtomicU64::new(0));
        let mut artifacts = Vec::with_capacity(releases.len());

        for entry in releases {
            if self.cancel.is_cancelled() {
                return Err(UpdraftError::Cancelled.into());
            }

            let dest = self.staging_dir.join(&entry.filename);

            if dest.exists() && self.verify_quiet(&dest, entry).await? {
                debug!(filename = %entry.filename, "reusing staged artifact");
                let count = done.fetch_add(entry.filesize, Ordering::Relaxed) + entry.filesize;
                progress.report_bytes(count, total);
                artifacts.push(DownloadedArtifact {
                    entry: entry.clone(),
                    path: dest,
                    reused: true,
                });
                continue;
            }

            let partial = self
                .staging_dir
                .join(format!("{}.{PARTIAL_SUFFIX}", entry.filename));
            let url = join_url(&self.feed_url, &entry.filename);

            self.fetch_cancellable(&url, &partial, &entry.filename).await?;
            self.verify_staged(&partial, entry, Arc::clone(&done), total, progress)
                .await?;

            tokio::fs::rename(&partial, &dest).await?;
            info!(filename = %entry.filename, size = entry.filesize, "artifact staged");
            artifacts.push(DownloadedArtifact {
                entry: entry.clone(),
                path: dest,
                reused: false,
            });
        }

        progress.complete();
        Ok(artifacts)
    }

    /// Remove staged package files after a successful apply.
    ///
    /// Best-effort: by the time this runs the update has committed, so a
    /// leftover staged file is only wasted disk, never a failed update.
    pub async fn discard(&self, artifacts: &[DownloadedArtifact]) {
        for artifact in artifacts {
            if artifact.path.exists()
                && let Err(e) = tokio::fs::remove_file(&artifact.path).await
            {
                warn!(
                    path = %artifact.path.display(),
                    error = %e,
                    "failed to discard staged package"
                );
            }
        }
    }

    async fn fetch_cancellable(&self, url: &str, dest: &Path, filename: &str) -> Result<()> {
        let result = tokio::select! {
            result = self.transport.fetch(url, dest) => result,
            () = self.cancel.cancelled() => {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(UpdraftError::Cancelled.into());
            }
        };

        result.map_err(|e| UpdraftError::ArtifactTransport {
            filename: filename.to_string(),
            reason: format!("{e:#}"),
        })?;
        Ok(())
    }

    /// Hash a pre-existing staged file without touching the progress counter.
    /// A stale leftover that fails the check is deleted so it can be refetched.
    async fn verify_quiet(&self, path: &Path, entry: &ReleaseEntry) -> Result<bool> {
        let path_owned = path.to_path_buf();
        let actual = tokio::task::spawn_blocking(move || hash_file(&path_owned)).await??;

        if actual == entry.sha256 {
            Ok(true)
        } else {
            debug!(filename = %entry.filename, "staged artifact failed verification, refetching");
            tokio::fs::remove_file(path).await?;
            Ok(false)
        }
    }

    /// Hash a freshly fetched file, feeding byte counts into the shared
    /// progress accumulator. Mismatch aborts the batch.
    async fn verify_staged(
        &self,
        path: &Path,
        entry: &ReleaseEntry,
        done: Arc<AtomicU64>,
        total: u64,
        progress: &ProgressHandle,
    ) -> Result<()> {
        let path_owned = path.to_path_buf();
        let handle = progress.clone();
        let actual = tokio::task::spawn_blocking(move || {
            hash_file_chunked(&path_owned, |bytes| {
                let count = done.fetch_add(bytes, Ordering::Relaxed) + bytes;
                handle.report_bytes(count, total);
            })
        })
        .await??;

        if actual != entry.sha256 {
            let _ = tokio::fs::remove_file(path).await;
            return Err(UpdraftError::ArtifactIntegrity {
                filename: entry.filename.clone(),
                expected: entry.sha256.clone(),
                actual,
            }
            .into());
        }
        Ok(())
    }
}
