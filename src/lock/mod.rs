//! Per-installation update lock.
//!
//! Exactly one updater instance may run check/download/apply against a given
//! installation at a time. Exclusivity is scoped to the named installation's
//! install root, not to the machine or process: two different applications
//! update concurrently without contention.
//!
//! The lock is an OS-level exclusive file lock (via `fs4`) on
//! `<root>/.locks/<installation>.lock`. Acquisition polls non-blockingly with
//! exponential backoff up to a bounded timeout; exhaustion fails with
//! [`UpdraftError::LockWaitTimeout`], which means "another update is already
//! in progress" - a recoverable try-again-later condition, never corruption.
//! The lock is released when the handle drops, including on failure paths.
//!
//! All file operations are wrapped in `spawn_blocking` to avoid stalling the
//! tokio runtime.
//!
//! [`UpdraftError::LockWaitTimeout`]: crate::core::UpdraftError::LockWaitTimeout

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

use crate::core::UpdraftError;

/// First backoff delay when the lock is contended, in milliseconds.
const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Backoff delay cap, in milliseconds.
const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Default bounded wait for lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Exclusive ownership of one installation's update process.
///
/// Holding this handle is what authorizes mutating the install directory.
/// The OS lock is released when the handle is dropped.
#[derive(Debug)]
pub struct UpdateLock {
    /// Lock is held as long as this handle is open
    _file: Arc<File>,
    installation: String,
    path: PathBuf,
}

impl UpdateLock {
    /// Acquire the update lock for `installation` under `locks_dir`.
    ///
    /// Polls with exponential backoff (10ms doubling up to 500ms) until
    /// `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`UpdraftError::LockWaitTimeout`] when another updater holds
    /// the lock for the whole wait, or an IO error if the lock file cannot
    /// be created.
    pub async fn acquire(
        locks_dir: &Path,
        installation: &str,
        timeout: Duration,
    ) -> Result<Self> {
        debug!(%installation, "waiting for update lock");

        tokio::fs::create_dir_all(locks_dir).await.with_context(|| {
            format!("Failed to create locks directory: {}", locks_dir.display())
        })?;

        let path = locks_dir.join(format!("{installation}.lock"));

        let path_clone = path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&path_clone)
        })
        .await
        .context("spawn_blocking panicked")?
        .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        let file = Arc::new(file);
        let start = std::time::Instant::now();

        // from_millis sets the doubling base; the factor scales the first
        // delay up to STARTING_BACKOFF_DELAY_MS
        let backoff = ExponentialBackoff::from_millis(2)
            .factor(STARTING_BACKOFF_DELAY_MS / 2)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let file_clone = Arc::clone(&file);
            let locked = tokio::task::spawn_blocking(move || file_clone.try_lock_exclusive())
                .await
                .context("spawn_blocking panicked")?;

            match locked {
                Ok(true) => {
                    // Stamp the file so a held lock never looks stale to
                    // cleanup_stale_locks: acquisition reuses the existing
                    // file, whose mtime may predate the TTL by far.
                    let file_clone = Arc::clone(&file);
                    tokio::task::spawn_blocking(move || stamp(&file_clone))
                        .await
                        .context("spawn_blocking panicked")?
                        .with_context(|| {
                            format!("Failed to refresh lock file: {}", path.display())
                        })?;

                    debug!(
                        %installation,
                        wait_ms = start.elapsed().as_millis(),
                        "update lock acquired"
                    );
                    return Ok(Self {
                        _file: file,
                        installation: installation.to_string(),
                        path,
                    });
                }
                Ok(false) | Err(_) => {
                    let remaining = timeout.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        return Err(UpdraftError::LockWaitTimeout {
                            installation: installation.to_string(),
                            waited_secs: timeout.as_secs(),
                        }
                        .into());
                    }
                    tokio::time::sleep(delay.min(remaining)).await;
                }
            }
        }

        Err(UpdraftError::LockWaitTimeout {
            installation: installation.to_string(),
            waited_secs: timeout.as_secs(),
        }
        .into())
    }

    /// The installation this lock is scoped to.
    #[must_use]
    pub fn installation(&self) -> &str {
        &self.installation
    }
}

/// Rewrite the lock file with the holder's pid, refreshing its mtime.
fn stamp(file: &File) -> std::io::Result<()> {
    let mut writer = file;
    file.set_len(0)?;
    writeln!(writer, "{}", std::process::id())?;
    writer.flush()
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        // The OS releases the lock when the handle closes; unlock explicitly
        // so the release is immediate rather than at some later close
        if let Err(e) = FileExt::unlock(&*self._file) {
            debug!(installation = %self.installation, error = %e, "failed to unlock");
        }
        debug!(installation = %self.installation, path = %self.path.display(), "update lock released");
    }
}

/// Remove lock files older than `ttl` from `locks_dir`.
///
/// Lock files accumulate when updater processes crash without unlocking.
/// An old mtime alone is not proof of a crash, so a candidate is only
/// removed after a non-blocking lock attempt on it succeeds; files a live
/// process still holds are skipped. Returns the number of files removed.
pub async fn cleanup_stale_locks(locks_dir: &Path, ttl: Duration) -> Result<usize> {
    use std::time::SystemTime;

    if !locks_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    let now = SystemTime::now();

    let mut entries = tokio::fs::read_dir(locks_dir)
        .await
        .context("Failed to read locks directory")?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("lock") {
            continue;
        }

        let Ok(metadata) = tokio::fs::metadata(&path).await else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };

        if let Ok(age) = now.duration_since(modified)
            && age > ttl
        {
            let candidate = path.clone();
            let removed_file = tokio::task::spawn_blocking(move || remove_if_unheld(&candidate))
                .await
                .context("spawn_blocking panicked")?;
            if removed_file {
                debug!(path = %path.display(), "removed stale lock file");
                removed += 1;
            }
        }
    }

    Ok(removed)
}

/// Remove a stale-looking lock file, but only while no live process holds
/// a lock on it. Removal happens with the lock held, so any concurrent
/// acquirer either beat us to the lock (and is skipped) or opens the fresh
/// path afterwards.
fn remove_if_unheld(path: &Path) -> bool {
    let Ok(file) = OpenOptions::new().write(true).open(path) else {
        return false;
    };
    if !FileExt::try_lock_exclusive(&file).unwrap_or(false) {
        return false;
    }
    let removed = std::fs::remove_file(path).is_ok();
    let _ = FileExt::unlock(&file);
    removed
}
