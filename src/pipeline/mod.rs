//! The check → download → apply pipeline.
//!
//! [`UpdateManager`] wires the planner, downloader and applier together under
//! the per-installation update lock. Each public operation validates its
//! inputs, takes the lock for its own duration and releases it on every exit
//! path; the [`update_app`] helper runs the whole sequence under one lock
//! acquisition and falls back to a full release when a delta chain fails to
//! apply.
//!
//! The manifest is fetched fresh on every check. Staleness between a check
//! and a later download is the caller's concern, and integrity verification
//! at download time catches a feed that changed in between.

use crate::apply::{
    Applier, DeltaPatcher, NoopShortcutWriter, PackageArchive, ShortcutWriter, ZipOverlayPatcher,
    ZipPackageArchive,
};
use crate::config::UpdraftConfig;
use crate::core::UpdraftError;
use crate::download::{DownloadedArtifact, Downloader, Transport, transport_for};
use crate::layout::InstallRoot;
use crate::lock::{UpdateLock, cleanup_stale_locks};
use crate::manifest::{ReleaseEntry, parse_manifest};
use crate::planner::{UpdateInfo, plan};
use crate::utils::ProgressHandle;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Lock files untouched for this long are presumed crashed and removed
/// before acquisition.
const STALE_LOCK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Orchestrates updates for one installation.
///
/// External collaborators (transport, archive extraction, delta patching,
/// shortcut writing) are injected at construction; [`UpdateManager::new`]
/// picks defaults suitable for zip-packaged feeds.
pub struct UpdateManager {
    config: UpdraftConfig,
    root: InstallRoot,
    downloader: Downloader,
    applier: Applier,
    cancel: CancellationToken,
}

impl UpdateManager {
    /// Create a manager with the default collaborators: transport chosen
    /// from the feed URL scheme, zip packages, zip-overlay deltas, no
    /// shortcut writer.
    pub fn new(config: UpdraftConfig) -> Result<Self> {
        let transport = transport_for(&config.feed_url);
        Self::with_collaborators(
            config,
            transport,
            Arc::new(ZipPackageArchive),
            Arc::new(ZipOverlayPatcher),
            Arc::new(NoopShortcutWriter),
        )
    }

    /// Create a manager with explicit collaborators.
    pub fn with_collaborators(
        config: UpdraftConfig,
        transport: Arc<dyn Transport>,
        archive: Arc<dyn PackageArchive>,
        patcher: Arc<dyn DeltaPatcher>,
        shortcuts: Arc<dyn ShortcutWriter>,
    ) -> Result<Self> {
        config.validate()?;

        let root = InstallRoot::new(&config.root_dir);
        root.ensure_layout()?;

        let cancel = CancellationToken::new();
        let downloader = Downloader::new(
            transport,
            config.feed_url.clone(),
            root.packages_dir(),
            cancel.clone(),
        );
        let applier = Applier::new(
            root.clone(),
            config.package_id.clone(),
            archive,
            patcher,
            shortcuts,
            cancel.clone(),
        );

        Ok(Self {
            config,
            root,
            downloader,
            applier,
            cancel,
        })
    }

    /// The configuration this manager runs with.
    #[must_use]
    pub const fn config(&self) -> &UpdraftConfig {
        &self.config
    }

    /// The install root layout.
    #[must_use]
    pub const fn root(&self) -> &InstallRoot {
        &self.root
    }

    /// A token that cancels in-flight downloads and any apply work that has
    /// not yet reached the pointer swap.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetch the feed manifest and plan the releases to apply.
    ///
    /// The manifest is never cached; two checks against an unchanged feed
    /// yield the same plan. Progress is coarse: fetch, parse, plan.
    #[instrument(skip(self, progress), fields(package = %self.config.package_id))]
    pub async fn check_for_update(
        &self,
        ignore_delta_updates: bool,
        progress: &ProgressHandle,
    ) -> Result<UpdateInfo> {
        let _lock = self.acquire_lock().await?;
        self.check_for_update_locked(ignore_delta_updates, progress).await
    }

    /// Stage and verify the given releases.
    ///
    /// Completes without refetching when every artifact is already staged
    /// and verifies clean.
    #[instrument(skip(self, releases, progress), fields(package = %self.config.package_id, count = releases.len()))]
    pub async fn download_releases(
        &self,
        releases: &[ReleaseEntry],
        progress: &ProgressHandle,
    ) -> Result<()> {
        self.validate_releases(releases)?;
        let _lock = self.acquire_lock().await?;
        self.download_releases_locked(releases, progress).await?;
        Ok(())
    }

    /// Install a planned update and switch the current pointer.
    ///
    /// Returns the new version's entry-point executables when the plan was a
    /// bootstrap, an empty list otherwise.
    #[instrument(skip(self, update, progress), fields(package = %self.config.package_id))]
    pub async fn apply_releases(
        &self,
        update: &UpdateInfo,
        progress: &ProgressHandle,
    ) -> Result<Vec<PathBuf>> {
        if !update.is_up_to_date() {
            self.validate_releases(&update.releases_to_apply)?;
        }
        let _lock = self.acquire_lock().await?;
        self.applier.apply(update, progress).await
    }

    async fn check_for_update_locked(
        &self,
        ignore_delta_updates: bool,
        progress: &ProgressHandle,
    ) -> Result<UpdateInfo> {
        let allow_delta = self.config.allow_delta && !ignore_delta_updates;

        progress.report(10);
        let content = self.downloader.fetch_manifest().await?;
        progress.report(40);

        let entries = parse_manifest(&content)?;
        progress.report(70);

        let current = self.root.current_version()?;
        let update = plan(&entries, &self.config.package_id, current.as_ref(), allow_delta)?;

        if update.is_up_to_date() {
            info!(current = ?update.currently_installed_version, "already up to date");
        } else {
            info!(
                target = ?update.target_version(),
                releases = update.releases_to_apply.len(),
                bootstrap = update.is_bootstrapping,
                "update available"
            );
        }

        progress.complete();
        Ok(update)
    }

    async fn download_releases_locked(
        &self,
        releases: &[ReleaseEntry],
        progress: &ProgressHandle,
    ) -> Result<Vec<DownloadedArtifact>> {
        self.downloader.download(releases, progress).await
    }

    async fn acquire_lock(&self) -> Result<UpdateLock> {
        let locks_dir = self.root.locks_dir();
        if let Ok(removed) = cleanup_stale_locks(&locks_dir, STALE_LOCK_TTL).await
            && removed > 0
        {
            info!(removed, "removed stale lock files");
        }

        UpdateLock::acquire(
            &locks_dir,
            self.config.installation_id(),
            self.config.lock_timeout(),
        )
        .await
    }

    /// Reject release sets that do not belong to this installation.
    fn validate_releases(&self, releases: &[ReleaseEntry]) -> Result<()> {
        if releases.is_empty() {
            return Err(UpdraftError::InvalidInput {
                reason: "release set is empty".to_string(),
            }
            .into());
        }
        if let Some(foreign) =
            releases.iter().find(|e| e.package_name != self.config.package_id)
        {
            return Err(UpdraftError::InvalidInput {
                reason: format!(
                    "release {} belongs to package '{}', this installation manages '{}'",
                    foreign.filename, foreign.package_name, self.config.package_id
                ),
            }
            .into());
        }
        Ok(())
    }
}

/// Run check, download and apply as one operation under a single lock
/// acquisition.
///
/// Returns the highest-version entry that was actually applied, or `None`
/// when the installation was already current. When a delta chain fails to
/// apply, the whole sequence is retried once with deltas disabled; the
/// fallback to the latest full release is a normal path, not an error.
pub async fn update_app(manager: &UpdateManager) -> Result<Option<ReleaseEntry>> {
    let _lock = manager.acquire_lock().await?;

    match run_update(manager, false).await {
        Err(e)
            if matches!(
                e.downcast_ref::<UpdraftError>(),
                Some(UpdraftError::DeltaApplication { .. })
            ) =>
        {
            warn!(error = %e, "delta chain failed to apply, retrying with the full release");
            run_update(manager, true).await
        }
        result => result,
    }
}

async fn run_update(
    manager: &UpdateManager,
    ignore_delta_updates: bool,
) -> Result<Option<ReleaseEntry>> {
    let progress = ProgressHandle::none();

    let update = manager
        .check_for_update_locked(ignore_delta_updates, &progress)
        .await?;
    if update.is_up_to_date() {
        return Ok(None);
    }

    let artifacts = manager
        .download_releases_locked(&update.releases_to_apply, &ProgressHandle::none())
        .await?;
    manager.applier.apply(&update, &ProgressHandle::none()).await?;

    // Staged packages have served their purpose once the pointer moved.
    manager.downloader.discard(&artifacts).await;

    Ok(update.releases_to_apply.last().cloned())
}
