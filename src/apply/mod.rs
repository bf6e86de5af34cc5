//! Atomic installation of planned releases.
//!
//! The applier owns the one piece of shared mutable state in the system: the
//! install root and its current-version pointer. Every release set is
//! materialized in a scratch directory inside the root, renamed to its final
//! `app-<version>` directory, and only then does the pointer move. A crash or
//! cancellation anywhere before the swap leaves the previous version fully
//! installed and selected; once the swap begins, cancellation is ignored.

pub mod package;
pub mod shortcuts;

pub use package::{
    DeltaPatcher, METADATA_FILE, PackageArchive, PackageMetadata, REMOVED_LIST_FILE,
    ZipOverlayPatcher, ZipPackageArchive,
};
pub use shortcuts::{NoopShortcutWriter, ShortcutWriter};

use crate::core::UpdraftError;
use crate::layout::InstallRoot;
use crate::manifest::ReleaseEntry;
use crate::planner::UpdateInfo;
use crate::utils::ProgressHandle;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Installs downloaded release packages into the versioned layout.
pub struct Applier {
    root: InstallRoot,
    package_id: String,
    archive: Arc<dyn PackageArchive>,
    patcher: Arc<dyn DeltaPatcher>,
    shortcuts: Arc<dyn ShortcutWriter>,
    cancel: CancellationToken,
}

impl Applier {
    pub fn new(
        root: InstallRoot,
        package_id: impl Into<String>,
        archive: Arc<dyn PackageArchive>,
        patcher: Arc<dyn DeltaPatcher>,
        shortcuts: Arc<dyn ShortcutWriter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            root,
            package_id: package_id.into(),
            archive,
            patcher,
            shortcuts,
            cancel,
        }
    }

    /// Materialize the planned releases and switch the current pointer.
    ///
    /// Returns the new version's entry-point executables when the plan was a
    /// bootstrap, an empty list otherwise. Progress is byte-weighted across
    /// the plan's declared package sizes and reaches 100 only on success.
    pub async fn apply(
        &self,
        update: &UpdateInfo,
        progress: &ProgressHandle,
    ) -> Result<Vec<PathBuf>> {
        if update.is_up_to_date() {
            debug!("nothing to apply, already up to date");
            progress.complete();
            return Ok(Vec::new());
        }

        let target = update
            .target_version()
            .ok_or_else(|| UpdraftError::InvalidInput {
                reason: "update plan has no target version".to_string(),
            })?
            .clone();

        let dest = self.root.version_dir(&target);
        if dest.exists() {
            return Err(UpdraftError::DestinationExists {
                path: dest.display().to_string(),
            }
            .into());
        }

        // Scratch lives inside the root so the final rename stays on one
        // filesystem.
        let scratch = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(self.root.path())?;

        let tree = if update.releases_to_apply.iter().all(|e| !e.is_delta) {
            self.materialize_full(update, scratch.path(), progress)
                .await?
        } else {
            self.materialize_delta_chain(update, scratch.path(), progress)
                .await?
        };

        if self.cancel.is_cancelled() {
            // Scratch drops with the guard; the previous version is untouched.
            return Err(UpdraftError::Cancelled.into());
        }

        // Point of no return: rename the tree into place, then move the
        // pointer. Cancellation is ignored from here on.
        std::fs::rename(&tree, &dest)?;
        self.root.set_current(&target)?;
        info!(version = %target, path = %dest.display(), "current version switched");

        let executables = if update.is_bootstrapping {
            discover_executables(&dest)
        } else {
            Vec::new()
        };

        if let Err(e) = self.shortcuts.rewrite(&self.package_id, &dest, &executables) {
            // The install itself succeeded; a shortcut failure is not worth
            // failing the whole update over.
            warn!(error = %e, "shortcut rewrite failed");
        }

        progress.complete();
        Ok(executables)
    }

    /// Extract the single full package into `scratch/tree`.
    async fn materialize_full(
        &self,
        update: &UpdateInfo,
        scratch: &Path,
        progress: &ProgressHandle,
    ) -> Result<PathBuf> {
        let entry = &update.releases_to_apply[0];
        let package = self.staged_package(entry)?;
        let tree = scratch.join("tree");
        std::fs::create_dir(&tree)?;

        debug!(filename = %entry.filename, "extracting full release");
        let total = update.total_size();
        self.run_extract(package, tree.clone(), entry.filesize, 0, total, progress)
            .await?;

        self.check_metadata(&tree, entry)?;
        Ok(tree)
    }

    /// Apply the delta chain link by link, each intermediate tree feeding the
    /// next, starting from the currently installed version's files.
    async fn materialize_delta_chain(
        &self,
        update: &UpdateInfo,
        scratch: &Path,
        progress: &ProgressHandle,
    ) -> Result<PathBuf> {
        let current = update.currently_installed_version.as_ref().ok_or_else(|| {
            UpdraftError::InvalidInput {
                reason: "delta plan without an installed version".to_string(),
            }
        })?;

        let base_dir = self.root.version_dir(current);
        if !base_dir.is_dir() {
            return Err(UpdraftError::MissingInstalledVersion {
                version: current.to_string(),
            }
            .into());
        }

        let total = update.total_size();
        let mut consumed = 0u64;
        let mut base = base_dir;

        for (index, entry) in update.releases_to_apply.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(UpdraftError::Cancelled.into());
            }

            let package = self.staged_package(entry)?;
            let link_dest = scratch.join(format!("link-{index}"));
            debug!(filename = %entry.filename, version = %entry.version, "applying delta link");

            self.run_patch(package, base, link_dest.clone(), entry, consumed, total, progress)
                .await?;

            consumed += entry.filesize;
            base = link_dest;
        }

        Ok(base)
    }

    /// Resolve a plan entry to its verified staging path.
    fn staged_package(&self, entry: &ReleaseEntry) -> Result<PathBuf> {
        let path = self.root.packages_dir().join(&entry.filename);
        if !path.is_file() {
            return Err(UpdraftError::InvalidInput {
                reason: format!(
                    "package {} is not staged; download the releases first",
                    entry.filename
                ),
            }
            .into());
        }
        Ok(path)
    }

    async fn run_extract(
        &self,
        package: PathBuf,
        tree: PathBuf,
        weight: u64,
        consumed: u64,
        total: u64,
        progress: &ProgressHandle,
    ) -> Result<()> {
        let archive = Arc::clone(&self.archive);
        let handle = progress.clone();
        tokio::task::spawn_blocking(move || {
            archive.extract(&package, &tree, &move |done, entries| {
                handle.report_bytes(consumed + scaled(done, entries, weight), total);
            })
        })
        .await?
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_patch(
        &self,
        package: PathBuf,
        base: PathBuf,
        dest: PathBuf,
        entry: &ReleaseEntry,
        consumed: u64,
        total: u64,
        progress: &ProgressHandle,
    ) -> Result<()> {
        let patcher = Arc::clone(&self.patcher);
        let handle = progress.clone();
        let weight = entry.filesize;
        let result = tokio::task::spawn_blocking(move || {
            patcher.patch(&package, &base, &dest, &move |done, entries| {
                handle.report_bytes(consumed + scaled(done, entries, weight), total);
            })
        })
        .await?;

        result.map_err(|e| UpdraftError::DeltaApplication {
            filename: entry.filename.clone(),
            version: entry.version.to_string(),
            reason: format!("{e:#}"),
        })?;
        Ok(())
    }

    /// Validate embedded package metadata against the manifest entry.
    fn check_metadata(&self, tree: &Path, entry: &ReleaseEntry) -> Result<()> {
        let Some(metadata) = PackageMetadata::load(tree)? else {
            return Ok(());
        };

        if metadata.id != entry.package_name || metadata.version != entry.version {
            return Err(UpdraftError::InvalidPackage {
                filename: entry.filename.clone(),
                reason: format!(
                    "metadata declares {} {}, manifest entry is {} {}",
                    metadata.id, metadata.version, entry.package_name, entry.version
                ),
            }
            .into());
        }
        Ok(())
    }
}

/// Map an archive's `(entries_done, entries_total)` into its byte weight.
fn scaled(done: u64, entries: u64, weight: u64) -> u64 {
    if entries == 0 {
        weight
    } else {
        weight.saturating_mul(done) / entries
    }
}

/// Find entry-point executables in an installed version directory.
///
/// Unix looks at permission bits, other platforms at the `.exe` suffix. The
/// result is sorted so bootstrap launch lists are deterministic.
#[must_use]
pub fn discover_executables(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_executable(e.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    found.sort();
    found
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
}
