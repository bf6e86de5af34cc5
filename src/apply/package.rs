//! Package extraction and delta patching seams.
//!
//! The pipeline treats both capabilities as opaque: [`PackageArchive`] turns
//! a full package into a file tree, [`DeltaPatcher`] turns a base tree plus a
//! delta package into the next version's tree. The provided implementations
//! read zip archives; a full package may carry a `package.toml` naming the
//! package id and version, and a delta package is a file overlay with an
//! optional `.updraft-removed` deletion list.

use crate::core::UpdraftError;
use crate::utils::fs::{copy_dir, ensure_dir, is_safe_path};
use anyhow::{Context, Result};
use semver::Version;
use serde::Deserialize;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{debug, trace};

/// Name of the optional metadata file inside a full package.
pub const METADATA_FILE: &str = "package.toml";

/// Name of the optional deletion list inside a delta package.
pub const REMOVED_LIST_FILE: &str = ".updraft-removed";

/// Metadata carried inside a full package.
#[derive(Debug, Deserialize)]
pub struct PackageMetadata {
    /// Package id, matching the manifest entry's package name.
    pub id: String,
    /// Version the package contains.
    pub version: Version,
}

impl PackageMetadata {
    /// Load metadata from an extracted tree, if the package carries any.
    pub fn load(tree: &Path) -> Result<Option<Self>> {
        let path = tree.join(METADATA_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let metadata: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid package metadata: {}", path.display()))?;
        Ok(Some(metadata))
    }
}

/// Extracts a full package into a directory tree.
///
/// Called with a progress callback receiving `(entries_done, entries_total)`
/// so the applier can weight extraction into its aggregate percentage.
pub trait PackageArchive: Send + Sync {
    fn extract(
        &self,
        package: &Path,
        dest: &Path,
        progress: &(dyn Fn(u64, u64) + Sync),
    ) -> Result<()>;
}

/// Applies a delta package to a base tree, producing the target tree at
/// `dest`. The base tree is never mutated.
pub trait DeltaPatcher: Send + Sync {
    fn patch(
        &self,
        delta: &Path,
        base: &Path,
        dest: &Path,
        progress: &(dyn Fn(u64, u64) + Sync),
    ) -> Result<()>;
}

/// Zip-backed [`PackageArchive`].
#[derive(Debug, Clone, Default)]
pub struct ZipPackageArchive;

impl PackageArchive for ZipPackageArchive {
    fn extract(
        &self,
        package: &Path,
        dest: &Path,
        progress: &(dyn Fn(u64, u64) + Sync),
    ) -> Result<()> {
        let filename = package_filename(package);
        let file = File::open(package)
            .with_context(|| format!("Cannot open package: {}", package.display()))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| invalid_package(&filename, e))?;

        let total = archive.len() as u64;
        debug!(package = %filename, entries = total, "extracting full package");

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| invalid_package(&filename, e))?;

            let Some(relative) = entry.enclosed_name() else {
                return Err(UpdraftError::InvalidPackage {
                    filename: filename.clone(),
                    reason: format!("entry escapes the package root: {}", entry.name()),
                }
                .into());
            };
            let target = dest.join(&relative);
            trace!(entry = %relative.display(), "extract");

            if entry.is_dir() {
                ensure_dir(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    ensure_dir(parent)?;
                }
                let mut out = File::create(&target)
                    .with_context(|| format!("Failed to create {}", target.display()))?;
                io::copy(&mut entry, &mut out)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                restore_unix_mode(&target, entry.unix_mode())?;
            }

            progress(index as u64 + 1, total);
        }

        Ok(())
    }
}

/// Zip-overlay [`DeltaPatcher`].
///
/// A delta package contains the files that changed between base and target,
/// plus an optional [`REMOVED_LIST_FILE`] listing relative paths to delete.
/// Patching copies the base tree to `dest`, lays the overlay on top, and
/// applies the deletions.
#[derive(Debug, Clone, Default)]
pub struct ZipOverlayPatcher;

impl DeltaPatcher for ZipOverlayPatcher {
    fn patch(
        &self,
        delta: &Path,
        base: &Path,
        dest: &Path,
        progress: &(dyn Fn(u64, u64) + Sync),
    ) -> Result<()> {
        let filename = package_filename(delta);
        copy_dir(base, dest)
            .with_context(|| format!("Failed to seed patch base from {}", base.display()))?;

        let file = File::open(delta)
            .with_context(|| format!("Cannot open delta package: {}", delta.display()))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| invalid_package(&filename, e))?;

        let total = archive.len() as u64;
        debug!(package = %filename, entries = total, "applying delta overlay");

        let mut removed = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| invalid_package(&filename, e))?;

            let Some(relative) = entry.enclosed_name() else {
                return Err(UpdraftError::InvalidPackage {
                    filename: filename.clone(),
                    reason: format!("entry escapes the package root: {}", entry.name()),
                }
                .into());
            };

            if relative == Path::new(REMOVED_LIST_FILE) {
                let mut content = String::new();
                io::Read::read_to_string(&mut entry, &mut content)
                    .with_context(|| format!("Failed to read deletion list in {filename}"))?;
                removed = content.lines().map(str::to_string).collect();
            } else if entry.is_dir() {
                ensure_dir(&dest.join(&relative))?;
            } else {
                let target = dest.join(&relative);
                trace!(entry = %relative.display(), "overlay");
                if let Some(parent) = target.parent() {
                    ensure_dir(parent)?;
                }
                let mut out = File::create(&target)
                    .with_context(|| format!("Failed to create {}", target.display()))?;
                io::copy(&mut entry, &mut out)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                restore_unix_mode(&target, entry.unix_mode())?;
            }

            progress(index as u64 + 1, total);
        }

        for line in removed {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let relative = Path::new(line);
            if !is_safe_path(dest, relative) {
                return Err(UpdraftError::InvalidPackage {
                    filename: filename.clone(),
                    reason: format!("deletion list escapes the package root: {line}"),
                }
                .into());
            }
            let target = dest.join(relative);
            if target.is_dir() {
                std::fs::remove_dir_all(&target)?;
            } else if target.exists() {
                std::fs::remove_file(&target)?;
            }
            // Paths already absent in the base are tolerated.
        }

        Ok(())
    }
}

fn package_filename(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn invalid_package(filename: &str, error: zip::result::ZipError) -> anyhow::Error {
    UpdraftError::InvalidPackage {
        filename: filename.to_string(),
        reason: error.to_string(),
    }
    .into()
}

#[cfg(unix)]
fn restore_unix_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode
        && mode != 0
    {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restore_unix_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}
