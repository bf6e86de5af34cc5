//! The versioned install directory owned by Updraft across runs.
//!
//! ```text
//! <root>/
//!   app-<version>/   one directory per installed version
//!   packages/        download staging area
//!   .current         pointer file naming the active version
//!   .locks/          per-installation update lock files
//! ```
//!
//! The `.current` pointer is the single source of truth for "what version is
//! running". Only the applier mutates it, while holding the update lock, and
//! always via an atomic temp-write plus rename; every other component treats
//! the layout as read-only or writes only to fresh paths.

use anyhow::{Context, Result};
use semver::Version;
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::fs::{atomic_write, ensure_dir};
use crate::version::parse_version;

/// Name of the current-version pointer file.
pub const CURRENT_POINTER_FILE: &str = ".current";

/// Prefix of per-version directories.
pub const VERSION_DIR_PREFIX: &str = "app-";

/// Handle to one application's install root.
#[derive(Debug, Clone)]
pub struct InstallRoot {
    root: PathBuf,
}

impl InstallRoot {
    /// Wrap an install root path. The directory need not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// The root directory itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// The download staging area.
    #[must_use]
    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    /// Directory holding update lock files.
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(".locks")
    }

    /// Directory for a specific installed version.
    #[must_use]
    pub fn version_dir(&self, version: &Version) -> PathBuf {
        self.root.join(format!("{VERSION_DIR_PREFIX}{version}"))
    }

    /// Read the current-version pointer.
    ///
    /// Returns `None` when the pointer file does not exist (fresh install).
    /// A pointer naming an unparsable version is an error, not a silent
    /// bootstrap: treating corruption as a fresh install would re-extract
    /// over live data.
    pub fn current_version(&self) -> Result<Option<Version>> {
        let pointer = self.root.join(CURRENT_POINTER_FILE);
        if !pointer.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&pointer)
            .with_context(|| format!("Failed to read current pointer: {}", pointer.display()))?;
        let version = parse_version(content.trim())
            .with_context(|| format!("Corrupt current pointer: {}", pointer.display()))?;

        Ok(Some(version))
    }

    /// The directory of the currently active version, if a pointer exists.
    pub fn current_dir(&self) -> Result<Option<PathBuf>> {
        Ok(self.current_version()?.map(|version| self.version_dir(&version)))
    }

    /// Atomically switch the current-version pointer.
    ///
    /// This is the commit point of an apply: a crash before this call leaves
    /// the previous version untouched and selectable, and the pointer file
    /// itself is never observable in a half-written state.
    pub fn set_current(&self, version: &Version) -> Result<()> {
        atomic_write(&self.root.join(CURRENT_POINTER_FILE), version.to_string().as_bytes())
    }

    /// List installed version directories, sorted ascending.
    pub fn installed_versions(&self) -> Result<Vec<Version>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read install root: {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(raw) = name.strip_prefix(VERSION_DIR_PREFIX)
                && let Ok(version) = parse_version(raw)
            {
                versions.push(version);
            }
        }

        versions.sort();
        Ok(versions)
    }

    /// Create the root, staging, and lock directories if missing.
    pub fn ensure_layout(&self) -> Result<()> {
        ensure_dir(&self.root)?;
        ensure_dir(&self.packages_dir())?;
        ensure_dir(&self.locks_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    #[test]
    fn test_fresh_root_has_no_current() {
        let temp = TempDir::new().unwrap();
        let root = InstallRoot::new(temp.path());
        assert_eq!(root.current_version().unwrap(), None);
        assert!(root.installed_versions().unwrap().is_empty());
    }

    #[test]
    fn test_set_and_read_current() {
        let temp = TempDir::new().unwrap();
        let root = InstallRoot::new(temp.path());

        root.set_current(&v("1.2.3")).unwrap();
        assert_eq!(root.current_version().unwrap(), Some(v("1.2.3")));
        assert_eq!(root.current_dir().unwrap().unwrap(), temp.path().join("app-1.2.3"));

        // Re-pointing is atomic and observable immediately
        root.set_current(&v("1.3.0")).unwrap();
        assert_eq!(root.current_version().unwrap(), Some(v("1.3.0")));
    }

    #[test]
    fn test_corrupt_pointer_is_an_error() {
        let temp = TempDir::new().unwrap();
        let root = InstallRoot::new(temp.path());
        fs::write(temp.path().join(CURRENT_POINTER_FILE), "garbage!").unwrap();

        assert!(root.current_version().is_err());
    }

    #[test]
    fn test_installed_versions_sorted() {
        let temp = TempDir::new().unwrap();
        let root = InstallRoot::new(temp.path());

        fs::create_dir(temp.path().join("app-1.10.0")).unwrap();
        fs::create_dir(temp.path().join("app-1.2.0")).unwrap();
        fs::create_dir(temp.path().join("packages")).unwrap(); // not a version dir
        fs::write(temp.path().join("app-0.1.0"), b"file, not dir").unwrap();

        let versions = root.installed_versions().unwrap();
        assert_eq!(versions, vec![v("1.2.0"), v("1.10.0")]);
    }

    #[test]
    fn test_ensure_layout() {
        let temp = TempDir::new().unwrap();
        let root = InstallRoot::new(temp.path().join("nested/install"));
        root.ensure_layout().unwrap();

        assert!(root.packages_dir().is_dir());
        assert!(root.locks_dir().is_dir());
    }
}
