//! Launch-shortcut rewriting seam.
//!
//! After the current pointer moves, OS shortcuts and launch entries need to
//! reference the new version directory. How that happens is platform glue
//! owned by the embedding application; the pipeline only promises to call it
//! at the right moment, after the swap.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rewrites launch shortcuts to point at a freshly installed version.
pub trait ShortcutWriter: Send + Sync {
    /// Called once per successful apply, after the current pointer has moved.
    ///
    /// `current_dir` is the new version's directory; `executables` is the
    /// discovered entry-point list (empty outside bootstrap).
    fn rewrite(&self, package_id: &str, current_dir: &Path, executables: &[PathBuf])
    -> Result<()>;
}

/// Default writer that records the event and does nothing.
#[derive(Debug, Clone, Default)]
pub struct NoopShortcutWriter;

impl ShortcutWriter for NoopShortcutWriter {
    fn rewrite(
        &self,
        package_id: &str,
        current_dir: &Path,
        executables: &[PathBuf],
    ) -> Result<()> {
        debug!(
            package_id,
            current_dir = %current_dir.display(),
            executables = executables.len(),
            "no shortcut writer configured, skipping rewrite"
        );
        Ok(())
    }
}
