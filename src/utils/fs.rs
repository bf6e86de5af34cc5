//! Filesystem utilities for staging and installing releases.
//!
//! These helpers underpin the atomicity guarantees of the pipeline: the
//! current-version pointer is written with [`atomic_write`] (temp file +
//! rename), version trees are materialized in scratch directories and renamed
//! into place, and artifact integrity is checked with chunked SHA-256 hashing
//! so progress can be reported while large packages are verified.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Read buffer size for chunked hashing.
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Ensure a directory exists, creating it and any missing parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
        return Ok(());
    }

    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Write a file atomically via a temporary sibling plus rename.
///
/// The content is synced to disk before the rename, so the target path never
/// holds a partially written file. Parent directories are created as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().context("Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Recursively copy a directory tree.
///
/// Creates the destination if missing, copies regular files only, and does
/// not follow symbolic links. Used to seed a delta staging directory from the
/// currently installed version's tree.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in fs::read_dir(src)
        .with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir(&entry.path(), &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &dst_path).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), dst_path.display())
            })?;
        }
        // Symlinks and special files are skipped
    }

    Ok(())
}

/// Compute the SHA-256 hash of a file, returned as lowercase hex.
pub fn hash_file(path: &Path) -> Result<String> {
    hash_file_chunked(path, |_| {})
}

/// Compute the SHA-256 hash of a file in fixed-size chunks.
///
/// `on_chunk` is invoked with the number of bytes consumed after each read,
/// which lets callers report byte-weighted progress while verifying large
/// artifacts.
pub fn hash_file_chunked(path: &Path, mut on_chunk: impl FnMut(u64)) -> Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("Cannot open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        on_chunk(read as u64);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Check that `path` stays within `base` after normalization.
///
/// Guards archive extraction against entries that try to escape the
/// destination directory with `..` components or absolute paths.
pub fn is_safe_path(base: &Path, path: &Path) -> bool {
    use std::path::Component;

    if path.is_absolute() {
        return false;
    }

    let mut depth: i32 = 0;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }

    base.join(path).starts_with(base)
}
