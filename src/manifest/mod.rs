//! Release manifest parsing and the release entry model.
//!
//! A feed publishes one `RELEASES` file per application: a line-oriented
//! text document with one release entry per line in the form
//!
//! ```text
//! <hex-sha256> <filename> <decimal-size>
//! ```
//!
//! The filename encodes the package id, the version, and whether the package
//! is a full release or a delta patch:
//!
//! ```text
//! acme-notes-1.1.0-full.pkg
//! acme-notes-1.1.0-delta.pkg
//! ```
//!
//! Parsing is atomic: a single malformed line rejects the whole manifest with
//! an [`UpdraftError::ManifestParse`] naming the line, so the planner never
//! operates on a partially understood feed. Within one manifest, at most one
//! full and at most one delta entry may exist per (package, version) pair,
//! and filenames are unique.
//!
//! [`UpdraftError::ManifestParse`]: crate::core::UpdraftError::ManifestParse

mod entry;

pub use entry::{PACKAGE_EXTENSION, ReleaseEntry, ReleaseKind};

use anyhow::Result;
use std::collections::HashSet;

use crate::core::UpdraftError;

/// Name of the manifest file published at the feed root.
pub const MANIFEST_FILE: &str = "RELEASES";

/// Parse a complete `RELEASES` document into release entries.
///
/// Blank lines are ignored. Order is preserved as published. Fails atomically
/// on the first malformed line or invariant violation.
///
/// # Errors
///
/// Returns [`UpdraftError::ManifestParse`] identifying the offending line.
pub fn parse_manifest(content: &str) -> Result<Vec<ReleaseEntry>> {
    let mut entries = Vec::new();
    let mut seen_filenames = HashSet::new();
    let mut seen_slots = HashSet::new();

    for (idx, raw_line) in content.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let entry = ReleaseEntry::parse_line(line, line_number)?;

        if !seen_filenames.insert(entry.filename.clone()) {
            return Err(UpdraftError::ManifestParse {
                line_number,
                line: line.to_string(),
                reason: format!("duplicate filename '{}'", entry.filename),
            }
            .into());
        }

        // At most one full and one delta entry per (package, version)
        let slot = (entry.package_name.clone(), entry.version.clone(), entry.is_delta);
        if !seen_slots.insert(slot) {
            return Err(UpdraftError::ManifestParse {
                line_number,
                line: line.to_string(),
                reason: format!(
                    "duplicate {} entry for {} {}",
                    if entry.is_delta { "delta" } else { "full" },
                    entry.package_name,
                    entry.version
                ),
            }
            .into());
        }

        entries.push(entry);
    }

    Ok(entries)
}

/// Render entries back into `RELEASES` document form.
///
/// Used by feed-publishing tooling and test fixtures; `parse_manifest`
/// accepts its output unchanged.
#[must_use]
pub fn render_manifest(entries: &[ReleaseEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.to_line());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::parse_version;

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn test_parse_manifest_ok() {
        let doc = format!(
            "{HASH_A} acme-notes-1.0.0-full.pkg 1024\n\
             {HASH_B} acme-notes-1.1.0-delta.pkg 64\n"
        );
        let entries = parse_manifest(&doc).unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].package_name, "acme-notes");
        assert_eq!(entries[0].version, parse_version("1.0.0").unwrap());
        assert!(!entries[0].is_delta);
        assert_eq!(entries[0].filesize, 1024);

        assert!(entries[1].is_delta);
        assert_eq!(entries[1].sha256, HASH_B);
    }

    #[test]
    fn test_parse_manifest_skips_blank_lines() {
        let doc = format!("\n{HASH_A} acme-notes-1.0.0-full.pkg 10\n\n");
        assert_eq!(parse_manifest(&doc).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_manifest_atomic_failure() {
        let doc = format!(
            "{HASH_A} acme-notes-1.0.0-full.pkg 10\n\
             not a valid line\n"
        );
        let err = parse_manifest(&doc).unwrap_err();
        let parse = err.downcast_ref::<UpdraftError>().unwrap();
        match parse {
            UpdraftError::ManifestParse {
                line_number, ..
            } => assert_eq!(*line_number, 2),
            other => panic!("Expected ManifestParse, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_manifest_rejects_duplicate_filename() {
        let doc = format!(
            "{HASH_A} acme-notes-1.0.0-full.pkg 10\n\
             {HASH_B} acme-notes-1.0.0-full.pkg 10\n"
        );
        let err = parse_manifest(&doc).unwrap_err().to_string();
        assert!(err.contains("duplicate"), "{err}");
    }

    #[test]
    fn test_parse_manifest_allows_full_and_delta_same_version() {
        let doc = format!(
            "{HASH_A} acme-notes-1.1.0-full.pkg 10\n\
             {HASH_B} acme-notes-1.1.0-delta.pkg 5\n"
        );
        assert_eq!(parse_manifest(&doc).unwrap().len(), 2);
    }

    #[test]
    fn test_render_round_trips() {
        let doc = format!(
            "{HASH_A} acme-notes-1.0.0-full.pkg 1024\n\
             {HASH_B} acme-notes-1.1.0-beta.1-delta.pkg 64\n"
        );
        let entries = parse_manifest(&doc).unwrap();
        assert_eq!(render_manifest(&entries), doc);
    }
}
