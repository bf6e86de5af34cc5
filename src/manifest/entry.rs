//! The immutable release entry record.

use anyhow::Result;
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::core::UpdraftError;
use crate::version::parse_version;

/// File extension for release packages.
pub const PACKAGE_EXTENSION: &str = "pkg";

/// Whether a release package is self-contained or an incremental patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    /// A complete, self-contained package for one version.
    Full,
    /// A patch transforming the previous version's files into this version.
    Delta,
}

impl ReleaseKind {
    fn suffix(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Delta => "delta",
        }
    }
}

/// Filename grammar: `<id>-<version>-<full|delta>.pkg`.
///
/// The id may itself contain hyphens; the version must start with a digit and
/// the kind suffix is anchored at the end, which keeps the split unambiguous.
static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<id>[A-Za-z][A-Za-z0-9_.-]*?)-(?P<version>\d+(?:\.\d+){0,2}(?:-[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?)-(?P<kind>full|delta)\.pkg$",
    )
    .expect("filename grammar regex is valid")
});

/// One downloadable artifact described by the feed.
///
/// Immutable after parse; the planner, downloader, and applier only ever
/// borrow entries, never alter them. Within a manifest the filename uniquely
/// identifies the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    /// Package id this entry belongs to (e.g. `acme-notes`).
    pub package_name: String,
    /// Version this entry installs or patches up to.
    pub version: Version,
    /// Artifact filename as published by the feed.
    pub filename: String,
    /// Hex SHA-256 of the artifact's bytes, as declared by the feed.
    pub sha256: String,
    /// Declared size in bytes; drives byte-weighted progress.
    pub filesize: u64,
    /// True for delta patches, false for full packages.
    pub is_delta: bool,
}

impl ReleaseEntry {
    /// Construct an entry from its parts, deriving the canonical filename.
    ///
    /// Primarily for feed-publishing tooling and tests; entries consumed by
    /// the pipeline come from [`parse_line`](Self::parse_line).
    #[must_use]
    pub fn new(
        package_name: impl Into<String>,
        version: Version,
        kind: ReleaseKind,
        sha256: impl Into<String>,
        filesize: u64,
    ) -> Self {
        let package_name = package_name.into();
        let filename =
            format!("{package_name}-{version}-{}.{PACKAGE_EXTENSION}", kind.suffix());
        Self {
            package_name,
            version,
            filename,
            sha256: sha256.into(),
            filesize,
            is_delta: kind == ReleaseKind::Delta,
        }
    }

    /// Parse one manifest line (`<hex-hash> <filename> <decimal-size>`).
    ///
    /// # Errors
    ///
    /// Returns [`UpdraftError::ManifestParse`] naming `line_number` when the
    /// line has the wrong shape, a non-hex hash, an unparsable filename, or
    /// an invalid size.
    pub fn parse_line(line: &str, line_number: usize) -> Result<Self> {
        let fail = |reason: String| -> anyhow::Error {
            UpdraftError::ManifestParse {
                line_number,
                line: line.to_string(),
                reason,
            }
            .into()
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [hash, filename, size] = fields.as_slice() else {
            return Err(fail(format!("expected 3 fields, found {}", fields.len())));
        };

        if hash.len() != 64 || hex::decode(hash).is_err() {
            return Err(fail("hash is not 64 hex characters".to_string()));
        }

        let filesize: u64 =
            size.parse().map_err(|_| fail(format!("invalid size '{size}'")))?;

        let (package_name, version, is_delta) = Self::parse_filename(filename)
            .map_err(|e| fail(format!("invalid filename '{filename}': {e}")))?;

        Ok(Self {
            package_name,
            version,
            filename: (*filename).to_string(),
            sha256: hash.to_lowercase(),
            filesize,
            is_delta,
        })
    }

    /// Split a package filename into (id, version, is_delta).
    fn parse_filename(filename: &str) -> Result<(String, Version, bool)> {
        let captures = FILENAME_RE
            .captures(filename)
            .ok_or_else(|| anyhow::anyhow!("does not match <id>-<version>-<full|delta>.pkg"))?;

        let id = captures["id"].to_string();
        let version = parse_version(&captures["version"])?;
        let is_delta = &captures["kind"] == "delta";

        Ok((id, version, is_delta))
    }

    /// The release kind of this entry.
    #[must_use]
    pub const fn kind(&self) -> ReleaseKind {
        if self.is_delta {
            ReleaseKind::Delta
        } else {
            ReleaseKind::Full
        }
    }

    /// Render this entry back into manifest line form.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{} {} {}", self.sha256, self.filename, self.filesize)
    }
}
