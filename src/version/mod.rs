//! Version parsing and ordering helpers.
//!
//! Release feeds are not always strict about version formatting, so parsing
//! is lenient about a leading `v` prefix and missing minor/patch components
//! (`1.2` parses as `1.2.0`). Ordering is the `semver` crate's ordering,
//! which places pre-release versions before their corresponding release
//! (`1.1.0-beta.1 < 1.1.0`) - exactly the ordering the planner relies on when
//! it sorts delta chains and picks the latest full release.

use anyhow::{Context, Result};
use semver::Version;

/// Parse a version string leniently.
///
/// Accepts strict semver plus two common relaxations:
/// - a leading `v` prefix (`v1.2.3`)
/// - missing minor and/or patch components (`1` or `1.2`), padded with zeros
///
/// Pre-release and build metadata are preserved.
///
/// # Errors
///
/// Returns an error when the string is not a version under any of the
/// accepted forms.
///
/// # Examples
///
/// ```rust
/// use updraft::version::parse_version;
///
/// assert_eq!(parse_version("v1.2").unwrap().to_string(), "1.2.0");
/// assert_eq!(parse_version("1.1.0-beta.1").unwrap().to_string(), "1.1.0-beta.1");
/// assert!(parse_version("not-a-version").is_err());
/// ```
pub fn parse_version(input: &str) -> Result<Version> {
    let trimmed = input.trim().trim_start_matches('v');

    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    // Pad missing components before any pre-release/build suffix
    let (core, suffix) = match trimmed.find(['-', '+']) {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, ""),
    };

    let padded = match core.matches('.').count() {
        0 => format!("{core}.0.0{suffix}"),
        1 => format!("{core}.0{suffix}"),
        _ => trimmed.to_string(),
    };

    Version::parse(&padded).with_context(|| format!("Invalid version string: '{input}'"))
}
