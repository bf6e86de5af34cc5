//! Update planning: deciding which releases to apply.
//!
//! Planning is a pure function over the parsed manifest and the currently
//! installed version. It prefers a contiguous delta chain from the current
//! version to the latest full release, and falls back to the single latest
//! full release whenever the chain is broken, missing, or disabled by the
//! caller. The fallback is a normal outcome, not an error; the only planning
//! failure is a feed with no full release for the application at all.
//!
//! ## Delta chain policy
//!
//! The feed format carries one version per entry, so a delta's base version
//! is defined positionally: it is the next-lower distinct version present in
//! the manifest. A chain from `current` to `latest` is therefore complete
//! exactly when every distinct manifest version `v` with
//! `current < v <= latest` has a delta entry. Whenever a complete chain
//! exists it is preferred unconditionally - total download size is never
//! weighed against the full package.

use anyhow::Result;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::core::UpdraftError;
use crate::manifest::ReleaseEntry;

/// The result of planning: what to download and apply, in order.
///
/// Immutable once produced. `releases_to_apply` is either empty (already up
/// to date), a single full-release entry, or a contiguous delta chain ordered
/// oldest-to-apply first whose first link's base is
/// `currently_installed_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    /// Version currently installed, or `None` on a fresh install.
    pub currently_installed_version: Option<Version>,
    /// Ordered releases to download and apply.
    pub releases_to_apply: Vec<ReleaseEntry>,
    /// True when there is no prior installed version (first install).
    pub is_bootstrapping: bool,
}

impl UpdateInfo {
    /// The version this plan ends at, or `None` when already up to date.
    #[must_use]
    pub fn target_version(&self) -> Option<&Version> {
        self.releases_to_apply.last().map(|entry| &entry.version)
    }

    /// True when there is nothing to apply.
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.releases_to_apply.is_empty()
    }

    /// Total declared download size of the plan, in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.releases_to_apply.iter().map(|entry| entry.filesize).sum()
    }
}

/// Compute the ordered set of releases to apply.
///
/// Entries for other package ids are ignored. See the module docs for the
/// delta chain policy.
///
/// # Errors
///
/// Returns [`UpdraftError::NoReleasesFound`] when the manifest has no full
/// entry for `package_id`.
pub fn plan(
    entries: &[ReleaseEntry],
    package_id: &str,
    current: Option<&Version>,
    allow_delta: bool,
) -> Result<UpdateInfo> {
    let own: Vec<&ReleaseEntry> =
        entries.iter().filter(|entry| entry.package_name == package_id).collect();

    let latest_full = own
        .iter()
        .filter(|entry| !entry.is_delta)
        .max_by(|a, b| a.version.cmp(&b.version))
        .copied()
        .ok_or_else(|| UpdraftError::NoReleasesFound {
            package: package_id.to_string(),
        })?;

    let Some(current) = current else {
        // Fresh install: the latest full release bootstraps the application
        debug!(version = %latest_full.version, "bootstrapping from latest full release");
        return Ok(UpdateInfo {
            currently_installed_version: None,
            releases_to_apply: vec![latest_full.clone()],
            is_bootstrapping: true,
        });
    };

    if latest_full.version <= *current {
        debug!(%current, latest = %latest_full.version, "already up to date");
        return Ok(UpdateInfo {
            currently_installed_version: Some(current.clone()),
            releases_to_apply: Vec::new(),
            is_bootstrapping: false,
        });
    }

    if allow_delta
        && let Some(chain) = delta_chain(&own, current, &latest_full.version)
    {
        debug!(links = chain.len(), "selected delta chain");
        return Ok(UpdateInfo {
            currently_installed_version: Some(current.clone()),
            releases_to_apply: chain.into_iter().cloned().collect(),
            is_bootstrapping: false,
        });
    }

    debug!(version = %latest_full.version, "falling back to latest full release");
    Ok(UpdateInfo {
        currently_installed_version: Some(current.clone()),
        releases_to_apply: vec![latest_full.clone()],
        is_bootstrapping: false,
    })
}

/// Build the delta chain from `current` to `latest`, if it is unbroken.
///
/// Every distinct manifest version in `(current, latest]` must have a delta
/// entry; a single missing link breaks the chain and returns `None`.
fn delta_chain<'a>(
    own: &[&'a ReleaseEntry],
    current: &Version,
    latest: &Version,
) -> Option<Vec<&'a ReleaseEntry>> {
    let hops: BTreeSet<&Version> = own
        .iter()
        .map(|entry| &entry.version)
        .filter(|version| *version > current && *version <= latest)
        .collect();

    if hops.is_empty() {
        return None;
    }

    let mut chain = Vec::with_capacity(hops.len());
    for version in hops {
        let delta =
            own.iter().find(|entry| entry.is_delta && entry.version == *version).copied();
        match delta {
            Some(delta) => chain.push(delta),
            None => {
                debug!(missing = %version, "delta chain broken");
                return None;
            }
        }
    }

    Some(chain)
}
