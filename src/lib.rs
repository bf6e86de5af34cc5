//! Updraft - delta-aware self-update pipeline for desktop applications
//!
//! Updraft keeps a desktop application up to date against a remote release
//! feed without a centralized deployment server. Given the currently
//! installed version and a line-oriented `RELEASES` manifest, it computes the
//! minimal set of packages to fetch (preferring incremental delta packages
//! over full packages), downloads and hash-verifies them into a staging area,
//! and installs them into a fresh versioned directory before atomically
//! switching the "current" pointer.
//!
//! # Architecture Overview
//!
//! The pipeline is three composable stages, wrapped by a per-installation
//! update lock:
//!
//! ```text
//! check_for_update -> download_releases -> apply_releases
//!        |                   |                  |
//!     planner            downloader          applier
//!        \__________ UpdateManager __________/
//! ```
//!
//! - The **manifest model** ([`manifest`]) parses the feed into immutable
//!   [`manifest::ReleaseEntry`] records with semver-ordered versions.
//! - The **planner** ([`planner`]) is a pure function from manifest + current
//!   version to an [`planner::UpdateInfo`]: either an unbroken delta chain or
//!   the single latest full release.
//! - The **downloader** ([`download`]) stages artifacts with incremental
//!   SHA-256 verification, byte-weighted progress, and idempotent resume.
//! - The **applier** ([`apply`]) materializes the new version directory and
//!   performs the pointer swap as its last step, so an interrupted install
//!   never leaves "current" pointing at a half-written tree.
//! - The **update lock** ([`lock`]) guarantees a single updater instance per
//!   installation, with a bounded wait and guaranteed release on drop.
//!
//! External collaborators (HTTP transport, archive extraction, binary delta
//! patching, shortcut writing) sit behind traits with default implementations
//! so the core pipeline stays testable against a local feed.
//!
//! # Core Modules
//!
//! - [`core`] - Error taxonomy and user-facing error presentation
//! - [`manifest`] - `RELEASES` feed parsing and the release entry model
//! - [`version`] - Version parsing and ordering helpers
//! - [`planner`] - Delta-chain/full-release selection
//! - [`download`] - Staged, verified, resumable artifact downloads
//! - [`apply`] - Extraction, delta patching, and the atomic pointer swap
//! - [`layout`] - The versioned install directory owned across runs
//! - [`lock`] - Per-installation mutual exclusion
//! - [`pipeline`] - The public `UpdateManager` operations
//!
//! # Supporting Modules
//!
//! - [`cli`] - `updraft check|download|apply|update` commands
//! - [`config`] - `updraft.toml` configuration
//! - [`utils`] - Filesystem helpers and progress reporting
//!
//! # Example
//!
//! ```rust,no_run
//! use updraft::config::UpdraftConfig;
//! use updraft::pipeline::{UpdateManager, update_app};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdraftConfig::new("acme-notes", "https://releases.example.com/acme", "/opt/acme");
//! let manager = UpdateManager::new(config)?;
//!
//! match update_app(&manager).await? {
//!     Some(release) => println!("updated to {}", release.version),
//!     None => println!("already up to date"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod cli;
pub mod config;
pub mod core;
pub mod download;
pub mod layout;
pub mod lock;
pub mod manifest;
pub mod pipeline;
pub mod planner;
pub mod utils;
pub mod version;
