//! Updater configuration.
//!
//! An [`UpdraftConfig`] names the installation the pipeline manages: the
//! package id the feed is filtered by, the feed URL, and the install root.
//! Configuration lives in an `updraft.toml` file; the default location is the
//! platform config directory (`~/.config/updraft/updraft.toml` on Unix,
//! `%LOCALAPPDATA%\updraft\updraft.toml` on Windows), overridable with the
//! `UPDRAFT_CONFIG_PATH` environment variable or the CLI `--config` flag.
//!
//! # File Format
//!
//! ```toml
//! package_id = "acme-notes"
//! feed_url = "https://releases.example.com/acme"
//! root_dir = "/opt/acme-notes"
//!
//! # Optional tuning
//! allow_delta = true
//! lock_timeout_secs = 30
//! installation_id = "acme-notes"
//! ```

use crate::core::UpdraftError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::fs;

/// Default bounded wait for the update lock, in seconds.
const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 30;

/// Package ids share the manifest filename's id grammar.
static PACKAGE_ID_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]*$").expect("valid regex"));

/// Configuration for one managed installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdraftConfig {
    /// Package id the feed's entries are matched against.
    pub package_id: String,
    /// Base URL of the release feed. `http(s)://` URLs use the HTTP
    /// transport; anything else is treated as a local directory.
    pub feed_url: String,
    /// Root installation directory holding the versioned layout.
    pub root_dir: PathBuf,
    /// Whether delta chains may be planned at all. The per-call
    /// `ignore_delta_updates` flag can still disable deltas for one check.
    #[serde(default = "default_allow_delta")]
    pub allow_delta: bool,
    /// Bounded wait for the update lock before giving up.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,
    /// Lock scope. Defaults to the package id; set explicitly when several
    /// feeds update the same installation.
    #[serde(default)]
    pub installation_id: Option<String>,
}

const fn default_allow_delta() -> bool {
    true
}

const fn default_lock_timeout() -> u64 {
    DEFAULT_LOCK_TIMEOUT_SECS
}

impl UpdraftConfig {
    /// Create a configuration with default tuning.
    pub fn new(
        package_id: impl Into<String>,
        feed_url: impl Into<String>,
        root_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            package_id: package_id.into(),
            feed_url: feed_url.into(),
            root_dir: root_dir.into(),
            allow_delta: true,
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
            installation_id: None,
        }
    }

    /// Load configuration from an optional explicit path.
    ///
    /// Falls back to `UPDRAFT_CONFIG_PATH`, then the platform default
    /// location. A missing explicit path is an error; a missing default path
    /// is too, since there is no usable zero-value configuration.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => match std::env::var("UPDRAFT_CONFIG_PATH") {
                Ok(env_path) => PathBuf::from(env_path),
                Err(_) => Self::default_path()?,
            },
        };
        Self::load_from(&path).await
    }

    /// Load configuration from a specific file path.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific file path, creating parents.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Platform default location of `updraft.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine config directory"))?
        };

        Ok(config_dir.join("updraft").join("updraft.toml"))
    }

    /// Check the configuration is internally usable.
    pub fn validate(&self) -> Result<()> {
        if !PACKAGE_ID_RE.is_match(&self.package_id) {
            return Err(UpdraftError::ConfigError {
                message: format!(
                    "invalid package id '{}': must start with a letter and contain only letters, digits, '.', '_' or '-'",
                    self.package_id
                ),
            }
            .into());
        }
        if self.feed_url.trim().is_empty() {
            return Err(UpdraftError::ConfigError {
                message: "feed_url must not be empty".to_string(),
            }
            .into());
        }
        if self.root_dir.as_os_str().is_empty() {
            return Err(UpdraftError::ConfigError {
                message: "root_dir must not be empty".to_string(),
            }
            .into());
        }
        if self.lock_timeout_secs == 0 {
            return Err(UpdraftError::ConfigError {
                message: "lock_timeout_secs must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// The lock scope this installation uses.
    #[must_use]
    pub fn installation_id(&self) -> &str {
        self.installation_id.as_deref().unwrap_or(&self.package_id)
    }

    /// The bounded lock wait as a [`Duration`].
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}
