//! Command-line interface.
//!
//! The binary exposes the pipeline's three operations plus the one-shot
//! composite:
//!
//! - `updraft check` - fetch the feed and report the planned update
//! - `updraft download` - stage and verify the planned packages
//! - `updraft apply` - install staged packages and switch the pointer
//! - `updraft update` - check, download and apply in one call
//!
//! Global flags: `--verbose`/`--quiet` for log level, `--no-progress` to
//! suppress progress bars, `--config <path>` for an explicit `updraft.toml`,
//! `--root <dir>` to override the configured install root.

mod apply;
mod check;
mod download;
mod update;

use crate::config::UpdraftConfig;
use crate::pipeline::UpdateManager;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runtime configuration derived from global CLI flags.
///
/// Kept separate from argument parsing so tests can inject a configuration
/// without touching `std::env::args`.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log level filter, `None` for quiet mode.
    pub log_level: Option<String>,
    /// Disable progress bars.
    pub no_progress: bool,
    /// Explicit configuration file path.
    pub config_path: Option<PathBuf>,
    /// Install root override.
    pub root_override: Option<PathBuf>,
}

impl CliConfig {
    /// Apply the configuration to the process environment and initialize
    /// logging. Called once per invocation before dispatch.
    pub fn apply(&self) {
        if self.no_progress {
            // SAFETY: called once at startup before worker threads exist.
            unsafe { std::env::set_var("UPDRAFT_NO_PROGRESS", "1") };
        }

        if let Some(level) = &self.log_level {
            use tracing_subscriber::EnvFilter;
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("updraft={level}")));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    /// Load the updater configuration this invocation runs with.
    pub async fn load_updater_config(&self) -> Result<UpdraftConfig> {
        let mut config = UpdraftConfig::load_with_optional(self.config_path.clone()).await?;
        if let Some(root) = &self.root_override {
            config.root_dir.clone_from(root);
        }
        Ok(config)
    }

    /// Build the update manager for this invocation.
    pub async fn manager(&self) -> Result<UpdateManager> {
        let config = self.load_updater_config().await?;
        UpdateManager::new(config)
    }
}

/// Delta-aware self-update pipeline for desktop applications.
#[derive(Parser)]
#[command(name = "updraft", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    /// Path to the updraft.toml configuration file
    #[arg(short, long, global = true, env = "UPDRAFT_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override the configured install root
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the release feed and report the planned update
    Check(check::CheckCommand),
    /// Download and verify the planned release packages
    Download(download::DownloadCommand),
    /// Install staged packages and switch the current version
    Apply(apply::ApplyCommand),
    /// Check, download and apply in one call
    Update(update::UpdateCommand),
}

impl Cli {
    /// Translate global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            config_path: self.config.clone(),
            root_override: self.root.clone(),
        }
    }

    /// Parse-and-run entry point used by `main`.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.apply();

        match self.command {
            Commands::Check(cmd) => cmd.execute(&config).await,
            Commands::Download(cmd) => cmd.execute(&config).await,
            Commands::Apply(cmd) => cmd.execute(&config).await,
            Commands::Update(cmd) => cmd.execute(&config).await,
        }
    }
}

/// Human-readable byte count for summaries.
pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
