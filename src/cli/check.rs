//! The `check` command.

use super::{CliConfig, format_size};
use crate::utils::progress::TerminalBar;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Fetch the release feed and report what would be applied.
#[derive(Args)]
pub struct CheckCommand {
    /// Plan with full releases only, ignoring delta packages
    #[arg(long)]
    ignore_deltas: bool,

    /// Emit the planned update as JSON
    #[arg(long)]
    json: bool,
}

impl CheckCommand {
    pub async fn execute(&self, config: &CliConfig) -> Result<()> {
        let manager = config.manager().await?;

        let bar = TerminalBar::percent();
        bar.set_message("Checking for updates");
        let update = manager
            .check_for_update(self.ignore_deltas, &bar.as_progress_handle())
            .await?;
        bar.finish_and_clear();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&update)?);
            return Ok(());
        }

        if update.is_up_to_date() {
            let current = update
                .currently_installed_version
                .as_ref()
                .map_or_else(|| "none".to_string(), ToString::to_string);
            println!("{} Already up to date ({current})", "✓".green());
            return Ok(());
        }

        let target = update.target_version().expect("non-empty plan has a target");
        if update.is_bootstrapping {
            println!("{} Fresh install: {target}", "→".cyan());
        } else {
            let current = update
                .currently_installed_version
                .as_ref()
                .expect("non-bootstrap plan has a current version");
            println!("{} Update available: {current} → {target}", "→".cyan());
        }

        for entry in &update.releases_to_apply {
            let kind = if entry.is_delta {
                "delta".yellow()
            } else {
                "full".blue()
            };
            println!("    {} {} ({})", entry.version, kind, format_size(entry.filesize));
        }
        println!("  Total download: {}", format_size(update.total_size()).bold());

        Ok(())
    }
}
