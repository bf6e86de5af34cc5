//! The `download` command.

use super::{CliConfig, format_size};
use crate::utils::ProgressHandle;
use crate::utils::progress::TerminalBar;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Plan an update and stage its packages without applying anything.
#[derive(Args)]
pub struct DownloadCommand {
    /// Plan with full releases only, ignoring delta packages
    #[arg(long)]
    ignore_deltas: bool,
}

impl DownloadCommand {
    pub async fn execute(&self, config: &CliConfig) -> Result<()> {
        let manager = config.manager().await?;

        let update = manager
            .check_for_update(self.ignore_deltas, &ProgressHandle::none())
            .await?;
        if update.is_up_to_date() {
            println!("{} Already up to date, nothing to download", "✓".green());
            return Ok(());
        }

        let bar = TerminalBar::percent();
        bar.set_message("Downloading packages");
        manager
            .download_releases(&update.releases_to_apply, &bar.as_progress_handle())
            .await?;
        bar.finish_and_clear();

        println!(
            "{} Staged {} package(s), {}",
            "✓".green(),
            update.releases_to_apply.len(),
            format_size(update.total_size())
        );
        Ok(())
    }
}
