//! The `apply` command.

use super::CliConfig;
use crate::utils::ProgressHandle;
use crate::utils::progress::TerminalBar;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Install previously staged packages and switch the current version.
#[derive(Args)]
pub struct ApplyCommand {
    /// Plan with full releases only, ignoring delta packages
    #[arg(long)]
    ignore_deltas: bool,
}

impl ApplyCommand {
    pub async fn execute(&self, config: &CliConfig) -> Result<()> {
        let manager = config.manager().await?;

        let update = manager
            .check_for_update(self.ignore_deltas, &ProgressHandle::none())
            .await?;
        if update.is_up_to_date() {
            println!("{} Already up to date", "✓".green());
            return Ok(());
        }

        let bar = TerminalBar::percent();
        bar.set_message("Applying update");
        let executables = manager
            .apply_releases(&update, &bar.as_progress_handle())
            .await?;
        bar.finish_and_clear();

        let target = update.target_version().expect("non-empty plan has a target");
        println!("{} Now on version {target}", "✓".green());

        if !executables.is_empty() {
            println!("  Entry points:");
            for path in &executables {
                println!("    {}", path.display());
            }
        }
        Ok(())
    }
}
