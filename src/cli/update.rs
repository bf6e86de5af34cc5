//! The `update` command.

use super::CliConfig;
use crate::pipeline::update_app;
use crate::utils::progress::TerminalBar;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Check, download and apply in one call.
#[derive(Args)]
pub struct UpdateCommand {}

impl UpdateCommand {
    pub async fn execute(&self, config: &CliConfig) -> Result<()> {
        let manager = config.manager().await?;

        let bar = TerminalBar::spinner();
        bar.set_message("Updating");
        let applied = update_app(&manager).await?;
        bar.finish_and_clear();

        match applied {
            Some(entry) => {
                println!("{} Updated to {}", "✓".green(), entry.version);
            }
            None => {
                println!("{} Already up to date", "✓".green());
            }
        }
        Ok(())
    }
}
