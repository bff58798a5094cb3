//! The `check` subcommand: one poll, results on stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::config::MonitorConfig;
use crate::modules::ModuleRegistry;
use crate::monitor::Monitor;

/// Perform a single poll and print the results
#[derive(Args)]
pub struct CheckCommand {
    /// Repository to check (overrides the config file)
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// Branch to track (overrides the config file)
    #[arg(long)]
    pub branch: Option<String>,
}

impl CheckCommand {
    /// Execute the check command
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let mut config = MonitorConfig::load(config_path);
        if let Some(repo) = self.repo {
            config.core.repo_path = repo;
        }
        if let Some(branch) = self.branch {
            config.core.branch = branch;
        }

        let registry = ModuleRegistry::builtin();
        let mut monitor = Monitor::new(&config, &registry, None)?;

        match monitor.poll_once().await? {
            Some(report) => {
                let json = serde_json::to_string_pretty(&report)
                    .context("Failed to serialize poll report")?;
                println!("{json}");
            }
            None => println!("No changes detected."),
        }

        Ok(())
    }
}
