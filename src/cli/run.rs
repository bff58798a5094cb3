//! The `run` subcommand: the long-lived monitor loop.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{MonitorConfig, SlackConfig};
use crate::modules::ModuleRegistry;
use crate::monitor::Monitor;
use crate::notifier::SlackNotifier;

/// Start the monitor loop
#[derive(Args)]
pub struct RunCommand {
    /// Repository to monitor (overrides the config file)
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// Branch to track (overrides the config file)
    #[arg(long)]
    pub branch: Option<String>,

    /// Seconds between polls (overrides the config file)
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Run without Slack notifications (results are only logged)
    #[arg(long)]
    pub no_notify: bool,
}

impl RunCommand {
    /// Execute the run command
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let mut config = MonitorConfig::load(config_path);
        if let Some(repo) = self.repo {
            config.core.repo_path = repo;
        }
        if let Some(branch) = self.branch {
            config.core.branch = branch;
        }
        if let Some(interval) = self.poll_interval {
            config.core.poll_interval_secs = interval;
        }

        let notifier = if self.no_notify {
            None
        } else {
            let token = SlackConfig::token()
                .context("SLACK_BOT_TOKEN is not set (use --no-notify to run without Slack)")?;
            let channel = config
                .slack
                .channel_id()
                .context("No Slack channel configured (set slack.channel or SLACK_CHANNEL_ID)")?;
            Some(SlackNotifier::new(token, channel)?)
        };

        let registry = ModuleRegistry::builtin();
        let mut monitor = Monitor::new(&config, &registry, notifier)?;
        monitor.run().await
    }
}
