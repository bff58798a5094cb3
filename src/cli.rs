//! CLI interface for git-sentinel.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod check;
pub mod modules;
pub mod run;

/// git-sentinel: a repository monitor with pluggable analysis modules
#[derive(Parser)]
#[command(name = "git-sentinel")]
#[command(about = "Watches a git repository and analyzes every change", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The main command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories
#[derive(Subcommand)]
pub enum Commands {
    /// Start the monitor loop
    Run(run::RunCommand),
    /// Perform a single poll and print the results
    Check(check::CheckCommand),
    /// List available analysis modules and their configuration keys
    Modules(modules::ModulesCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config_path = self.config.as_deref();
        match self.command {
            Commands::Run(run_cmd) => run_cmd.execute(config_path).await,
            Commands::Check(check_cmd) => check_cmd.execute(config_path).await,
            Commands::Modules(modules_cmd) => modules_cmd.execute(),
        }
    }
}
