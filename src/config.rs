//! Monitor configuration.
//!
//! Loaded from a YAML or JSON file chosen by extension, with a synthesized
//! default when the file is missing or unreadable. Per-module tables live
//! under `modules:` and are resolved against each module's schema at
//! construction time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::modules::ModuleConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "GIT_SENTINEL_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Core monitor settings.
    #[serde(default)]
    pub core: CoreConfig,

    /// Slack notification settings.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Per-module configuration tables, keyed by module identifier.
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleConfig>,
}

/// Core monitor settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoreConfig {
    /// Repository to monitor.
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,

    /// Branch to track.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Seconds between polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Extra glob patterns the filesystem watcher ignores, matched against
    /// repository-relative paths.
    #[serde(default)]
    pub watch_ignore: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            branch: default_branch(),
            poll_interval_secs: default_poll_interval(),
            watch_ignore: Vec::new(),
        }
    }
}

/// Slack settings. The bot token is only ever read from the environment so
/// it never lands in a config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SlackConfig {
    /// Channel id to post to. Falls back to `SLACK_CHANNEL_ID`.
    #[serde(default)]
    pub channel: Option<String>,
}

impl SlackConfig {
    /// Resolves the channel id from config or environment.
    pub fn channel_id(&self) -> Option<String> {
        self.channel
            .clone()
            .or_else(|| std::env::var("SLACK_CHANNEL_ID").ok())
    }

    /// Reads the bot token from the environment.
    pub fn token() -> Option<String> {
        std::env::var("SLACK_BOT_TOKEN").ok()
    }
}

fn default_repo_path() -> PathBuf {
    std::env::var("REPO_PATH").map_or_else(|_| PathBuf::from("."), PathBuf::from)
}

fn default_branch() -> String {
    std::env::var("REPO_BRANCH").unwrap_or_else(|_| "main".to_string())
}

fn default_poll_interval() -> u64 {
    300
}

impl MonitorConfig {
    /// Loads configuration from `explicit_path`, the `GIT_SENTINEL_CONFIG`
    /// environment variable, or the default location, in that order.
    ///
    /// A missing or unreadable file is not fatal: the monitor starts with
    /// defaults and a logged warning.
    pub fn load(explicit_path: Option<&Path>) -> Self {
        let path = explicit_path.map(Path::to_path_buf).or_else(|| {
            std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
        });

        let path = match path {
            Some(path) => path,
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    info!("No config file, using defaults");
                    return Self::default();
                }
            },
        };

        match Self::load_from_path(&path) {
            Ok(config) => {
                info!("Configuration loaded from {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}, using defaults: {e:#}",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Parses a configuration file, picking the format by extension.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            other => anyhow::bail!("Unsupported config format: .{other}"),
        }
    }

    /// Default config location under the home directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".git-sentinel").join("config.yaml"))
    }

    /// Configuration table for one module, empty when none was given.
    pub fn module_config(&self, name: &str) -> ModuleConfig {
        self.modules.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn yaml_config_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            r"
core:
  repo_path: /srv/repo
  branch: develop
  poll_interval_secs: 60
slack:
  channel: C99999
modules:
  code_review:
    severity_threshold: high
",
        )
        .unwrap();

        let config = MonitorConfig::load_from_path(&path).unwrap();
        assert_eq!(config.core.repo_path, PathBuf::from("/srv/repo"));
        assert_eq!(config.core.branch, "develop");
        assert_eq!(config.core.poll_interval_secs, 60);
        assert_eq!(config.slack.channel.as_deref(), Some("C99999"));
        assert_eq!(
            config.module_config("code_review").get_str("severity_threshold", ""),
            "high"
        );
    }

    #[test]
    fn json_config_parses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"core": {"branch": "release"}}"#).unwrap();

        let config = MonitorConfig::load_from_path(&path).unwrap();
        assert_eq!(config.core.branch, "release");
        assert_eq!(config.core.poll_interval_secs, 300);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "branch = 'main'").unwrap();

        assert!(MonitorConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "core: [not, a, mapping]").unwrap();

        let config = MonitorConfig::load(Some(&path));
        assert_eq!(config.core.poll_interval_secs, 300);
    }

    #[test]
    fn unknown_module_table_is_empty() {
        let config = MonitorConfig::default();
        assert_eq!(config.module_config("nope"), ModuleConfig::new());
    }
}
