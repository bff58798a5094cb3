//! Persistence for the last-known commit marker.
//!
//! Only the marker survives restarts; losing it is safe (the worst case is
//! re-reporting commits that were already seen) and must never crash the
//! monitor, so every operation here degrades to a logged warning.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// On-disk marker format.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedMarker {
    branch: String,
    last_commit: String,
}

/// Stores the last-known commit hash for one branch in a small JSON file.
///
/// The default location is inside the repository's `.git` directory so the
/// file never shows up in the working tree or the filesystem watcher.
pub struct MarkerStore {
    path: PathBuf,
    branch: String,
}

impl MarkerStore {
    /// Creates a store at an explicit path.
    pub fn new(path: PathBuf, branch: &str) -> Self {
        Self {
            path,
            branch: branch.to_string(),
        }
    }

    /// Creates a store at the default location under `.git`.
    pub fn in_git_dir(workdir: &Path, branch: &str) -> Self {
        Self::new(workdir.join(".git").join("sentinel-marker.json"), branch)
    }

    /// Loads the persisted marker, if one exists for the tracked branch.
    pub fn load(&self) -> Option<String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return None,
        };

        let marker: PersistedMarker = match serde_json::from_str(&content) {
            Ok(marker) => marker,
            Err(e) => {
                warn!("Ignoring corrupt marker file {}: {e}", self.path.display());
                return None;
            }
        };

        if marker.branch != self.branch {
            debug!(
                "Marker file tracks branch '{}', not '{}'; ignoring",
                marker.branch, self.branch
            );
            return None;
        }

        Some(marker.last_commit)
    }

    /// Persists the marker. Failures are logged and swallowed.
    pub fn save(&self, last_commit: &str) {
        let marker = PersistedMarker {
            branch: self.branch.clone(),
            last_commit: last_commit.to_string(),
        };

        let json = match serde_json::to_string_pretty(&marker) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize marker: {e}");
                return;
            }
        };

        if let Err(e) = fs::write(&self.path, json) {
            warn!("Failed to persist marker to {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn marker_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = MarkerStore::new(dir.path().join("marker.json"), "main");

        assert_eq!(store.load(), None);
        store.save("abc123");
        assert_eq!(store.load(), Some("abc123".to_string()));
    }

    #[test]
    fn marker_for_other_branch_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("marker.json");

        MarkerStore::new(path.clone(), "main").save("abc123");
        assert_eq!(MarkerStore::new(path, "develop").load(), None);
    }

    #[test]
    fn corrupt_marker_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("marker.json");
        std::fs::write(&path, "not json").unwrap();

        assert_eq!(MarkerStore::new(path, "main").load(), None);
    }
}
