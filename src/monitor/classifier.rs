//! Change classification.
//!
//! On every poll tick the classifier computes the delta since the last
//! check across three categories: new commits on the tracked branch,
//! staged-but-uncommitted files, and local edits drained from the tracker
//! buffer. The last-known commit marker is the low-water mark for the
//! commit range; it only ever advances forward, and only after the
//! intervening commits have been fully enumerated.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::event::{normalize, ChangeSet, RawChange};
use crate::git::GitRepository;
use crate::monitor::state::MarkerStore;
use crate::monitor::tracker::PendingEdits;

/// Errors that abort a whole poll cycle.
///
/// Any of these leaves the stored marker untouched and the pending-edit
/// buffer undrained; the cycle is retried on the next scheduled tick.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Synchronization with the remote failed (network, auth).
    #[error("Failed to synchronize with remote: {0}")]
    Sync(#[source] anyhow::Error),

    /// The repository itself could not be read.
    #[error("Repository error: {0}")]
    Repository(#[source] anyhow::Error),

    /// Commit-range enumeration failed mid-list.
    #[error("Failed to enumerate new commits: {0}")]
    Enumeration(#[source] anyhow::Error),
}

/// Computes the per-poll delta of commits, staged files, and local edits.
pub struct ChangeClassifier {
    repo: GitRepository,
    pending: PendingEdits,
    marker_store: Option<MarkerStore>,
    last_commit: String,
}

impl ChangeClassifier {
    /// Creates a classifier over an opened repository.
    ///
    /// The last-known marker is restored from `marker_store` when present;
    /// otherwise the current branch tip becomes the starting point, so
    /// history that predates the monitor is never reported.
    pub fn new(
        repo: GitRepository,
        pending: PendingEdits,
        marker_store: Option<MarkerStore>,
    ) -> anyhow::Result<Self> {
        let tip = repo.branch_tip()?;
        let last_commit = marker_store
            .as_ref()
            .and_then(MarkerStore::load)
            .unwrap_or_else(|| tip.clone());

        info!(
            "Monitoring branch '{}' from commit {}",
            repo.branch(),
            &last_commit[..last_commit.len().min(crate::git::SHORT_HASH_LEN)]
        );

        Ok(Self {
            repo,
            pending,
            marker_store,
            last_commit,
        })
    }

    /// The current last-known commit marker.
    pub fn last_commit(&self) -> &str {
        &self.last_commit
    }

    /// Handle to the shared pending-edit buffer.
    pub fn pending(&self) -> &PendingEdits {
        &self.pending
    }

    /// Runs one classification cycle.
    ///
    /// Returns `Ok(Some(changes))` when any category has entries,
    /// `Ok(None)` as the explicit no-change signal, and `Err` when the
    /// cycle was aborted. An aborted cycle never advances the marker and
    /// never drains the edit buffer.
    pub fn check_for_changes(&mut self) -> Result<Option<ChangeSet>, MonitorError> {
        self.repo.sync_with_remote().map_err(MonitorError::Sync)?;

        let tip = self.repo.branch_tip().map_err(MonitorError::Repository)?;
        let repo_path = self.repo.workdir().to_path_buf();

        // New commits between the marker and the branch tip, oldest first.
        let mut commits = Vec::new();
        if tip != self.last_commit {
            let records = self
                .repo
                .commits_between(&self.last_commit, &tip)
                .map_err(MonitorError::Enumeration)?;

            info!("Detected {} new commits on '{}'", records.len(), self.repo.branch());
            commits = records
                .into_iter()
                .map(|record| normalize(RawChange::Commit(record), &repo_path))
                .collect();

            // Enumeration succeeded for the whole range; only now does the
            // marker advance, and only to the new tip.
            self.last_commit = tip;
            if let Some(store) = &self.marker_store {
                store.save(&self.last_commit);
            }
        }

        // Staged delta, recomputed in full every poll. A failure here
        // degrades to an empty category instead of aborting the cycle.
        let staged_records = match self.repo.staged_files() {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to compute staged delta: {e:#}");
                Vec::new()
            }
        };
        if !staged_records.is_empty() {
            info!("Detected {} staged files", staged_records.len());
        }

        // Local edits: atomic drain, then drop paths already reported by
        // the staged category so one piece of uncommitted work is reported
        // once per poll.
        let staged_paths: HashSet<String> =
            staged_records.iter().map(|r| r.path.clone()).collect();

        let local_edits: Vec<_> = self
            .pending
            .drain()
            .into_iter()
            .filter(|edit| {
                if staged_paths.contains(&edit.path) {
                    debug!("Suppressing local edit for staged path {}", edit.path);
                    false
                } else {
                    true
                }
            })
            .map(|record| normalize(RawChange::LocalEdit(record), &repo_path))
            .collect();

        let staged = staged_records
            .into_iter()
            .map(|record| normalize(RawChange::Staged(record), &repo_path))
            .collect();

        let changes = ChangeSet {
            commits,
            staged,
            local_edits,
        };

        if changes.is_empty() {
            debug!("No changes detected this cycle");
            Ok(None)
        } else {
            Ok(Some(changes))
        }
    }
}
