//! Local edit tracking between polls.
//!
//! The filesystem watcher thread feeds raw notifications into a
//! [`LocalEditTracker`], which debounces them, filters out noise, and
//! appends accepted edits to a shared pending buffer. The poll cycle drains
//! that buffer through a [`PendingEdits`] handle: the drain is an atomic
//! copy-then-clear snapshot, so edits arriving mid-drain land in the next
//! batch instead of being lost or double-counted.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};

use crate::event::{EditKind, LocalEditRecord};
use crate::git::{content_snapshot, status_description, GitRepository};

/// Window within which repeated notifications for the same path collapse to
/// the first one.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Shared handle to the pending-edit buffer.
///
/// The buffer is the only concurrently shared mutable state in the process:
/// the watcher thread appends, the poll cycle drains.
#[derive(Clone, Default)]
pub struct PendingEdits {
    inner: Arc<Mutex<Vec<LocalEditRecord>>>,
}

impl PendingEdits {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one accepted edit.
    pub fn push(&self, record: LocalEditRecord) {
        if let Ok(mut buf) = self.inner.lock() {
            buf.push(record);
        }
    }

    /// Takes an atomic snapshot of the buffer and empties it.
    ///
    /// Entries in the returned batch can never reappear in a later drain,
    /// and entries pushed after the snapshot is taken are preserved for the
    /// next one.
    pub fn drain(&self) -> Vec<LocalEditRecord> {
        match self.inner.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Number of buffered edits.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accumulates debounced local edits between polls.
///
/// Owned by the watcher thread; only the [`PendingEdits`] handle crosses
/// thread boundaries.
pub struct LocalEditTracker {
    repo: GitRepository,
    repo_path: PathBuf,
    pending: PendingEdits,
    last_seen: HashMap<PathBuf, Instant>,
    ignore: GlobSet,
}

impl LocalEditTracker {
    /// Opens a tracker over the repository at `repo_path`.
    ///
    /// `ignore_globs` are matched against repository-relative paths in
    /// addition to the built-in version-control metadata filter.
    pub fn new(
        repo_path: &Path,
        branch: &str,
        pending: PendingEdits,
        ignore_globs: &[String],
    ) -> Result<Self> {
        let repo = GitRepository::open_at(repo_path, branch)?;

        let mut builder = GlobSetBuilder::new();
        for pattern in ignore_globs {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!("Ignoring invalid watch-ignore pattern '{pattern}': {e}"),
            }
        }
        let ignore = builder.build()?;

        Ok(Self {
            repo_path: repo.workdir().to_path_buf(),
            repo,
            pending,
            last_seen: HashMap::new(),
            ignore,
        })
    }

    /// Handles one raw filesystem notification.
    pub fn on_file_event(&mut self, path: &Path, kind: EditKind) {
        self.on_file_event_at(path, kind, Instant::now());
    }

    /// Debounce-aware entry point with an explicit clock, so the window
    /// logic is testable without sleeping.
    fn on_file_event_at(&mut self, path: &Path, kind: EditKind, now: Instant) {
        let Some(rel_path) = self.accept_path(path) else {
            return;
        };

        // Keep the first event in the window, drop the save-storm behind it.
        if let Some(seen) = self.last_seen.get(&rel_path) {
            if now.duration_since(*seen) < DEBOUNCE_WINDOW {
                debug!("Debounced {}", rel_path.display());
                return;
            }
        }
        self.last_seen.insert(rel_path.clone(), now);

        let status = self.repo.file_status(&rel_path);
        if status == "??" || status.is_empty() {
            debug!("Ignoring untracked file {}", rel_path.display());
            return;
        }

        let content = if kind == EditKind::Deleted {
            String::new()
        } else {
            content_snapshot(&self.repo_path.join(&rel_path)).unwrap_or_default()
        };

        let Some(path_str) = rel_path.to_str() else {
            return;
        };

        debug!("Local edit recorded: {} ({kind}, {status})", rel_path.display());
        self.pending.push(LocalEditRecord {
            path: path_str.to_string(),
            kind,
            date: Utc::now(),
            description: status_description(&status),
            status,
            content,
        });
    }

    /// Filters a notification path down to an acceptable repository-relative
    /// path, or `None` when the notification should be discarded.
    fn accept_path(&self, path: &Path) -> Option<PathBuf> {
        if path.is_dir() {
            return None;
        }

        let rel_path = path.strip_prefix(&self.repo_path).ok()?.to_path_buf();

        if rel_path
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name == ".git"))
        {
            return None;
        }

        if self.ignore.is_match(&rel_path) {
            debug!("Ignored by watch pattern: {}", rel_path.display());
            return None;
        }

        Some(rel_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo(dir: &TempDir) -> Repository {
        let repo = Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        repo
    }

    fn commit_file(repo: &Repository, dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let sig = git2::Signature::now("Test User", "test@example.com").unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parent = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "add file", &tree, &parents)
            .unwrap();
    }

    fn tracker(dir: &TempDir, pending: PendingEdits) -> LocalEditTracker {
        LocalEditTracker::new(dir.path(), "master", pending, &[]).unwrap()
    }

    #[test]
    fn tracked_edit_is_buffered_with_status() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(&dir);
        commit_file(&repo, &dir, "tracked.txt", "v1\n");
        fs::write(dir.path().join("tracked.txt"), "v2\n").unwrap();

        let pending = PendingEdits::new();
        let mut tracker = tracker(&dir, pending.clone());
        tracker.on_file_event(&dir.path().join("tracked.txt"), EditKind::Modified);

        let batch = pending.drain();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].path, "tracked.txt");
        assert_eq!(batch[0].status, "M");
        assert_eq!(batch[0].content, "v2\n");
    }

    #[test]
    fn untracked_file_is_discarded() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(&dir);
        commit_file(&repo, &dir, "tracked.txt", "v1\n");
        fs::write(dir.path().join("scratch.txt"), "notes\n").unwrap();

        let pending = PendingEdits::new();
        let mut tracker = tracker(&dir, pending.clone());
        tracker.on_file_event(&dir.path().join("scratch.txt"), EditKind::Created);

        assert!(pending.is_empty());
    }

    #[test]
    fn events_inside_git_dir_are_discarded() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(&dir);
        commit_file(&repo, &dir, "tracked.txt", "v1\n");

        let pending = PendingEdits::new();
        let mut tracker = tracker(&dir, pending.clone());
        tracker.on_file_event(&dir.path().join(".git").join("index"), EditKind::Modified);
        tracker.on_file_event(Path::new("/somewhere/else.txt"), EditKind::Modified);

        assert!(pending.is_empty());
    }

    #[test]
    fn repeated_events_within_window_collapse_to_first() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(&dir);
        commit_file(&repo, &dir, "tracked.txt", "v1\n");
        fs::write(dir.path().join("tracked.txt"), "v2\n").unwrap();

        let pending = PendingEdits::new();
        let mut tracker = tracker(&dir, pending.clone());
        let path = dir.path().join("tracked.txt");

        let t0 = Instant::now();
        tracker.on_file_event_at(&path, EditKind::Modified, t0);
        tracker.on_file_event_at(&path, EditKind::Modified, t0 + Duration::from_millis(300));
        assert_eq!(pending.len(), 1);

        // Past the window the same path is accepted again.
        tracker.on_file_event_at(&path, EditKind::Modified, t0 + Duration::from_millis(1500));
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn drain_is_exactly_once() {
        let pending = PendingEdits::new();
        let record = LocalEditRecord {
            path: "a.txt".to_string(),
            kind: EditKind::Modified,
            date: Utc::now(),
            status: "M".to_string(),
            description: "Modified".to_string(),
            content: String::new(),
        };

        pending.push(record.clone());
        pending.push(record.clone());

        let first = pending.drain();
        assert_eq!(first.len(), 2);
        assert!(pending.drain().is_empty());

        // An edit arriving after the snapshot shows up in the next batch.
        pending.push(record);
        assert_eq!(pending.drain().len(), 1);
    }

    #[test]
    fn ignore_globs_filter_events() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(&dir);
        commit_file(&repo, &dir, "notes.log", "v1\n");
        fs::write(dir.path().join("notes.log"), "v2\n").unwrap();

        let pending = PendingEdits::new();
        let mut tracker =
            LocalEditTracker::new(dir.path(), "master", pending.clone(), &["*.log".to_string()])
                .unwrap();
        tracker.on_file_event(&dir.path().join("notes.log"), EditKind::Modified);

        assert!(pending.is_empty());
    }
}
