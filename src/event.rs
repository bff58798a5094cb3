//! Normalized change events.
//!
//! The classifier produces three raw change categories (commits, staged
//! files, local edits). [`normalize`] shapes each of them into the single
//! tagged [`ChangeEvent`] representation analysis modules consume, enriched
//! with the repository path modules need to read files from disk.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::git::{CommitRecord, StagedRecord};

/// Kind of a local filesystem edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    /// File was created.
    Created,
    /// File contents changed.
    Modified,
    /// File was removed.
    Deleted,
}

impl std::fmt::Display for EditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EditKind::Created => "created",
            EditKind::Modified => "modified",
            EditKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// A local filesystem edit captured by the edit tracker between polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEditRecord {
    /// Path relative to the repository root.
    pub path: String,
    /// What happened to the file.
    pub kind: EditKind,
    /// Capture time.
    pub date: DateTime<Utc>,
    /// Porcelain status at capture time.
    pub status: String,
    /// Human-readable description of the status code.
    pub description: String,
    /// Truncated content snapshot, empty for binary and deleted files.
    pub content: String,
}

/// A raw change as produced by the classifier, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawChange {
    /// A commit discovered between the marker and the branch tip.
    Commit(CommitRecord),
    /// A file staged in the index.
    Staged(StagedRecord),
    /// A local working-tree edit.
    LocalEdit(LocalEditRecord),
    /// Anything the producer could not classify.
    Opaque {
        /// Path associated with the change, when one is known.
        path: Option<PathBuf>,
    },
}

/// The uniform event shape consumed by analysis modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A new commit on the tracked branch.
    Commit(CommitChange),
    /// A staged-but-uncommitted file.
    Staged(StagedChange),
    /// A live working-tree edit.
    LocalEdit(LocalEditChange),
    /// Generic file change for shapes the normalizer does not recognize.
    File(FileChange),
}

/// Commit event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitChange {
    /// The discovered commit.
    pub commit: CommitRecord,
    /// Repository working directory.
    pub repo_path: PathBuf,
}

/// Staged-file event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedChange {
    /// The staged file record.
    pub record: StagedRecord,
    /// Repository working directory.
    pub repo_path: PathBuf,
}

/// Local-edit event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEditChange {
    /// The captured edit.
    pub record: LocalEditRecord,
    /// Repository working directory.
    pub repo_path: PathBuf,
}

/// Fallback payload for unrecognized change shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path associated with the change, when one is known.
    pub path: Option<PathBuf>,
    /// Repository working directory.
    pub repo_path: PathBuf,
}

impl ChangeEvent {
    /// Path of the changed file, relative to the repository root.
    /// Commits touch many files and have no single path.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            ChangeEvent::Commit(_) => None,
            ChangeEvent::Staged(c) => Some(&c.record.path),
            ChangeEvent::LocalEdit(c) => Some(&c.record.path),
            ChangeEvent::File(c) => c.path.as_deref().and_then(Path::to_str),
        }
    }

    /// Truncated content snapshot carried by the event, when any.
    pub fn content(&self) -> Option<&str> {
        match self {
            ChangeEvent::Commit(_) | ChangeEvent::File(_) => None,
            ChangeEvent::Staged(c) => Some(&c.record.content),
            ChangeEvent::LocalEdit(c) => Some(&c.record.content),
        }
    }

    /// Repository working directory the event belongs to.
    pub fn repo_path(&self) -> &Path {
        match self {
            ChangeEvent::Commit(c) => &c.repo_path,
            ChangeEvent::Staged(c) => &c.repo_path,
            ChangeEvent::LocalEdit(c) => &c.repo_path,
            ChangeEvent::File(c) => &c.repo_path,
        }
    }

    /// Short label for log output.
    pub fn label(&self) -> String {
        match self {
            ChangeEvent::Commit(c) => format!("commit {}", c.commit.short_hash()),
            ChangeEvent::Staged(c) => format!("staged {}", c.record.path),
            ChangeEvent::LocalEdit(c) => format!("edit {}", c.record.path),
            ChangeEvent::File(c) => format!(
                "file {}",
                c.path
                    .as_deref()
                    .map_or_else(|| "<unknown>".to_string(), |p| p.display().to_string())
            ),
        }
    }
}

/// Converts a raw change into the uniform event shape.
///
/// Pure and total: every input variant maps to an event, and the same input
/// always yields a structurally equal event. Unrecognized shapes become the
/// generic [`ChangeEvent::File`] variant so the dispatcher stays total.
pub fn normalize(raw: RawChange, repo_path: &Path) -> ChangeEvent {
    let repo_path = repo_path.to_path_buf();
    match raw {
        RawChange::Commit(commit) => ChangeEvent::Commit(CommitChange { commit, repo_path }),
        RawChange::Staged(record) => ChangeEvent::Staged(StagedChange { record, repo_path }),
        RawChange::LocalEdit(record) => {
            ChangeEvent::LocalEdit(LocalEditChange { record, repo_path })
        }
        RawChange::Opaque { path } => ChangeEvent::File(FileChange { path, repo_path }),
    }
}

/// The classifier's output for one poll: three ordered event categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// New commits, oldest first.
    pub commits: Vec<ChangeEvent>,
    /// Staged files, in index iteration order.
    pub staged: Vec<ChangeEvent>,
    /// Local edits, in first-observed order.
    pub local_edits: Vec<ChangeEvent>,
}

impl ChangeSet {
    /// True when no category has entries.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.staged.is_empty() && self.local_edits.is_empty()
    }

    /// All events in reporting order: commits, then staged, then local edits.
    pub fn events(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.commits
            .iter()
            .chain(self.staged.iter())
            .chain(self.local_edits.iter())
    }

    /// Total number of events across all categories.
    pub fn len(&self) -> usize {
        self.commits.len() + self.staged.len() + self.local_edits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_edit() -> LocalEditRecord {
        LocalEditRecord {
            path: "src/lib.rs".to_string(),
            kind: EditKind::Modified,
            date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap(),
            status: "M".to_string(),
            description: "Modified".to_string(),
            content: "pub fn f() {}".to_string(),
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = RawChange::LocalEdit(sample_edit());
        let repo = Path::new("/tmp/repo");

        let first = normalize(raw.clone(), repo);
        let second = normalize(raw, repo);

        assert_eq!(first, second);
    }

    #[test]
    fn opaque_shapes_normalize_to_generic_file_events() {
        let raw = RawChange::Opaque {
            path: Some(PathBuf::from("weird.dat")),
        };

        match normalize(raw, Path::new("/tmp/repo")) {
            ChangeEvent::File(change) => {
                assert_eq!(change.path.as_deref(), Some(Path::new("weird.dat")));
            }
            other => panic!("expected generic file event, got {other:?}"),
        }
    }

    #[test]
    fn events_iterate_commits_then_staged_then_local() {
        let repo = Path::new("/tmp/repo");
        let set = ChangeSet {
            commits: vec![],
            staged: vec![normalize(
                RawChange::Opaque { path: None },
                repo,
            )],
            local_edits: vec![normalize(RawChange::LocalEdit(sample_edit()), repo)],
        };

        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
        let labels: Vec<_> = set.events().map(ChangeEvent::label).collect();
        assert_eq!(labels[0], "file <unknown>");
        assert_eq!(labels[1], "edit src/lib.rs");
    }
}
