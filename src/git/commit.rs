//! Commit metadata and diff statistics extraction.

use chrono::{DateTime, FixedOffset};
use git2::{Commit, Repository};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::git::SHORT_HASH_LEN;

/// Immutable record of one commit discovered between the last-known marker
/// and the branch tip. Created once per discovered commit, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full SHA-1 hash of the commit.
    pub hash: String,
    /// Author name.
    pub author: String,
    /// Author email address.
    pub email: String,
    /// The complete commit message.
    pub message: String,
    /// Author timestamp with its original timezone offset.
    pub date: DateTime<FixedOffset>,
    /// Per-file diff statistics against the first parent.
    pub files: Vec<FileDiffStat>,
}

/// Per-file change statistics within one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiffStat {
    /// Path relative to the repository root.
    pub path: String,
    /// Status letter (A, M, D, R, C, T).
    pub status: String,
    /// Inserted line count.
    pub insertions: usize,
    /// Deleted line count.
    pub deletions: usize,
}

impl CommitRecord {
    /// Builds a record from a git2 commit.
    ///
    /// Metadata extraction is infallible; a failure while computing diff
    /// statistics degrades that one commit to an empty file list so the
    /// surrounding enumeration can keep going.
    pub fn from_git_commit(repo: &Repository, commit: &Commit) -> Self {
        let hash = commit.id().to_string();

        let timestamp = commit.author().when();
        let offset = FixedOffset::east_opt(timestamp.offset_minutes() * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        let date = DateTime::from_timestamp(timestamp.seconds(), 0)
            .map(|d| d.with_timezone(&offset))
            .unwrap_or_else(|| DateTime::<chrono::Utc>::MIN_UTC.with_timezone(&offset));

        let files = match diff_stats(repo, commit) {
            Ok(files) => files,
            Err(e) => {
                warn!(
                    "Failed to compute diff for commit {}: {e:#}",
                    &hash[..SHORT_HASH_LEN.min(hash.len())]
                );
                Vec::new()
            }
        };

        Self {
            hash,
            author: commit.author().name().unwrap_or("Unknown").to_string(),
            email: commit
                .author()
                .email()
                .unwrap_or("unknown@example.com")
                .to_string(),
            message: commit.message().unwrap_or("").to_string(),
            date,
            files,
        }
    }

    /// First line of the commit message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Abbreviated hash for log and chat output.
    pub fn short_hash(&self) -> &str {
        &self.hash[..SHORT_HASH_LEN.min(self.hash.len())]
    }

    /// Paths touched by this commit.
    pub fn touched_paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }
}

/// Computes per-file insertion/deletion counts for a commit against its
/// first parent (or the empty tree for a root commit).
fn diff_stats(repo: &Repository, commit: &Commit) -> anyhow::Result<Vec<FileDiffStat>> {
    use anyhow::Context;

    let commit_tree = commit.tree().context("Failed to get commit tree")?;

    let parent_tree = if commit.parent_count() > 0 {
        Some(
            commit
                .parent(0)
                .context("Failed to get parent commit")?
                .tree()
                .context("Failed to get parent tree")?,
        )
    } else {
        None
    };

    let diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)
        .context("Failed to create diff")?;

    let mut files = Vec::new();
    let delta_count = diff.deltas().len();

    for idx in 0..delta_count {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };

        let status = match delta.status() {
            git2::Delta::Added => "A",
            git2::Delta::Deleted => "D",
            git2::Delta::Modified => "M",
            git2::Delta::Renamed => "R",
            git2::Delta::Copied => "C",
            git2::Delta::Typechange => "T",
            _ => "?",
        };

        let Some(path) = delta.new_file().path().and_then(|p| p.to_str()) else {
            continue;
        };

        let (insertions, deletions) = match git2::Patch::from_diff(&diff, idx) {
            Ok(Some(patch)) => {
                let (_, additions, deletions) = patch
                    .line_stats()
                    .context("Failed to compute patch line stats")?;
                (additions, deletions)
            }
            _ => (0, 0),
        };

        files.push(FileDiffStat {
            path: path.to_string(),
            status: status.to_string(),
            insertions,
            deletions,
        });
    }

    Ok(files)
}
