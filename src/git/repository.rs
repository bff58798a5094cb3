//! Git repository wrapper.
//!
//! Exposes the operations the monitor needs from the underlying version
//! control system: branch tip resolution, remote synchronization, the
//! staged-versus-HEAD delta, and per-file working-tree status.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use git2::{Delta, Repository, Status};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::git::commit::CommitRecord;
use crate::git::{content_snapshot, status_description};

/// Git repository wrapper bound to one tracked branch.
pub struct GitRepository {
    repo: Repository,
    workdir: PathBuf,
    branch: String,
}

/// One file whose index entry differs from HEAD.
///
/// Recomputed in full on every poll; never persisted across polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedRecord {
    /// Path relative to the repository root.
    pub path: String,
    /// Porcelain status code (A, M, D, R).
    pub status: String,
    /// Edit kind derived from the status code (created/modified/deleted).
    pub event_kind: String,
    /// Human-readable description of the status code.
    pub description: String,
    /// Truncated content snapshot, empty for binary and deleted files.
    pub content: String,
    /// Capture time.
    pub date: chrono::DateTime<Utc>,
}

impl GitRepository {
    /// Opens the repository at `path`, tracking `branch`.
    pub fn open_at<P: AsRef<Path>>(path: P, branch: &str) -> Result<Self> {
        let repo = Repository::open(path.as_ref()).with_context(|| {
            format!("Failed to open git repository at {}", path.as_ref().display())
        })?;

        let workdir = repo
            .workdir()
            .context("Repository has no working directory (bare repositories are not supported)")?
            .to_path_buf();

        Ok(Self {
            repo,
            workdir,
            branch: branch.to_string(),
        })
    }

    /// Returns the repository working directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Returns the tracked branch name.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Returns the commit hash at the tip of the tracked branch.
    pub fn branch_tip(&self) -> Result<String> {
        let branch = self
            .repo
            .find_branch(&self.branch, git2::BranchType::Local)
            .with_context(|| format!("Branch '{}' not found", self.branch))?;

        let commit = branch
            .get()
            .peel_to_commit()
            .with_context(|| format!("Failed to resolve tip of branch '{}'", self.branch))?;

        Ok(commit.id().to_string())
    }

    /// Fetches the tracked branch from `origin` and fast-forwards the local
    /// branch when possible.
    ///
    /// Repositories without an `origin` remote are treated as local-only and
    /// skipped. A remote that exists but cannot be fetched is an error so the
    /// caller can distinguish sync failure from "no new commits".
    pub fn sync_with_remote(&self) -> Result<()> {
        let mut remote = match self.repo.find_remote("origin") {
            Ok(remote) => remote,
            Err(_) => {
                debug!("No 'origin' remote configured, skipping sync");
                return Ok(());
            }
        };

        let cfg = self.repo.config().ok();
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed| {
            if allowed.is_ssh_key() {
                if let Some(user) = username_from_url {
                    return git2::Cred::ssh_key_from_agent(user);
                }
            }
            if allowed.is_user_pass_plaintext() {
                if let Some(ref cfg) = cfg {
                    if let Ok(cred) = git2::Cred::credential_helper(cfg, url, username_from_url) {
                        return Ok(cred);
                    }
                }
            }
            git2::Cred::default()
        });

        let mut opts = git2::FetchOptions::new();
        opts.remote_callbacks(callbacks);

        remote
            .fetch(&[self.branch.as_str()], Some(&mut opts), None)
            .with_context(|| format!("Failed to fetch '{}' from origin", self.branch))?;

        self.fast_forward()
    }

    /// Fast-forwards the local branch to `origin/<branch>` when the merge
    /// analysis allows it. Diverged histories are left untouched.
    fn fast_forward(&self) -> Result<()> {
        let remote_ref = format!("refs/remotes/origin/{}", self.branch);
        let Ok(remote_oid) = self.repo.refname_to_id(&remote_ref) else {
            debug!("Remote tracking ref {remote_ref} not found, nothing to fast-forward");
            return Ok(());
        };

        let annotated = self
            .repo
            .find_annotated_commit(remote_oid)
            .context("Failed to resolve fetched commit")?;

        let (analysis, _) = self
            .repo
            .merge_analysis(&[&annotated])
            .context("Merge analysis failed")?;

        if analysis.is_up_to_date() {
            return Ok(());
        }

        if analysis.is_fast_forward() {
            let ref_name = format!("refs/heads/{}", self.branch);
            let mut reference = self
                .repo
                .find_reference(&ref_name)
                .with_context(|| format!("Failed to find local ref {ref_name}"))?;
            reference
                .set_target(remote_oid, "git-sentinel: fast-forward")
                .context("Failed to fast-forward local branch")?;
            debug!("Fast-forwarded {} to {}", self.branch, remote_oid);
        } else {
            warn!(
                "Local branch '{}' has diverged from origin, leaving it untouched",
                self.branch
            );
        }

        Ok(())
    }

    /// Enumerates commits strictly after `old_tip` up to and including
    /// `new_tip`, oldest first.
    pub fn commits_between(&self, old_tip: &str, new_tip: &str) -> Result<Vec<CommitRecord>> {
        let old_oid = git2::Oid::from_str(old_tip).context("Invalid last-known commit hash")?;
        let new_oid = git2::Oid::from_str(new_tip).context("Invalid branch tip hash")?;

        let mut walker = self.repo.revwalk().context("Failed to create revwalk")?;
        walker.push(new_oid).context("Failed to push branch tip")?;
        // The old tip may have been rewritten away (force push); hiding it
        // then fails and the walk falls back to the reachable history.
        if self.repo.find_commit(old_oid).is_ok() {
            walker
                .hide(old_oid)
                .context("Failed to hide last-known commit")?;
        } else {
            warn!(
                "Last-known commit {} no longer exists, reporting full reachable history",
                &old_tip[..old_tip.len().min(crate::git::SHORT_HASH_LEN)]
            );
        }

        let mut commits = Vec::new();
        for oid in walker {
            let oid = oid.context("Failed to advance revwalk")?;
            let commit = self
                .repo
                .find_commit(oid)
                .context("Failed to look up commit")?;
            commits.push(CommitRecord::from_git_commit(&self.repo, &commit));
        }

        // Oldest intervening commit first.
        commits.reverse();
        Ok(commits)
    }

    /// Computes the staged-file delta: every file whose index entry differs
    /// from HEAD, with a truncated content snapshot for readable files.
    pub fn staged_files(&self) -> Result<Vec<StagedRecord>> {
        let head_tree = match self.repo.head().and_then(|h| h.peel_to_tree()) {
            Ok(tree) => Some(tree),
            // Unborn branch: everything in the index counts as added.
            Err(_) => None,
        };

        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), None, None)
            .context("Failed to diff index against HEAD")?;

        let mut staged = Vec::new();
        for delta in diff.deltas() {
            let (status, event_kind) = match delta.status() {
                Delta::Added => ("A", "created"),
                Delta::Deleted => ("D", "deleted"),
                Delta::Renamed => ("R", "modified"),
                Delta::Modified | Delta::Typechange => ("M", "modified"),
                _ => continue,
            };

            let Some(path) = delta.new_file().path().and_then(Path::to_str) else {
                continue;
            };

            let content = if event_kind == "deleted" {
                String::new()
            } else {
                content_snapshot(&self.workdir.join(path)).unwrap_or_default()
            };

            staged.push(StagedRecord {
                path: path.to_string(),
                status: status.to_string(),
                event_kind: event_kind.to_string(),
                description: status_description(status),
                content,
                date: Utc::now(),
            });
        }

        Ok(staged)
    }

    /// Returns the porcelain status code for a single file, or `"??"` when
    /// the file is untracked or its status cannot be determined.
    pub fn file_status(&self, rel_path: &Path) -> String {
        let status = match self.repo.status_file(rel_path) {
            Ok(status) => status,
            Err(e) => {
                debug!("No git status for {}: {e}", rel_path.display());
                return "??".to_string();
            }
        };

        format_status(status)
    }
}

/// Formats git2 status flags the way `git status --porcelain` prints the
/// leading column pair, with whitespace trimmed.
fn format_status(flags: Status) -> String {
    if flags.contains(Status::WT_NEW) && !flags.intersects(index_flags()) {
        return "??".to_string();
    }

    let mut out = String::new();

    if flags.contains(Status::INDEX_NEW) {
        out.push('A');
    } else if flags.contains(Status::INDEX_MODIFIED) {
        out.push('M');
    } else if flags.contains(Status::INDEX_DELETED) {
        out.push('D');
    } else if flags.contains(Status::INDEX_RENAMED) {
        out.push('R');
    }

    if flags.contains(Status::WT_MODIFIED) {
        out.push('M');
    } else if flags.contains(Status::WT_DELETED) {
        out.push('D');
    } else if flags.contains(Status::WT_RENAMED) {
        out.push('R');
    }

    out
}

fn index_flags() -> Status {
    Status::INDEX_NEW | Status::INDEX_MODIFIED | Status::INDEX_DELETED | Status::INDEX_RENAMED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untracked_status_formats_as_question_marks() {
        assert_eq!(format_status(Status::WT_NEW), "??");
    }

    #[test]
    fn index_and_worktree_columns_combine() {
        assert_eq!(format_status(Status::INDEX_NEW), "A");
        assert_eq!(
            format_status(Status::INDEX_NEW | Status::WT_MODIFIED),
            "AM"
        );
        assert_eq!(format_status(Status::WT_MODIFIED), "M");
        assert_eq!(format_status(Status::INDEX_DELETED), "D");
    }
}
