use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use git2::{Repository, Signature};
use tempfile::TempDir;

use git_sentinel::event::{ChangeEvent, EditKind, LocalEditRecord};
use git_sentinel::git::GitRepository;
use git_sentinel::monitor::{ChangeClassifier, MarkerStore, MonitorError, PendingEdits};

/// Test setup that creates a temporary git repository with test commits
struct TestRepo {
    _temp_dir: TempDir,
    repo_path: PathBuf,
    repo: Repository,
    commits: Vec<git2::Oid>,
}

impl TestRepo {
    fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let repo_path = temp_dir.path().to_path_buf();

        let repo = Repository::init(&repo_path)?;

        // Configure git user for commits
        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;

        Ok(TestRepo {
            _temp_dir: temp_dir,
            repo_path,
            repo,
            commits: Vec::new(),
        })
    }

    fn add_commit(&mut self, message: &str, file: &str, content: &str) -> Result<git2::Oid> {
        fs::write(self.repo_path.join(file), content)?;

        let mut index = self.repo.index()?;
        index.add_path(Path::new(file))?;
        index.write()?;

        let signature = Signature::now("Test User", "test@example.com")?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent_commit = if let Some(last_commit_id) = self.commits.last() {
            Some(self.repo.find_commit(*last_commit_id)?)
        } else {
            None
        };

        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();

        let commit_id = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;

        self.commits.push(commit_id);
        Ok(commit_id)
    }

    /// Stages a file without committing it.
    fn stage_file(&self, file: &str, content: &str) -> Result<()> {
        fs::write(self.repo_path.join(file), content)?;
        let mut index = self.repo.index()?;
        index.add_path(Path::new(file))?;
        index.write()?;
        Ok(())
    }

    /// Branch name the repository initialized with.
    fn branch(&self) -> Result<String> {
        Ok(self
            .repo
            .head()?
            .shorthand()
            .unwrap_or("master")
            .to_string())
    }

    fn open(&self) -> Result<GitRepository> {
        GitRepository::open_at(&self.repo_path, &self.branch()?)
    }
}

fn classifier_for(repo: &TestRepo) -> Result<(ChangeClassifier, PendingEdits)> {
    let pending = PendingEdits::new();
    let classifier = ChangeClassifier::new(repo.open()?, pending.clone(), None)?;
    Ok((classifier, pending))
}

fn commit_messages(events: &[ChangeEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            ChangeEvent::Commit(change) => change.commit.subject().to_string(),
            other => panic!("expected commit event, got {other:?}"),
        })
        .collect()
}

#[test]
fn n_new_commits_are_reported_in_introduction_order() -> Result<()> {
    let mut repo = TestRepo::new()?;
    repo.add_commit("commit A", "a.txt", "a\n")?;

    let (mut classifier, _pending) = classifier_for(&repo)?;
    let marker_a = classifier.last_commit().to_string();

    repo.add_commit("commit B", "b.txt", "b\n")?;
    repo.add_commit("commit C", "c.txt", "c\n")?;
    let tip_d = repo.add_commit("commit D", "d.txt", "d\n")?;

    let changes = classifier.check_for_changes()?.expect("changes expected");
    assert_eq!(
        commit_messages(&changes.commits),
        vec!["commit B", "commit C", "commit D"]
    );
    assert!(changes.staged.is_empty());

    // Marker advanced to the new tip, and only to the new tip.
    assert_ne!(classifier.last_commit(), marker_a);
    assert_eq!(classifier.last_commit(), tip_d.to_string());

    // Nothing further to report: explicit empty signal, not an error.
    assert!(classifier.check_for_changes()?.is_none());
    Ok(())
}

#[test]
fn commit_events_carry_per_file_diff_stats() -> Result<()> {
    let mut repo = TestRepo::new()?;
    repo.add_commit("commit A", "a.txt", "line1\n")?;

    let (mut classifier, _pending) = classifier_for(&repo)?;
    repo.add_commit("commit B", "a.txt", "line1\nline2\nline3\n")?;

    let changes = classifier.check_for_changes()?.expect("changes expected");
    let ChangeEvent::Commit(change) = &changes.commits[0] else {
        panic!("expected commit event");
    };

    assert_eq!(change.commit.files.len(), 1);
    let stat = &change.commit.files[0];
    assert_eq!(stat.path, "a.txt");
    assert_eq!(stat.status, "M");
    assert_eq!(stat.insertions, 2);
    assert_eq!(stat.deletions, 0);
    Ok(())
}

#[test]
fn sync_failure_aborts_cycle_and_leaves_marker_unchanged() -> Result<()> {
    let mut repo = TestRepo::new()?;
    repo.add_commit("commit A", "a.txt", "a\n")?;

    // An origin remote that cannot be reached.
    repo.repo
        .remote("origin", "/nonexistent/git-sentinel-test-remote")?;

    let (mut classifier, _pending) = classifier_for(&repo)?;
    let marker_before = classifier.last_commit().to_string();

    repo.add_commit("commit B", "b.txt", "b\n")?;

    let result = classifier.check_for_changes();
    assert!(matches!(result, Err(MonitorError::Sync(_))));
    assert_eq!(classifier.last_commit(), marker_before);
    Ok(())
}

#[test]
fn staged_files_are_reported_with_snapshot_and_status() -> Result<()> {
    let mut repo = TestRepo::new()?;
    repo.add_commit("commit A", "a.txt", "a\n")?;

    let (mut classifier, _pending) = classifier_for(&repo)?;
    repo.stage_file("new_module.py", "def f():\n    pass\n")?;

    let changes = classifier.check_for_changes()?.expect("changes expected");
    assert!(changes.commits.is_empty());
    assert_eq!(changes.staged.len(), 1);

    let ChangeEvent::Staged(staged) = &changes.staged[0] else {
        panic!("expected staged event");
    };
    assert_eq!(staged.record.path, "new_module.py");
    assert_eq!(staged.record.status, "A");
    assert_eq!(staged.record.event_kind, "created");
    assert_eq!(staged.record.content, "def f():\n    pass\n");
    assert_eq!(staged.record.description, "Added");

    // The staged delta is recomputed every poll, not drained.
    let again = classifier.check_for_changes()?.expect("still staged");
    assert_eq!(again.staged.len(), 1);
    Ok(())
}

#[test]
fn buffered_local_edits_are_drained_exactly_once() -> Result<()> {
    let mut repo = TestRepo::new()?;
    repo.add_commit("commit A", "a.txt", "a\n")?;

    let (mut classifier, pending) = classifier_for(&repo)?;
    pending.push(LocalEditRecord {
        path: "a.txt".to_string(),
        kind: EditKind::Modified,
        date: chrono::Utc::now(),
        status: "M".to_string(),
        description: "Modified".to_string(),
        content: "a2\n".to_string(),
    });

    let changes = classifier.check_for_changes()?.expect("changes expected");
    assert_eq!(changes.local_edits.len(), 1);

    // The drained edit never reappears in a later poll.
    assert!(classifier.check_for_changes()?.is_none());
    Ok(())
}

#[test]
fn edits_arriving_during_a_failed_cycle_are_preserved() -> Result<()> {
    let mut repo = TestRepo::new()?;
    repo.add_commit("commit A", "a.txt", "a\n")?;
    repo.repo
        .remote("origin", "/nonexistent/git-sentinel-test-remote")?;

    let (mut classifier, pending) = classifier_for(&repo)?;
    pending.push(LocalEditRecord {
        path: "a.txt".to_string(),
        kind: EditKind::Modified,
        date: chrono::Utc::now(),
        status: "M".to_string(),
        description: "Modified".to_string(),
        content: String::new(),
    });

    // The aborted cycle must not drain the buffer.
    assert!(classifier.check_for_changes().is_err());
    assert_eq!(pending.len(), 1);
    Ok(())
}

#[test]
fn local_edit_for_a_staged_path_is_reported_once() -> Result<()> {
    let mut repo = TestRepo::new()?;
    repo.add_commit("commit A", "a.txt", "a\n")?;

    let (mut classifier, pending) = classifier_for(&repo)?;
    repo.stage_file("a.txt", "a2\n")?;
    pending.push(LocalEditRecord {
        path: "a.txt".to_string(),
        kind: EditKind::Modified,
        date: chrono::Utc::now(),
        status: "M".to_string(),
        description: "Modified".to_string(),
        content: "a2\n".to_string(),
    });

    let changes = classifier.check_for_changes()?.expect("changes expected");
    assert_eq!(changes.staged.len(), 1);
    assert!(changes.local_edits.is_empty());

    // The suppressed edit is gone for good, not carried to the next poll.
    let again = classifier.check_for_changes()?.expect("still staged");
    assert!(again.local_edits.is_empty());
    Ok(())
}

#[test]
fn marker_survives_classifier_restarts() -> Result<()> {
    let mut repo = TestRepo::new()?;
    repo.add_commit("commit A", "a.txt", "a\n")?;
    let branch = repo.branch()?;
    let marker_path = repo.repo_path.join("marker.json");

    {
        let store = MarkerStore::new(marker_path.clone(), &branch);
        let mut classifier =
            ChangeClassifier::new(repo.open()?, PendingEdits::new(), Some(store))?;
        repo.add_commit("commit B", "b.txt", "b\n")?;
        classifier.check_for_changes()?.expect("changes expected");
    }

    // A fresh classifier resumes from the persisted marker instead of the
    // current tip, so commit C is still reported after a restart.
    let tip_c = repo.add_commit("commit C", "c.txt", "c\n")?;
    let store = MarkerStore::new(marker_path, &branch);
    let mut classifier = ChangeClassifier::new(repo.open()?, PendingEdits::new(), Some(store))?;

    let changes = classifier.check_for_changes()?.expect("changes expected");
    assert_eq!(commit_messages(&changes.commits), vec!["commit C"]);
    assert_eq!(classifier.last_commit(), tip_c.to_string());
    Ok(())
}

#[test]
fn repository_without_remote_polls_cleanly() -> Result<()> {
    let mut repo = TestRepo::new()?;
    repo.add_commit("commit A", "a.txt", "a\n")?;

    let (mut classifier, _pending) = classifier_for(&repo)?;
    // No origin configured: sync is skipped rather than failing.
    assert!(classifier.check_for_changes()?.is_none());
    Ok(())
}
