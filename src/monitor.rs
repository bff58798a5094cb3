//! The poll loop.
//!
//! Wires the classifier, the module dispatcher, the filesystem watcher,
//! and the notification sink together. One timer-driven task performs all
//! version-control I/O, module dispatch, and notification sends
//! sequentially; the filesystem listener runs on its own thread and only
//! ever appends to the shared pending-edit buffer.

pub mod classifier;
pub mod state;
pub mod tracker;
pub mod watcher;

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub use classifier::{ChangeClassifier, MonitorError};
pub use state::MarkerStore;
pub use tracker::{LocalEditTracker, PendingEdits};
pub use watcher::FileWatcher;

use crate::config::MonitorConfig;
use crate::event::{ChangeEvent, ChangeSet};
use crate::git::GitRepository;
use crate::modules::{ModuleDispatcher, ModuleRegistry, ModuleResult};
use crate::notifier::SlackNotifier;

/// One event with the results every enabled module produced for it.
#[derive(Debug, Serialize)]
pub struct EventReport {
    /// The normalized event.
    pub event: ChangeEvent,
    /// Collected module results, in module iteration order.
    pub results: Vec<ModuleResult>,
}

/// Everything one poll produced, grouped by change category.
#[derive(Debug, Default, Serialize)]
pub struct PollReport {
    /// Reports for new commits, oldest first.
    pub commits: Vec<EventReport>,
    /// Reports for staged files.
    pub staged: Vec<EventReport>,
    /// Reports for local edits.
    pub local_edits: Vec<EventReport>,
}

impl PollReport {
    /// True when no category produced anything.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.staged.is_empty() && self.local_edits.is_empty()
    }
}

/// The assembled monitor.
pub struct Monitor {
    classifier: ChangeClassifier,
    dispatcher: ModuleDispatcher,
    notifier: Option<SlackNotifier>,
    watcher: FileWatcher,
    tracker: Option<LocalEditTracker>,
    poll_interval: Duration,
}

impl Monitor {
    /// Builds a monitor from configuration.
    ///
    /// Failing to open the repository is a fatal startup error: the process
    /// must not proceed to the poll loop without one.
    pub fn new(
        config: &MonitorConfig,
        registry: &ModuleRegistry,
        notifier: Option<SlackNotifier>,
    ) -> Result<Self> {
        let repo = GitRepository::open_at(&config.core.repo_path, &config.core.branch)
            .context("Cannot open the repository to monitor")?;
        let workdir = repo.workdir().to_path_buf();

        let pending = PendingEdits::new();
        let marker = MarkerStore::in_git_dir(&workdir, &config.core.branch);
        let classifier = ChangeClassifier::new(repo, pending.clone(), Some(marker))?;

        let tracker = LocalEditTracker::new(
            &workdir,
            &config.core.branch,
            pending,
            &config.core.watch_ignore,
        )?;

        let dispatcher = ModuleDispatcher::from_registry(registry, &config.modules);
        info!("Active modules: {:?}", dispatcher.active_modules());

        Ok(Self {
            classifier,
            dispatcher,
            notifier,
            watcher: FileWatcher::new(&workdir),
            tracker: Some(tracker),
            poll_interval: Duration::from_secs(config.core.poll_interval_secs.max(1)),
        })
    }

    /// Runs one classification-and-dispatch cycle.
    ///
    /// `Ok(None)` is the explicit "nothing changed" signal. An `Err` means
    /// the cycle was aborted; the marker and the edit buffer are untouched
    /// and the cycle is retried on the next tick.
    pub async fn poll_once(&mut self) -> Result<Option<PollReport>, MonitorError> {
        let Some(changes) = self.classifier.check_for_changes()? else {
            return Ok(None);
        };

        info!(
            "Dispatching {} events ({} commits, {} staged, {} local)",
            changes.len(),
            changes.commits.len(),
            changes.staged.len(),
            changes.local_edits.len()
        );

        Ok(Some(self.dispatch(&changes).await))
    }

    /// Runs every enabled module over every event, category by category.
    async fn dispatch(&self, changes: &ChangeSet) -> PollReport {
        let mut report = PollReport::default();

        for event in &changes.commits {
            report.commits.push(self.report_for(event).await);
        }
        for event in &changes.staged {
            report.staged.push(self.report_for(event).await);
        }
        for event in &changes.local_edits {
            report.local_edits.push(self.report_for(event).await);
        }

        report
    }

    async fn report_for(&self, event: &ChangeEvent) -> EventReport {
        let results = self.dispatcher.process_event(event).await;
        EventReport {
            event: event.clone(),
            results,
        }
    }

    /// Runs the monitor until interrupted.
    ///
    /// Performs a startup notification probe, starts the filesystem
    /// watcher, polls immediately and then on every interval tick, and
    /// shuts both loops down cleanly on ctrl-c.
    pub async fn run(&mut self) -> Result<()> {
        if let Some(notifier) = &self.notifier {
            let probe = notifier.send(":arrows_counterclockwise: Git monitor started").await;
            if !probe {
                anyhow::bail!(
                    "Slack connection probe failed; check SLACK_BOT_TOKEN and the channel id"
                );
            }
        }

        let tracker = self
            .tracker
            .take()
            .context("Monitor::run called twice")?;
        self.watcher.start(tracker)?;

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!(
            "Polling every {}s; press ctrl-c to stop",
            self.poll_interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = &mut ctrl_c => {
                    info!("Interrupt received, stopping");
                    break;
                }
            }
        }

        // Completes in-flight notifications before returning.
        self.watcher.stop();
        Ok(())
    }

    /// One scheduled tick: poll, then notify.
    async fn tick(&mut self) {
        match self.poll_once().await {
            Ok(Some(report)) => self.notify(&report).await,
            Ok(None) => debug!("No changes detected"),
            // Transient failure: logged, marker untouched, retried next tick.
            Err(e) => warn!("Poll cycle aborted: {e:#}"),
        }
    }

    /// Sends one chat message per non-empty category.
    async fn notify(&self, report: &PollReport) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        let sections = [
            ("*New commits detected:*", &report.commits),
            ("*Staged changes detected:*", &report.staged),
            ("*Local changes detected:*", &report.local_edits),
        ];

        for (header, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            let message = format_section(header, entries);
            if !notifier.send(&message).await {
                error!("Failed to deliver notification for section {header}");
            }
        }
    }
}

/// Renders one category section for chat.
fn format_section(header: &str, entries: &[EventReport]) -> String {
    let mut out = String::from(header);
    out.push('\n');

    for entry in entries {
        out.push_str(&format!("\n• {}\n", entry.event.label()));
        if entry.results.is_empty() {
            out.push_str("    (no module produced a result)\n");
        }
        for result in &entry.results {
            out.push_str(&format!("    - {}: {}\n", result.module, result.summary));
        }
    }

    out
}
