//! Filesystem event listener.
//!
//! Wraps a `notify` recursive watcher and forwards raw notifications to the
//! [`LocalEditTracker`](crate::monitor::tracker::LocalEditTracker) on a
//! dedicated handler thread. The watcher never blocks on the poll loop: it
//! only appends to the shared pending buffer through the tracker.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::event::EditKind;
use crate::monitor::tracker::LocalEditTracker;

/// Errors raised while starting or stopping the filesystem watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The platform watcher could not be created.
    #[error("Failed to create filesystem watcher: {0}")]
    Creation(#[from] notify::Error),

    /// The repository root could not be watched.
    #[error("Failed to watch {path}: {source}")]
    WatchPath {
        /// Path that could not be watched.
        path: PathBuf,
        /// Underlying notify error.
        source: notify::Error,
    },
}

/// One raw notification forwarded to the handler thread.
struct RawNotification {
    path: PathBuf,
    kind: EditKind,
}

/// Recursive filesystem watcher with a cancelable start/stop lifecycle.
///
/// `start` spawns the handler thread that owns the tracker; `stop` tears the
/// watcher down and joins the thread, letting any in-flight notification
/// finish first.
pub struct FileWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    handler: Option<JoinHandle<()>>,
}

impl FileWatcher {
    /// Creates a watcher for the repository root. Nothing happens until
    /// [`start`](Self::start) is called.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            watcher: None,
            handler: None,
        }
    }

    /// Starts watching recursively, feeding events into `tracker`.
    pub fn start(&mut self, mut tracker: LocalEditTracker) -> Result<(), WatcherError> {
        let (tx, rx): (Sender<RawNotification>, Receiver<RawNotification>) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Filesystem watcher error: {e}");
                        return;
                    }
                };

                let Some(kind) = classify_event_kind(&event.kind) else {
                    return;
                };

                for path in event.paths {
                    // Receiver gone means we are shutting down.
                    if tx.send(RawNotification { path, kind }).is_err() {
                        return;
                    }
                }
            },
            notify::Config::default(),
        )?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::WatchPath {
                path: self.root.clone(),
                source: e,
            })?;

        let handler = std::thread::spawn(move || {
            // Exits when every sender is dropped, i.e. after `stop` drops
            // the watcher. Pending notifications are processed first.
            while let Ok(notification) = rx.recv() {
                tracker.on_file_event(&notification.path, notification.kind);
            }
            debug!("Watcher handler thread finished");
        });

        self.watcher = Some(watcher);
        self.handler = Some(handler);
        info!("Filesystem watcher started on {}", self.root.display());
        Ok(())
    }

    /// Stops the watcher and joins the handler thread.
    pub fn stop(&mut self) {
        if self.watcher.take().is_none() {
            return;
        }

        if let Some(handler) = self.handler.take() {
            if handler.join().is_err() {
                warn!("Watcher handler thread panicked during shutdown");
            }
        }
        info!("Filesystem watcher stopped");
    }

    /// True while the watcher is running.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Maps a notify event kind onto the tracker's edit kinds. Access-only and
/// metadata events are dropped at the source.
fn classify_event_kind(kind: &EventKind) -> Option<EditKind> {
    match kind {
        EventKind::Create(_) => Some(EditKind::Created),
        EventKind::Remove(_) => Some(EditKind::Deleted),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(EditKind::Modified),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, MetadataKind};

    #[test]
    fn event_kinds_map_to_edit_kinds() {
        assert_eq!(
            classify_event_kind(&EventKind::Create(notify::event::CreateKind::File)),
            Some(EditKind::Created)
        );
        assert_eq!(
            classify_event_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(EditKind::Modified)
        );
        assert_eq!(
            classify_event_kind(&EventKind::Remove(notify::event::RemoveKind::File)),
            Some(EditKind::Deleted)
        );
        assert_eq!(
            classify_event_kind(&EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::Permissions
            ))),
            None
        );
        assert_eq!(classify_event_kind(&EventKind::Access(notify::event::AccessKind::Read)), None);
    }
}
