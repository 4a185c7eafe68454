//! File watcher with debouncing for the synced file.
//!
//! Uses notify-debouncer-mini. The parent directory is watched rather than the
//! file itself: an atomic save (ours or an editor's) renames a new inode over
//! the path, and a watch on the old inode would go quiet after the first one.

use crate::signal::SignalSender;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, error, trace};

/// Default debounce window for bursts of filesystem events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("{} has no parent directory", .0.display())]
    NoParent(PathBuf),

    #[error("failed to watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Last seen mtime of the target, to drop repeated events for one write
type LastMtime = Arc<Mutex<Option<SystemTime>>>;

/// Watches one file and reports changes on a `SignalSender`.
///
/// Watching stops when this is dropped.
pub struct FileWatcher {
    file_path: PathBuf,
    /// Debouncer handle (must keep alive)
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl FileWatcher {
    pub fn new(
        file_path: PathBuf,
        debounce: Duration,
        sender: SignalSender,
    ) -> Result<Self, WatchError> {
        let parent = file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| WatchError::NoParent(file_path.clone()))?;

        // Canonicalize the directory to resolve symlinks. On macOS, /var/folders/...
        // is actually /private/var/folders/..., and FSEvents reports the real path.
        let parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
        let file_name = file_path
            .file_name()
            .ok_or_else(|| WatchError::NoParent(file_path.clone()))?;
        let target = parent.join(file_name);

        let last_mtime: LastMtime = Arc::new(Mutex::new(None));
        let callback_target = target.clone();

        let mut debouncer = new_debouncer(
            debounce,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    let relevant = events
                        .iter()
                        .filter(|event| Self::is_change(event, &callback_target, &last_mtime))
                        .count();
                    if relevant > 0 {
                        debug!("Local change to {}", callback_target.display());
                        sender.changed();
                    }
                }
                Err(e) => {
                    error!("File watcher error: {}", e);
                }
            },
        )
        .map_err(|source| WatchError::Watch {
            path: parent.clone(),
            source,
        })?;

        debouncer
            .watcher()
            .watch(&parent, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Watch {
                path: parent.clone(),
                source,
            })?;

        debug!("Watching {} for changes", target.display());

        Ok(Self {
            file_path: target,
            _debouncer: debouncer,
        })
    }

    /// Whether a debounced event is a real change to the target file.
    fn is_change(event: &DebouncedEvent, target: &Path, last_mtime: &LastMtime) -> bool {
        // Includes our own `<file>.tmp` sibling
        if event.path != target {
            trace!("Ignoring event for {}", event.path.display());
            return false;
        }

        // A deleted file has no mtime; let the loop read it as empty
        let Ok(mtime) = std::fs::metadata(target).and_then(|m| m.modified()) else {
            return true;
        };

        let Ok(mut last) = last_mtime.lock() else {
            return true;
        };
        if *last == Some(mtime) {
            trace!("Ignoring event with unchanged mtime");
            return false;
        }
        *last = Some(mtime);
        true
    }

    /// The path being watched, with its directory canonicalized.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}
