//! Client reconciliation loop.
//!
//! Keeps the local file and the server's document in step:
//! - `pull` fetches the server state and writes it locally when the version moved
//! - `push` uploads the local file unless the change is our own pull echoing back
//! - `run` drives both from change signals until told to stop
//!
//! All bookkeeping lives in one `ClientSyncState` behind an async mutex. The lock
//! is taken around local bookkeeping and the pull-side file write, never across
//! a request to the server.

use crate::signal::{ChangeSignal, SignalReceiver};
use crate::transport::{SyncTransport, TransportError};
use rfs_core::{ContentHash, FileStore, PersistenceError, Version};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default wait for a change signal before re-checking for stop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default pause after each push/pull cycle.
pub const DEFAULT_CHURN_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("local file: {0}")]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// What a pull did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Server had a new version; it was written to the local file
    Applied(Version),
    /// Server version matched ours; nothing written
    Unchanged(Version),
}

/// What a push did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Local content sent; server answered with this version
    Pushed(Version),
    /// The change was our own pull landing on disk; nothing sent
    Suppressed,
}

/// Client-side sync bookkeeping.
#[derive(Debug)]
pub struct ClientSyncState {
    pub file_path: PathBuf,
    /// Last server version we applied or had acknowledged
    pub last_known_version: Version,
    /// Hash of the content we last wrote during a pull, until one push consumes it
    pub suppress: Option<ContentHash>,
    pub stop_requested: bool,
}

impl ClientSyncState {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            last_known_version: 0,
            suppress: None,
            stop_requested: false,
        }
    }
}

/// Drives pushes and pulls for one local file.
pub struct Reconciler {
    state: Mutex<ClientSyncState>,
    store: Arc<dyn FileStore>,
    transport: Arc<dyn SyncTransport>,
    poll_interval: Duration,
    churn_delay: Duration,
}

impl Reconciler {
    pub fn new(
        file_path: impl Into<PathBuf>,
        store: Arc<dyn FileStore>,
        transport: Arc<dyn SyncTransport>,
    ) -> Self {
        Self {
            state: Mutex::new(ClientSyncState::new(file_path.into())),
            store,
            transport,
            poll_interval: DEFAULT_POLL_INTERVAL,
            churn_delay: DEFAULT_CHURN_DELAY,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_churn_delay(mut self, delay: Duration) -> Self {
        self.churn_delay = delay;
        self
    }

    pub async fn last_known_version(&self) -> Version {
        self.state.lock().await.last_known_version
    }

    /// The pending echo-suppression token, if any.
    pub async fn suppression(&self) -> Option<ContentHash> {
        self.state.lock().await.suppress.clone()
    }

    /// Ask `run` to stop at its next idle check.
    pub async fn request_stop(&self) {
        self.state.lock().await.stop_requested = true;
    }

    pub async fn stop_requested(&self) -> bool {
        self.state.lock().await.stop_requested
    }

    /// Fetch the server state and apply it locally if the version moved.
    pub async fn pull(&self) -> Result<PullOutcome> {
        let (version, content) = self.transport.get().await?;

        let mut state = self.state.lock().await;
        if version == state.last_known_version {
            return Ok(PullOutcome::Unchanged(version));
        }

        // Set before writing so the watcher event for this write is recognized.
        // A failed write leaves the token in place.
        let token = ContentHash::from_bytes(&content);
        debug!("Suppressing next change matching {}", token);
        state.suppress = Some(token);

        self.store.write_all(&state.file_path, &content).await?;
        state.last_known_version = version;

        info!(
            "Pulled version {} ({} bytes) into {}",
            version,
            content.len(),
            state.file_path.display()
        );
        Ok(PullOutcome::Applied(version))
    }

    /// Upload the local file, unless it is exactly what the last pull wrote.
    pub async fn push(&self) -> Result<PushOutcome> {
        let file_path = self.state.lock().await.file_path.clone();
        let content = self.store.read_all(&file_path).await?;

        let base_version = {
            let mut state = self.state.lock().await;
            if let Some(token) = state.suppress.take() {
                if token == ContentHash::from_bytes(&content) {
                    debug!("Skipping push of {}: echo of our own pull", token);
                    return Ok(PushOutcome::Suppressed);
                }
            }
            state.last_known_version
        };

        let version = self.transport.put(base_version, &content).await?;

        self.state.lock().await.last_known_version = version;
        info!(
            "Pushed {} bytes against version {}, server now at {}",
            content.len(),
            base_version,
            version
        );
        Ok(PushOutcome::Pushed(version))
    }

    async fn pull_logged(&self) {
        if let Err(e) = self.pull().await {
            warn!("Pull failed: {}", e);
        }
    }

    async fn push_logged(&self) {
        if let Err(e) = self.push().await {
            warn!("Push failed: {}", e);
        }
    }

    /// Run until a `ShuttingDown` signal arrives or `request_stop` is called.
    ///
    /// Starts with one pull. Every `Changed` signal, together with any others
    /// already queued behind it, triggers one push followed by one pull.
    /// Failures are logged and the loop carries on.
    pub async fn run(&self, mut signals: SignalReceiver) {
        info!("Reconciliation loop started");
        self.pull_logged().await;

        loop {
            match signals.recv_timeout(self.poll_interval).await {
                None => {
                    if self.stop_requested().await {
                        break;
                    }
                }
                Some(ChangeSignal::ShuttingDown) => break,
                Some(ChangeSignal::Changed) => {
                    let mut shutting_down = false;
                    while let Some(signal) = signals.try_recv() {
                        if signal == ChangeSignal::ShuttingDown {
                            shutting_down = true;
                            break;
                        }
                    }

                    self.push_logged().await;
                    self.pull_logged().await;

                    if shutting_down {
                        break;
                    }
                    tokio::time::sleep(self.churn_delay).await;
                }
            }
        }

        self.request_stop().await;
        info!("Reconciliation loop stopped");
    }
}
