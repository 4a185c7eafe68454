//! rfs-client library: Exposes the client components for the binary and tests.
//!
//! - `signal`: change/shutdown channel between the watcher and the loop
//! - `watcher`: debounced notify watcher for the synced file
//! - `transport`: request/reply against the server
//! - `reconcile`: push/pull logic and the loop that drives it

pub mod config;
pub mod reconcile;
pub mod signal;
pub mod transport;
pub mod watcher;

// Re-export key types for convenience
pub use config::ClientConfig;
pub use reconcile::{ClientSyncState, PullOutcome, PushOutcome, ReconcileError, Reconciler};
pub use signal::{ChangeSignal, SignalReceiver, SignalSender};
pub use transport::{SyncTransport, TcpTransport, TransportError};
pub use watcher::{FileWatcher, WatchError};
