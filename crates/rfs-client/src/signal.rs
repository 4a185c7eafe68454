//! Bridge between the file watcher and the reconciliation loop.
//!
//! The watcher callback runs on notify's own thread, so the sending half must be
//! usable from plain synchronous code. Shutdown travels over the same channel so
//! a waiting loop wakes up for it instead of finding a flag on its next poll.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

/// Something the reconciliation loop should react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSignal {
    /// The local file may have changed
    Changed,
    /// The process is stopping
    ShuttingDown,
}

/// Create a connected sender/receiver pair.
pub fn channel() -> (SignalSender, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, SignalReceiver { rx })
}

/// Cloneable sending half. Never blocks.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<ChangeSignal>,
}

impl SignalSender {
    /// Report a possible local change. Dropped silently once the loop is gone.
    pub fn changed(&self) {
        if self.tx.send(ChangeSignal::Changed).is_err() {
            trace!("Change signal dropped, receiver gone");
        }
    }

    /// Ask the loop to stop.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ChangeSignal::ShuttingDown);
    }
}

/// Receiving half, owned by the reconciliation loop.
#[derive(Debug)]
pub struct SignalReceiver {
    rx: mpsc::UnboundedReceiver<ChangeSignal>,
}

impl SignalReceiver {
    /// Wait up to `timeout` for the next signal.
    ///
    /// Returns `None` on timeout. A channel whose senders are all gone reads as
    /// `ShuttingDown`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<ChangeSignal> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(signal)) => Some(signal),
            Ok(None) => Some(ChangeSignal::ShuttingDown),
            Err(_) => None,
        }
    }

    /// Take a signal that is already queued, without waiting.
    ///
    /// A closed channel reads as `ShuttingDown`.
    pub fn try_recv(&mut self) -> Option<ChangeSignal> {
        match self.rx.try_recv() {
            Ok(signal) => Some(signal),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => Some(ChangeSignal::ShuttingDown),
        }
    }
}
