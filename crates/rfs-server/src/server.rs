//! TCP server accepting sync clients.
//!
//! Each accepted socket gets its own task in a `JoinSet`. Finished tasks are
//! reaped as the accept loop runs; on shutdown the server stops accepting,
//! tells every remaining connection to stop, and waits for all of them.

use crate::connection::{CloseReason, Connection};
use crate::document::Document;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Sync server owning the shared document.
pub struct SyncServer {
    document: Arc<Document>,
    /// Counter for generating connection IDs
    next_conn_id: u64,
}

impl SyncServer {
    pub fn new(document: Arc<Document>) -> Self {
        Self {
            document,
            next_conn_id: 1,
        }
    }

    /// Bind to an address and return the TCP listener.
    pub async fn bind(listen_addr: &str) -> io::Result<TcpListener> {
        let listener = TcpListener::bind(listen_addr).await?;
        info!("Sync server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept and serve connections until `shutdown` resolves.
    ///
    /// Returns once every connection task has finished.
    pub async fn run<F>(mut self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let conn_id = format!("conn-{}", self.next_conn_id);
                        self.next_conn_id += 1;
                        info!("New connection from {} ({})", addr, conn_id);

                        let conn = Connection::new(conn_id, stream, Arc::clone(&self.document));
                        let stop = stop_rx.clone();
                        connections.spawn(async move {
                            let conn_id = conn.id().to_string();
                            let reason = conn.serve(stop).await;
                            (conn_id, reason)
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },

                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    Self::on_closed(finished);
                }
            }
        }

        let _ = stop_tx.send(true);
        if !connections.is_empty() {
            info!("Waiting for {} connection(s) to finish", connections.len());
        }
        while let Some(finished) = connections.join_next().await {
            Self::on_closed(finished);
        }
        info!("All connections closed");
    }

    fn on_closed(finished: Result<(String, CloseReason), JoinError>) {
        match finished {
            Ok((conn_id, reason)) if reason.is_clean() => {
                debug!("Connection {} closed: {}", conn_id, reason);
            }
            Ok((conn_id, reason)) => {
                warn!("Connection {} dropped: {}", conn_id, reason);
            }
            Err(e) => {
                error!("Connection task failed: {}", e);
            }
        }
    }
}
