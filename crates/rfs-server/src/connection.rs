//! Individual client connection handling.
//!
//! Each accepted socket is served by one `Connection` running in its own task.
//! The connection reads a frame, dispatches it against the shared document,
//! writes the reply, and repeats until the client goes away or something
//! goes wrong. Any failure closes only this connection.

use crate::document::{Document, DocumentError};
use rfs_core::protocol::{read_message, write_message};
use rfs_core::{Message, MessageType, ProtocolError};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Why a connection stopped being served.
#[derive(Debug)]
pub enum CloseReason {
    /// Client closed the socket between frames
    PeerClosed,
    /// Server is shutting down
    Shutdown,
    /// Bad frame or payload from the client
    Protocol(ProtocolError),
    /// Client sent a server-only message type
    Unexpected(MessageType),
    /// The document could not apply a PUT
    Document(DocumentError),
    /// Reply could not be written
    Write(ProtocolError),
}

impl CloseReason {
    /// Whether this is an ordinary end of a session rather than a failure.
    pub fn is_clean(&self) -> bool {
        matches!(self, CloseReason::PeerClosed | CloseReason::Shutdown)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed"),
            CloseReason::Shutdown => write!(f, "server shutting down"),
            CloseReason::Protocol(e) => write!(f, "protocol error: {}", e),
            CloseReason::Unexpected(t) => write!(f, "unexpected message type {:?}", t),
            CloseReason::Document(e) => write!(f, "{}", e),
            CloseReason::Write(e) => write!(f, "write failed: {}", e),
        }
    }
}

/// A single client connection.
pub struct Connection<S> {
    /// Connection ID assigned by the server (e.g., "conn-1")
    conn_id: String,
    stream: S,
    document: Arc<Document>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(conn_id: String, stream: S, document: Arc<Document>) -> Self {
        Self {
            conn_id,
            stream,
            document,
        }
    }

    pub fn id(&self) -> &str {
        &self.conn_id
    }

    /// Serve requests until the client leaves, an error occurs, or `stop` fires.
    ///
    /// `stop` is only observed while waiting for the next frame; a request that
    /// has been read is always answered (or fails) before it is checked again.
    /// The stream is dropped, closing the socket, when this returns.
    pub async fn serve(mut self, mut stop: watch::Receiver<bool>) -> CloseReason {
        loop {
            let next = tokio::select! {
                biased;
                _ = stop.changed() => return CloseReason::Shutdown,
                next = read_message(&mut self.stream) => next,
            };

            let request = match next {
                Ok(Some(request)) => request,
                Ok(None) => return CloseReason::PeerClosed,
                Err(e) => return CloseReason::Protocol(e),
            };

            let reply = match self.dispatch(request).await {
                Ok(reply) => reply,
                Err(reason) => return reason,
            };

            if let Err(e) = write_message(&mut self.stream, reply).await {
                return CloseReason::Write(e);
            }
        }
    }

    async fn dispatch(&self, request: Message) -> Result<Message, CloseReason> {
        match request {
            Message::Get => {
                let (version, content) = self.document.get().await;
                trace!("{}: GET -> version {}", self.conn_id, version);
                Ok(Message::State { version, content })
            }
            Message::Put {
                base_version,
                content,
            } => {
                let version = self
                    .document
                    .put(base_version, &content)
                    .await
                    .map_err(CloseReason::Document)?;
                debug!(
                    "{}: PUT base {} ({} bytes) -> version {}",
                    self.conn_id,
                    base_version,
                    content.len(),
                    version
                );
                Ok(Message::Ok { version })
            }
            other => Err(CloseReason::Unexpected(other.msg_type())),
        }
    }
}
