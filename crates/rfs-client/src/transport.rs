//! SyncTransport trait for talking to the rfs server.
//!
//! Implementations:
//! - `TcpTransport`: one fresh TCP connection per request
//! - `MockTransport` (tests only): canned replies and call counters

use async_trait::async_trait;
use rfs_core::protocol::{read_message, write_message};
use rfs_core::{Message, MessageType, ProtocolError, Version};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::trace;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection to {addr} failed: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection to {0} timed out")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Unexpected reply: expected {expected:?}, got {got:?}")]
    UnexpectedReply {
        expected: MessageType,
        got: MessageType,
    },

    #[error("Server closed the connection before replying")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// The two requests a client can make.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Fetch the server's current `(version, content)`.
    async fn get(&self) -> Result<(Version, Vec<u8>)>;

    /// Submit `content` edited against `base_version`; returns the new version.
    async fn put(&self, base_version: Version, content: &[u8]) -> Result<Version>;
}

/// Opens a new connection for every request and closes it afterwards.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    /// Server address (e.g., "raspberrypi.local:9000")
    addr: String,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                Ok(stream)
            }
            Ok(Err(source)) => Err(TransportError::ConnectionFailed {
                addr: self.addr.clone(),
                source,
            }),
            Err(_) => Err(TransportError::Timeout(self.addr.clone())),
        }
    }

    /// Send one request and read exactly one reply.
    async fn round_trip(&self, request: Message) -> Result<Message> {
        let mut stream = self.connect().await?;
        let sent = request.msg_type();
        write_message(&mut stream, request).await?;
        let reply = read_message(&mut stream)
            .await?
            .ok_or(TransportError::Closed)?;
        trace!("{:?} -> {:?} via {}", sent, reply.msg_type(), self.addr);
        Ok(reply)
    }
}

#[async_trait]
impl SyncTransport for TcpTransport {
    async fn get(&self) -> Result<(Version, Vec<u8>)> {
        match self.round_trip(Message::Get).await? {
            Message::State { version, content } => Ok((version, content)),
            other => Err(TransportError::UnexpectedReply {
                expected: MessageType::State,
                got: other.msg_type(),
            }),
        }
    }

    async fn put(&self, base_version: Version, content: &[u8]) -> Result<Version> {
        let request = Message::Put {
            base_version,
            content: content.to_vec(),
        };
        match self.round_trip(request).await? {
            Message::Ok { version } => Ok(version),
            other => Err(TransportError::UnexpectedReply {
                expected: MessageType::Ok,
                got: other.msg_type(),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory stand-in for the server.
    ///
    /// Holds a `(version, content)` pair; `put` always accepts and bumps the
    /// version. Can be switched offline to make every call fail.
    #[derive(Default)]
    pub struct MockTransport {
        state: Mutex<(Version, Vec<u8>)>,
        offline: Mutex<bool>,
        pub gets: AtomicUsize,
        pub puts: AtomicUsize,
        last_put: Mutex<Option<(Version, Vec<u8>)>>,
    }

    impl MockTransport {
        pub fn with_state(version: Version, content: &[u8]) -> Self {
            let mock = Self::default();
            *mock.state.lock().unwrap() = (version, content.to_vec());
            mock
        }

        pub fn set_offline(&self, offline: bool) {
            *self.offline.lock().unwrap() = offline;
        }

        pub fn get_count(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }

        pub fn put_count(&self) -> usize {
            self.puts.load(Ordering::SeqCst)
        }

        pub fn last_put(&self) -> Option<(Version, Vec<u8>)> {
            self.last_put.lock().unwrap().clone()
        }

        fn check_online(&self) -> Result<()> {
            if *self.offline.lock().unwrap() {
                return Err(TransportError::Closed);
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SyncTransport for MockTransport {
        async fn get(&self) -> Result<(Version, Vec<u8>)> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            Ok(self.state.lock().unwrap().clone())
        }

        async fn put(&self, base_version: Version, content: &[u8]) -> Result<Version> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;
            *self.last_put.lock().unwrap() = Some((base_version, content.to_vec()));
            let mut state = self.state.lock().unwrap();
            state.0 += 1;
            state.1 = content.to_vec();
            Ok(state.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfs_core::protocol::encode;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Accept one connection, read one request, answer with `reply` bytes.
    async fn one_shot_server(reply: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_message(&mut stream).await;
            stream.write_all(&reply).await.unwrap();
        });
        addr
    }

    fn transport(addr: &str) -> TcpTransport {
        TcpTransport::new(addr, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_get_decodes_state() {
        let reply = Message::State {
            version: 7,
            content: b"seven".to_vec(),
        }
        .into_frame()
        .encode()
        .unwrap();
        let addr = one_shot_server(reply).await;

        assert_eq!(transport(&addr).get().await.unwrap(), (7, b"seven".to_vec()));
    }

    #[tokio::test]
    async fn test_put_decodes_ok() {
        let reply = Message::Ok { version: 4 }.into_frame().encode().unwrap();
        let addr = one_shot_server(reply).await;

        assert_eq!(transport(&addr).put(3, b"x").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_wrong_reply_type_is_rejected() {
        let reply = Message::Ok { version: 4 }.into_frame().encode().unwrap();
        let addr = one_shot_server(reply).await;

        let err = transport(&addr).get().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::UnexpectedReply {
                expected: MessageType::State,
                got: MessageType::Ok
            }
        ));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_protocol_error() {
        // OK with a 2-byte version
        let reply = encode(MessageType::Ok, &[0, 1]).unwrap();
        let addr = one_shot_server(reply).await;

        let err = transport(&addr).put(0, b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::Protocol(ProtocolError::State(_))));
    }

    #[tokio::test]
    async fn test_close_without_reply() {
        let addr = one_shot_server(Vec::new()).await;

        let err = transport(&addr).get().await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Grab a free port, then release it so nothing is listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = transport(&addr).get().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::ConnectionFailed { .. } | TransportError::Timeout(_)
        ));
    }
}
