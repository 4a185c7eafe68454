//! Wire protocol shared by server and client.
//!
//! Every message on the socket is one frame:
//! `[u32 big-endian length][u8 type][payload; length - 1]`.
//! - `frame`: raw framing, length validation, and stream I/O
//! - `message`: typed views over the four frame bodies (GET, PUT, STATE, OK)

pub mod frame;
pub mod message;

use thiserror::Error;

pub use frame::{encode, read_frame, write_frame, Frame, MessageType, HEADER_LEN};
pub use message::{read_message, write_message, Message, StateError, Version, MAX_CONTENT};

/// Maximum frame length (type byte + payload), 8 MiB.
pub const MAX_MSG: u32 = 8 * 1024 * 1024;

/// Errors raised while reading or writing frames.
///
/// Every variant is fatal to the connection it occurred on.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid frame length: {0}")]
    InvalidLength(u64),

    #[error("connection closed mid-frame")]
    TruncatedFrame,

    #[error("unknown message type: 0x{0:02x}")]
    UnknownType(u8),

    #[error("malformed payload: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
