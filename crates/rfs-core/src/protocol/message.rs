//! Typed message bodies.
//!
//! Layouts (all integers big-endian):
//! - `GET`:   empty
//! - `PUT`:   `u32 base_version | u32 content_length | content`
//! - `STATE`: `u32 version | u32 content_length | content`
//! - `OK`:    `u32 new_version`

use super::frame::{read_frame, write_frame, Frame, MessageType};
use super::{Result, MAX_MSG};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Document version. 32 bits on the wire, everywhere.
pub type Version = u32;

const VERSION_LEN: usize = 4;
const VERSIONED_HEADER_LEN: usize = VERSION_LEN + 4;

/// Largest content a STATE (or PUT) frame can carry.
pub const MAX_CONTENT: usize = MAX_MSG as usize - 1 - VERSIONED_HEADER_LEN;

/// A frame body that does not match its declared shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("{msg_type:?} payload must be empty, got {len} bytes")]
    NotEmpty { msg_type: MessageType, len: usize },

    #[error("{msg_type:?} payload too short: {len} bytes")]
    TooShort { msg_type: MessageType, len: usize },

    #[error("{msg_type:?} payload declares {declared} content bytes but carries {actual}")]
    LengthMismatch {
        msg_type: MessageType,
        declared: usize,
        actual: usize,
    },

    #[error("OK payload must be 4 bytes, got {0}")]
    BadVersionWidth(usize),
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Get,
    Put { base_version: Version, content: Vec<u8> },
    State { version: Version, content: Vec<u8> },
    Ok { version: Version },
}

impl Message {
    pub fn msg_type(&self) -> MessageType {
        match self {
            Message::Get => MessageType::Get,
            Message::Put { .. } => MessageType::Put,
            Message::State { .. } => MessageType::State,
            Message::Ok { .. } => MessageType::Ok,
        }
    }

    /// Build the wire frame for this message.
    pub fn into_frame(self) -> Frame {
        let msg_type = self.msg_type();
        let payload = match self {
            Message::Get => Vec::new(),
            Message::Put {
                base_version,
                content,
            } => encode_versioned(base_version, &content),
            Message::State { version, content } => encode_versioned(version, &content),
            Message::Ok { version } => version.to_be_bytes().to_vec(),
        };
        Frame::new(msg_type, payload)
    }
}

impl TryFrom<Frame> for Message {
    type Error = StateError;

    fn try_from(frame: Frame) -> std::result::Result<Self, StateError> {
        let Frame { msg_type, payload } = frame;
        match msg_type {
            MessageType::Get => {
                if !payload.is_empty() {
                    return Err(StateError::NotEmpty {
                        msg_type,
                        len: payload.len(),
                    });
                }
                Ok(Message::Get)
            }
            MessageType::Put => {
                let (base_version, content) = decode_versioned(msg_type, payload)?;
                Ok(Message::Put {
                    base_version,
                    content,
                })
            }
            MessageType::State => {
                let (version, content) = decode_versioned(msg_type, payload)?;
                Ok(Message::State { version, content })
            }
            MessageType::Ok => {
                let bytes: [u8; VERSION_LEN] = payload
                    .as_slice()
                    .try_into()
                    .map_err(|_| StateError::BadVersionWidth(payload.len()))?;
                Ok(Message::Ok {
                    version: Version::from_be_bytes(bytes),
                })
            }
        }
    }
}

fn encode_versioned(version: Version, content: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(VERSIONED_HEADER_LEN + content.len());
    buf.extend_from_slice(&version.to_be_bytes());
    buf.extend_from_slice(&(content.len() as u32).to_be_bytes());
    buf.extend_from_slice(content);
    buf
}

/// Split `version | length | content`, requiring the declared length to
/// account for every remaining byte.
fn decode_versioned(
    msg_type: MessageType,
    mut payload: Vec<u8>,
) -> std::result::Result<(Version, Vec<u8>), StateError> {
    if payload.len() < VERSIONED_HEADER_LEN {
        return Err(StateError::TooShort {
            msg_type,
            len: payload.len(),
        });
    }

    let content = payload.split_off(VERSIONED_HEADER_LEN);
    let version = Version::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let declared = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]) as usize;

    if declared != content.len() {
        return Err(StateError::LengthMismatch {
            msg_type,
            declared,
            actual: content.len(),
        });
    }
    Ok((version, content))
}

/// Read and decode one message. `Ok(None)` means the peer closed cleanly.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    match read_frame(reader).await? {
        Some(frame) => Ok(Some(Message::try_from(frame)?)),
        None => Ok(None),
    }
}

/// Encode and write one message.
pub async fn write_message<W>(writer: &mut W, message: Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, &message.into_frame()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolError;

    #[test]
    fn test_put_layout() {
        let frame = Message::Put {
            base_version: 7,
            content: b"abc".to_vec(),
        }
        .into_frame();

        assert_eq!(frame.msg_type, MessageType::Put);
        assert_eq!(frame.payload, vec![0, 0, 0, 7, 0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_ok_layout_is_four_bytes() {
        let frame = Message::Ok { version: 0x0102_0304 }.into_frame();
        assert_eq!(frame.payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_state_with_empty_content() {
        let frame = Message::State {
            version: 0,
            content: Vec::new(),
        }
        .into_frame();
        assert_eq!(frame.payload.len(), 8);

        let msg = Message::try_from(frame).unwrap();
        assert_eq!(
            msg,
            Message::State {
                version: 0,
                content: Vec::new()
            }
        );
    }

    #[test]
    fn test_put_length_mismatch_rejected() {
        // Declares 5 content bytes, carries 3
        let payload = vec![0, 0, 0, 1, 0, 0, 0, 5, b'a', b'b', b'c'];
        let err = Message::try_from(Frame::new(MessageType::Put, payload)).unwrap_err();
        assert_eq!(
            err,
            StateError::LengthMismatch {
                msg_type: MessageType::Put,
                declared: 5,
                actual: 3
            }
        );
    }

    #[test]
    fn test_put_trailing_bytes_rejected() {
        let payload = vec![0, 0, 0, 1, 0, 0, 0, 1, b'a', b'z'];
        let err = Message::try_from(Frame::new(MessageType::Put, payload)).unwrap_err();
        assert!(matches!(err, StateError::LengthMismatch { declared: 1, actual: 2, .. }));
    }

    #[test]
    fn test_put_too_short_rejected() {
        let err = Message::try_from(Frame::new(MessageType::Put, vec![0, 0, 0])).unwrap_err();
        assert!(matches!(err, StateError::TooShort { len: 3, .. }));
    }

    #[test]
    fn test_get_with_payload_rejected() {
        let err = Message::try_from(Frame::new(MessageType::Get, vec![1])).unwrap_err();
        assert!(matches!(err, StateError::NotEmpty { len: 1, .. }));
    }

    #[test]
    fn test_ok_wrong_width_rejected() {
        // An 8-byte version field is not accepted
        let err = Message::try_from(Frame::new(MessageType::Ok, vec![0; 8])).unwrap_err();
        assert_eq!(err, StateError::BadVersionWidth(8));
    }

    #[tokio::test]
    async fn test_read_message_surfaces_state_error() {
        let bytes = crate::protocol::encode(MessageType::Ok, &[0, 1]).unwrap();
        let mut reader: &[u8] = &bytes;

        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, ProtocolError::State(StateError::BadVersionWidth(2))));
    }

    #[tokio::test]
    async fn test_write_then_read_message() {
        let mut buf = Vec::new();
        write_message(
            &mut buf,
            Message::Put {
                base_version: 3,
                content: b"body".to_vec(),
            },
        )
        .await
        .unwrap();

        let mut reader: &[u8] = &buf;
        let msg = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(
            msg,
            Message::Put {
                base_version: 3,
                content: b"body".to_vec()
            }
        );
    }

    #[test]
    fn test_max_content_fills_a_frame_exactly() {
        let fits = Message::State {
            version: 1,
            content: vec![0; MAX_CONTENT],
        };
        assert_eq!(fits.into_frame().encode().unwrap().len(), 4 + MAX_MSG as usize);

        let over = Message::State {
            version: 1,
            content: vec![0; MAX_CONTENT + 1],
        };
        assert!(matches!(
            over.into_frame().encode(),
            Err(ProtocolError::InvalidLength(_))
        ));
    }
}
