//! Length-prefixed framing.
//!
//! A frame is `[u32 BE length][u8 type][payload]` where `length` counts the
//! type byte plus the payload. The decoder validates the length before it
//! allocates anything, so a hostile header cannot make us reserve 4 GiB.

use super::{ProtocolError, Result, MAX_MSG};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix plus the type byte.
pub const HEADER_LEN: usize = 5;

/// Message type byte carried in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Client asks for the current document
    Get = 0x01,
    /// Client submits new content against a base version
    Put = 0x02,
    /// Server replies with version + content
    State = 0x11,
    /// Server acknowledges a PUT with the new version
    Ok = 0x12,
}

impl MessageType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Self::Get),
            0x02 => Ok(Self::Put),
            0x11 => Ok(Self::State),
            0x12 => Ok(Self::Ok),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

/// One protocol message as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: MessageType,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(msg_type: MessageType, payload: Vec<u8>) -> Self {
        Self { msg_type, payload }
    }

    /// Encode this frame into a single contiguous buffer.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.msg_type, &self.payload)
    }
}

/// Compute the length prefix for a payload, rejecting anything over `MAX_MSG`.
fn frame_length(payload_len: usize) -> Result<u32> {
    let length = payload_len as u64 + 1;
    if length > MAX_MSG as u64 {
        return Err(ProtocolError::InvalidLength(length));
    }
    Ok(length as u32)
}

/// Encode `[length][type][payload]` into a new buffer.
pub fn encode(msg_type: MessageType, payload: &[u8]) -> Result<Vec<u8>> {
    let length = frame_length(payload.len())?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&length.to_be_bytes());
    buf.push(msg_type.as_u8());
    buf.extend_from_slice(payload);
    Ok(buf)
}

fn eof_as_truncated(e: io::Error) -> ProtocolError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ProtocolError::TruncatedFrame
    } else {
        ProtocolError::Io(e)
    }
}

/// Read one frame from the stream.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between frames.
/// End-of-stream after the first byte of a frame is `TruncatedFrame`.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::TruncatedFrame);
        }
        filled += n;
    }

    let length = u32::from_be_bytes(len_buf);
    if length == 0 || length > MAX_MSG {
        return Err(ProtocolError::InvalidLength(length as u64));
    }

    let type_byte = reader.read_u8().await.map_err(eof_as_truncated)?;

    let mut payload = vec![0u8; (length - 1) as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(eof_as_truncated)?;

    let msg_type = MessageType::try_from(type_byte)?;
    Ok(Some(Frame { msg_type, payload }))
}

/// Write one frame and flush the stream.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let length = frame_length(frame.payload.len())?;

    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(&length.to_be_bytes());
    header[4] = frame.msg_type.as_u8();

    writer.write_all(&header).await?;
    if !frame.payload.is_empty() {
        writer.write_all(&frame.payload).await?;
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [MessageType; 4] = [
        MessageType::Get,
        MessageType::Put,
        MessageType::State,
        MessageType::Ok,
    ];

    async fn decode(bytes: &[u8]) -> Result<Option<Frame>> {
        let mut reader = bytes;
        read_frame(&mut reader).await
    }

    #[tokio::test]
    async fn test_roundtrip_boundary_lengths() {
        let max_payload = (MAX_MSG - 1) as usize;
        for msg_type in ALL_TYPES {
            for len in [0, 1, max_payload] {
                let payload = vec![0xAB; len];
                let bytes = encode(msg_type, &payload).unwrap();
                assert_eq!(bytes.len(), HEADER_LEN + len);

                let frame = decode(&bytes).await.unwrap().unwrap();
                assert_eq!(frame.msg_type, msg_type);
                assert_eq!(frame.payload.len(), len);
                assert_eq!(frame.payload, payload);
            }
        }
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(MessageType::Put, b"hi").unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 3, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_MSG as usize];
        let err = encode(MessageType::State, &payload).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidLength(len) if len == MAX_MSG as u64 + 1));
    }

    #[tokio::test]
    async fn test_oversized_header_rejected_before_reading_payload() {
        let mut bytes = (MAX_MSG + 1).to_be_bytes().to_vec();
        bytes.extend_from_slice(b"rest");

        let mut reader: &[u8] = &bytes;
        let err = read_frame(&mut reader).await.unwrap_err();

        assert!(matches!(err, ProtocolError::InvalidLength(len) if len == MAX_MSG as u64 + 1));
        // Nothing past the length prefix was consumed
        assert_eq!(reader, b"rest");
    }

    #[tokio::test]
    async fn test_zero_length_rejected() {
        let err = decode(&[0, 0, 0, 0, 0x01]).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidLength(0)));
    }

    #[tokio::test]
    async fn test_clean_close_between_frames() {
        assert!(decode(&[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_inside_length_prefix() {
        let err = decode(&[0, 0]).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedFrame));
    }

    #[tokio::test]
    async fn test_truncated_inside_payload() {
        let mut bytes = encode(MessageType::State, b"hello").unwrap();
        bytes.truncate(bytes.len() - 2);

        let err = decode(&bytes).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedFrame));
    }

    #[tokio::test]
    async fn test_truncated_before_type_byte() {
        let err = decode(&[0, 0, 0, 1]).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedFrame));
    }

    #[tokio::test]
    async fn test_unknown_type_is_reported() {
        let err = decode(&[0, 0, 0, 2, 0x7F, 0x00]).await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(0x7F)));
    }

    #[tokio::test]
    async fn test_consecutive_frames_on_one_stream() {
        let mut bytes = encode(MessageType::Get, &[]).unwrap();
        bytes.extend(encode(MessageType::Ok, &[0, 0, 0, 9]).unwrap());

        let mut reader: &[u8] = &bytes;
        let first = read_frame(&mut reader).await.unwrap().unwrap();
        let second = read_frame(&mut reader).await.unwrap().unwrap();
        let end = read_frame(&mut reader).await.unwrap();

        assert_eq!(first.msg_type, MessageType::Get);
        assert_eq!(second.payload, vec![0, 0, 0, 9]);
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_write_frame_matches_encode() {
        let frame = Frame::new(MessageType::State, b"content".to_vec());

        let mut out = Vec::new();
        write_frame(&mut out, &frame).await.unwrap();

        assert_eq!(out, frame.encode().unwrap());
    }
}
