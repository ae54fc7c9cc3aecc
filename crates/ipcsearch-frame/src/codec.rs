use bytes::{BufMut, Bytes, BytesMut};

use crate::code::ResponseCode;
use crate::error::{FrameError, Result};

/// Message header: code (4) + size (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Default maximum payload size accepted in one message: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Header of one message on the pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Command code (outbound) or response code (inbound).
    pub code: u32,
    /// Payload size in bytes.
    pub size: u32,
}

impl MessageHeader {
    /// Interpret the code as a response status.
    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::from_u32(self.code)
    }
}

/// A complete message.
#[derive(Debug, Clone)]
pub struct Message {
    pub code: u32,
    pub payload: Bytes,
}

impl Message {
    pub fn new(code: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    /// The total wire size of this message (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a message into the wire format.
///
/// ```text
/// ┌──────────────┬──────────────┬─────────────────┐
/// │ Code (4B LE) │ Size (4B LE) │ Payload          │
/// │              │              │ (Size bytes)     │
/// └──────────────┴──────────────┴─────────────────┘
/// ```
pub fn encode_message(code: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let size = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le(code);
    dst.put_u32_le(size);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a message header.
pub fn decode_header(src: &[u8; HEADER_SIZE]) -> MessageHeader {
    let [c0, c1, c2, c3, s0, s1, s2, s3] = *src;
    MessageHeader {
        code: u32::from_le_bytes([c0, c1, c2, c3]),
        size: u32::from_le_bytes([s0, s1, s2, s3]),
    }
}

/// Configuration for message reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size of a single message. Default: 64 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let mut buf = BytesMut::new();
        encode_message(7, b"abc", &mut buf).unwrap();

        assert_eq!(
            buf.as_ref(),
            &[7, 0, 0, 0, 3, 0, 0, 0, b'a', b'b', b'c'][..]
        );
    }

    #[test]
    fn test_header_roundtrip() {
        let mut buf = BytesMut::new();
        encode_message(ResponseCode::OK_MORE_DATA, &[0u8; 300], &mut buf).unwrap();

        let header = decode_header(buf[..HEADER_SIZE].try_into().unwrap());
        assert_eq!(header.code, 100);
        assert_eq!(header.size, 300);
        assert_eq!(header.response_code(), ResponseCode::OkMoreData);
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_message(200, b"", &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
    }

    #[test]
    fn test_message_wire_size() {
        let msg = Message::new(1, Bytes::from_static(b"test"));
        assert_eq!(msg.wire_size(), HEADER_SIZE + 4);
    }
}
