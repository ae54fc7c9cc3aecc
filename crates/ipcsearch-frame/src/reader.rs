use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::code::ResponseCode;
use crate::codec::{decode_header, FrameConfig, Message, MessageHeader, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Reads messages from any `Read` stream.
///
/// Handles partial reads internally: callers always get complete headers
/// and payloads. Reads block without a timeout.
pub struct MessageReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Fill `buf` completely (blocking).
    ///
    /// A read of zero bytes means the pipe was closed and fails with
    /// [`FrameError::ConnectionClosed`].
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Read the next message header (blocking).
    pub fn read_header(&mut self) -> Result<MessageHeader> {
        let mut raw = [0u8; HEADER_SIZE];
        self.read_exact(&mut raw)?;
        let header = decode_header(&raw);
        debug!(code = header.code, size = header.size, "read message header");
        Ok(header)
    }

    /// Read a payload of `size` bytes following a header.
    pub fn read_payload(&mut self, size: u32) -> Result<Bytes> {
        let size = size as usize;
        if size > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.config.max_payload_size,
            });
        }
        let mut payload = BytesMut::zeroed(size);
        self.read_exact(&mut payload)?;
        Ok(payload.freeze())
    }

    /// Read one complete message of any code.
    pub fn read_message(&mut self) -> Result<Message> {
        let header = self.read_header()?;
        let payload = self.read_payload(header.size)?;
        Ok(Message {
            code: header.code,
            payload,
        })
    }

    /// Read one message of a response.
    ///
    /// Returns the payload and whether it was the final message. A failure
    /// status is returned as [`FrameError::Response`] after its payload has
    /// been drained. Zero-length payloads are legal; only the code decides
    /// whether more messages follow.
    pub fn read_chunk(&mut self) -> Result<(Bytes, bool)> {
        let message = self.read_message()?;
        match ResponseCode::from_u32(message.code) {
            ResponseCode::OkMoreData => Ok((message.payload, false)),
            ResponseCode::Ok => Ok((message.payload, true)),
            failure => Err(FrameError::Response(failure)),
        }
    }

    /// Read a whole response, concatenating the payloads of every message.
    pub fn read_response(&mut self) -> Result<Bytes> {
        let (first, mut last) = self.read_chunk()?;
        if last {
            return Ok(first);
        }

        let mut joined = BytesMut::from(first.as_ref());
        while !last {
            let (chunk, is_last) = self.read_chunk()?;
            joined.extend_from_slice(&chunk);
            last = is_last;
        }
        Ok(joined.freeze())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
