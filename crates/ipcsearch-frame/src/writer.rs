use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{encode_message, FrameConfig};
use crate::error::{FrameError, Result};

/// Requests are small; the buffer grows for the rare large one.
const REQUEST_BUFFER_CAPACITY: usize = 1024;

/// Sends one request message at a time over a `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> MessageWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(REQUEST_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode `payload` under `code`, write all of it and flush.
    ///
    /// A short write continues from where it stopped. A write of zero bytes
    /// means the service hung up. Any other failure is returned without
    /// retrying, since the service may have seen part of the message.
    pub fn send(&mut self, code: u32, payload: &[u8]) -> Result<()> {
        let max = self.config.max_payload_size;
        if payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }

        self.buf.clear();
        encode_message(code, payload, &mut self.buf)?;
        debug!(code, size = payload.len(), "sending message");

        let mut rest = &self.buf[..];
        while !rest.is_empty() {
            match self.inner.write(rest) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => rest = &rest[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
