//! Byte streams over a response.
//!
//! A [`Stream`] never fails per call: the first problem is recorded as a
//! sticky [`StreamError`] and every later read returns zero-filled bytes, so
//! a decode loop can always finish a record with the right shape and check
//! [`Stream::error`] once at the end.

use bytes::Bytes;
use ipcsearch_frame::decode_len_vlq;

use crate::error::StreamError;

const SKIP_SCRATCH: usize = 256;
const READ_VEC_STEP: usize = 64 * 1024;

/// Ordered byte source with a read position and a sticky error.
pub trait Stream {
    /// Fill `buf`. Bytes that cannot be supplied are zeroed and the sticky
    /// error is set.
    fn read(&mut self, buf: &mut [u8]);

    /// Absolute offset of the read position from the start of the response.
    fn tell(&self) -> u64;

    /// The sticky error, if one was recorded.
    fn error(&self) -> Option<&StreamError>;

    /// Record `err` unless an error is already recorded.
    fn fail(&mut self, err: StreamError);

    /// Whether native-size fields are 8 bytes wide (else 4).
    fn is_64bit(&self) -> bool;

    /// Take up to `max` bytes that are next in the stream as one buffer.
    ///
    /// Returns `None` at the end of the response or after an error; never
    /// returns an empty buffer.
    fn read_chunk(&mut self, max: usize) -> Option<Bytes>;

    /// Consume whatever is left of the response.
    fn drain(&mut self) {}

    fn is_error(&self) -> bool {
        self.error().is_some()
    }

    /// Discard `n` bytes.
    fn skip(&mut self, mut n: u64) {
        let mut scratch = [0u8; SKIP_SCRATCH];
        while n > 0 && !self.is_error() {
            let step = n.min(SKIP_SCRATCH as u64) as usize;
            self.read(&mut scratch[..step]);
            n -= step as u64;
        }
    }

    fn read_u8(&mut self) -> u8 {
        let mut b = [0u8; 1];
        self.read(&mut b);
        b[0]
    }

    fn read_u16(&mut self) -> u16 {
        let mut b = [0u8; 2];
        self.read(&mut b);
        u16::from_le_bytes(b)
    }

    fn read_u32(&mut self) -> u32 {
        let mut b = [0u8; 4];
        self.read(&mut b);
        u32::from_le_bytes(b)
    }

    fn read_u64(&mut self) -> u64 {
        let mut b = [0u8; 8];
        self.read(&mut b);
        u64::from_le_bytes(b)
    }

    /// Little-endian unsigned integer of 1, 2, 4 or 8 bytes.
    fn read_uint(&mut self, width: usize) -> u64 {
        match width {
            1 => u64::from(self.read_u8()),
            2 => u64::from(self.read_u16()),
            4 => u64::from(self.read_u32()),
            _ => self.read_u64(),
        }
    }

    /// Native-size field.
    fn read_size(&mut self) -> u64 {
        if self.is_64bit() {
            self.read_u64()
        } else {
            u64::from(self.read_u32())
        }
    }

    /// VLQ length. On overflow the sticky error is set and `u64::MAX` returned.
    fn read_len_vlq(&mut self) -> u64 {
        let max = native_size_max(self.is_64bit());
        match decode_len_vlq(|width| self.read_uint(width), max) {
            Some(len) => len,
            None => {
                self.fail(StreamError::LengthOverflow);
                u64::MAX
            }
        }
    }

    /// Read `len` bytes into a new buffer.
    ///
    /// Grows in steps so a corrupt length cannot force a huge allocation;
    /// stops early once the sticky error is set.
    fn read_vec(&mut self, len: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(len.min(READ_VEC_STEP as u64) as usize);
        let mut left = len;
        while left > 0 && !self.is_error() {
            let step = left.min(READ_VEC_STEP as u64) as usize;
            let start = out.len();
            out.resize(start + step, 0);
            self.read(&mut out[start..]);
            left -= step as u64;
        }
        out
    }

    /// VLQ-length-prefixed UTF-8 string.
    fn read_string(&mut self) -> String {
        let len = self.read_len_vlq();
        let bytes = self.read_vec(len);
        String::from_utf8(bytes).unwrap_or_else(|err| {
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        })
    }
}

/// Streams that retain what they have read and can reposition.
pub trait SeekableStream: Stream {
    /// Move the read position to an absolute offset.
    ///
    /// Fails, setting the sticky error, when the offset lies beyond the end
    /// of the response.
    fn seek(&mut self, offset: u64) -> Result<(), StreamError>;
}

/// Largest length a decoder with the given native size accepts.
pub fn native_size_max(is_64bit: bool) -> u64 {
    let host = usize::MAX as u64;
    if is_64bit {
        host
    } else {
        host.min(u64::from(u32::MAX))
    }
}

/// A response already held in memory.
#[derive(Debug, Clone)]
pub struct BufferStream {
    data: Bytes,
    pos: usize,
    is_64bit: bool,
    error: Option<StreamError>,
}

impl BufferStream {
    pub fn new(data: impl Into<Bytes>, is_64bit: bool) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            is_64bit,
            error: None,
        }
    }

    /// Bytes left after the read position.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Stream for BufferStream {
    fn read(&mut self, buf: &mut [u8]) {
        if self.error.is_some() {
            buf.fill(0);
            return;
        }
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        if n < buf.len() {
            buf[n..].fill(0);
            self.fail(StreamError::UnexpectedEnd);
        }
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    fn fail(&mut self, err: StreamError) {
        if self.error.is_none() {
            tracing::warn!(error = %err, "buffer stream failed");
            self.error = Some(err);
        }
    }

    fn is_64bit(&self) -> bool {
        self.is_64bit
    }

    fn read_chunk(&mut self, max: usize) -> Option<Bytes> {
        if self.error.is_some() || self.remaining() == 0 || max == 0 {
            return None;
        }
        let n = max.min(self.remaining());
        let chunk = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Some(chunk)
    }

    fn drain(&mut self) {
        self.pos = self.data.len();
    }

    fn skip(&mut self, n: u64) {
        if self.error.is_some() {
            return;
        }
        if n > self.remaining() as u64 {
            self.pos = self.data.len();
            self.fail(StreamError::UnexpectedEnd);
        } else {
            self.pos += n as usize;
        }
    }
}

impl SeekableStream for BufferStream {
    fn seek(&mut self, offset: u64) -> Result<(), StreamError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if offset > self.data.len() as u64 {
            self.fail(StreamError::SeekOutOfRange(offset));
            return Err(StreamError::SeekOutOfRange(offset));
        }
        self.pos = offset as usize;
        Ok(())
    }
}
