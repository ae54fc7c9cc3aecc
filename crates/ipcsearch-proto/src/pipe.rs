use std::io::Read;

use bytes::Bytes;
use ipcsearch_frame::MessageReader;
use tracing::{debug, warn};

use crate::error::StreamError;
use crate::stream::Stream;

/// A response read lazily from the live pipe, one message at a time.
///
/// Only the current message payload is held; it is replaced when the next
/// message is read. The pipe is a one-pass resource: wrap this in a
/// [`PooledStream`](crate::pooled::PooledStream) to revisit earlier bytes.
///
/// Dropping the stream drains whatever is left of the response, so the
/// connection is ready for the next request.
pub struct PipeStream<'a, R: Read> {
    reader: &'a mut MessageReader<R>,
    chunk: Bytes,
    pos: usize,
    /// Bytes of the response before the current chunk.
    base: u64,
    got_last: bool,
    /// The message reader failed; nothing more can be read from the pipe.
    broken: bool,
    is_64bit: bool,
    error: Option<StreamError>,
}

impl<'a, R: Read> PipeStream<'a, R> {
    /// Start reading a response whose request has just been sent.
    pub fn new(reader: &'a mut MessageReader<R>, is_64bit: bool) -> Self {
        Self {
            reader,
            chunk: Bytes::new(),
            pos: 0,
            base: 0,
            got_last: false,
            broken: false,
            is_64bit,
            error: None,
        }
    }

    /// Whether the final message of the response has been read.
    pub fn got_last_chunk(&self) -> bool {
        self.got_last
    }

    /// Replace the current chunk with the next message payload.
    fn next_message(&mut self) -> bool {
        if self.got_last {
            self.fail(StreamError::UnexpectedEnd);
            return false;
        }
        match self.reader.read_chunk() {
            Ok((payload, last)) => {
                self.base += self.chunk.len() as u64;
                self.chunk = payload;
                self.pos = 0;
                self.got_last = last;
                true
            }
            Err(err) => {
                self.broken = true;
                self.fail(err.into());
                false
            }
        }
    }

    fn available(&self) -> usize {
        self.chunk.len() - self.pos
    }
}

impl<R: Read> Stream for PipeStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) {
        let mut filled = 0usize;
        while filled < buf.len() && self.error.is_none() {
            if self.available() == 0 {
                if !self.next_message() {
                    break;
                }
                continue;
            }
            let n = self.available().min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
            self.pos += n;
            filled += n;
        }
        buf[filled..].fill(0);
    }

    fn tell(&self) -> u64 {
        self.base + self.pos as u64
    }

    fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    fn fail(&mut self, err: StreamError) {
        if self.error.is_none() {
            warn!(error = %err, offset = self.tell(), "pipe stream failed");
            self.error = Some(err);
        }
    }

    fn is_64bit(&self) -> bool {
        self.is_64bit
    }

    fn read_chunk(&mut self, max: usize) -> Option<Bytes> {
        if max == 0 {
            return None;
        }
        while self.error.is_none() && self.available() == 0 {
            if self.got_last || !self.next_message() {
                return None;
            }
        }
        if self.error.is_some() {
            return None;
        }
        let n = self.available().min(max);
        let chunk = self.chunk.slice(self.pos..self.pos + n);
        self.pos += n;
        Some(chunk)
    }

    fn drain(&mut self) {
        let mut drained = 0u64;
        while !self.broken && !self.got_last {
            drained += self.available() as u64;
            self.pos = self.chunk.len();
            self.next_message();
        }
        drained += self.available() as u64;
        self.pos = self.chunk.len();
        if drained > 0 {
            debug!(drained, "drained unread response bytes");
        }
    }
}

impl<R: Read> Drop for PipeStream<'_, R> {
    fn drop(&mut self) {
        self.drain();
    }
}
