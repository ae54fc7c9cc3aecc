use bytes::Bytes;
use tracing::{trace, warn};

use crate::error::StreamError;
use crate::stream::{SeekableStream, Stream};

/// Largest chunk pulled from the source in one go.
const PULL_CHUNK_MAX: usize = 64 * 1024;

/// A stream that keeps every chunk it pulls from its source.
///
/// Reading serves retained chunks and pulls one more chunk from the source
/// only when the cursor runs past the retained data. Seeking anywhere in
/// retained data is free; seeking ahead pulls until the offset is reached.
///
/// The pooled stream owns its source, so the source outlives it.
pub struct PooledStream<S> {
    source: S,
    chunks: Vec<Bytes>,
    /// Absolute offset of each retained chunk.
    starts: Vec<u64>,
    /// Total retained bytes.
    len: u64,
    chunk_index: usize,
    chunk_offset: usize,
    source_done: bool,
    error: Option<StreamError>,
}

impl<S: Stream> PooledStream<S> {
    /// Wrap a source positioned at the start of the response.
    pub fn new(source: S) -> Self {
        Self {
            source,
            chunks: Vec::new(),
            starts: Vec::new(),
            len: 0,
            chunk_index: 0,
            chunk_offset: 0,
            source_done: false,
            error: None,
        }
    }

    /// Number of retained chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total bytes pulled from the source so far.
    pub fn retained_len(&self) -> u64 {
        self.len
    }

    /// Borrow the source stream.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Release the retained chunks and return the source.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Pull one more chunk from the source. Returns false when the source is
    /// exhausted or failed.
    fn pull(&mut self) -> bool {
        if self.source_done {
            return false;
        }
        match self.source.read_chunk(PULL_CHUNK_MAX) {
            Some(chunk) => {
                trace!(
                    chunk = self.chunks.len(),
                    size = chunk.len(),
                    offset = self.len,
                    "pulled chunk"
                );
                self.starts.push(self.len);
                self.len += chunk.len() as u64;
                self.chunks.push(chunk);
                true
            }
            None => {
                self.source_done = true;
                if let Some(err) = self.source.error() {
                    let err = err.clone();
                    self.fail(err);
                }
                false
            }
        }
    }

    /// Bytes left in the current chunk.
    fn available(&self) -> usize {
        self.chunks
            .get(self.chunk_index)
            .map_or(0, |chunk| chunk.len() - self.chunk_offset)
    }

    /// Move the cursor to the next chunk, pulling one if needed.
    fn advance_chunk(&mut self) -> bool {
        if self.chunk_index + 1 < self.chunks.len() {
            self.chunk_index += 1;
            self.chunk_offset = 0;
            return true;
        }
        if !self.pull() {
            return false;
        }
        self.chunk_index = self.chunks.len() - 1;
        self.chunk_offset = 0;
        true
    }
}

impl<S: Stream> Stream for PooledStream<S> {
    fn read(&mut self, buf: &mut [u8]) {
        let mut filled = 0usize;
        while filled < buf.len() && self.error.is_none() {
            let available = self.available();
            if available == 0 {
                if !self.advance_chunk() {
                    self.fail(StreamError::UnexpectedEnd);
                    break;
                }
                continue;
            }
            let n = available.min(buf.len() - filled);
            let chunk = &self.chunks[self.chunk_index];
            buf[filled..filled + n]
                .copy_from_slice(&chunk[self.chunk_offset..self.chunk_offset + n]);
            self.chunk_offset += n;
            filled += n;
        }
        buf[filled..].fill(0);
    }

    fn tell(&self) -> u64 {
        self.starts
            .get(self.chunk_index)
            .map_or(0, |start| start + self.chunk_offset as u64)
    }

    fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    fn fail(&mut self, err: StreamError) {
        if self.error.is_none() {
            warn!(error = %err, offset = self.tell(), "pooled stream failed");
            self.error = Some(err);
        }
    }

    fn is_64bit(&self) -> bool {
        self.source.is_64bit()
    }

    fn read_chunk(&mut self, max: usize) -> Option<Bytes> {
        if max == 0 {
            return None;
        }
        while self.error.is_none() && self.available() == 0 {
            if !self.advance_chunk() {
                return None;
            }
        }
        if self.error.is_some() {
            return None;
        }
        let n = self.available().min(max);
        let chunk = self.chunks[self.chunk_index].slice(self.chunk_offset..self.chunk_offset + n);
        self.chunk_offset += n;
        Some(chunk)
    }

    fn drain(&mut self) {
        self.source.drain();
        self.source_done = true;
    }

    fn skip(&mut self, n: u64) {
        let target = self.tell().saturating_add(n);
        if self.seek(target).is_err() {
            // Leave the cursor at the end of everything retained.
            self.chunk_index = self.chunks.len().saturating_sub(1);
            self.chunk_offset = self.chunks.last().map_or(0, Bytes::len);
        }
    }
}

impl<S: Stream> SeekableStream for PooledStream<S> {
    fn seek(&mut self, offset: u64) -> Result<(), StreamError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        while offset > self.len {
            if !self.pull() {
                let err = self
                    .error
                    .clone()
                    .unwrap_or(StreamError::SeekOutOfRange(offset));
                self.fail(err.clone());
                return Err(err);
            }
        }
        if self.chunks.is_empty() {
            // offset == 0 on an empty response
            self.chunk_index = 0;
            self.chunk_offset = 0;
            return Ok(());
        }

        // Last chunk starting at or before the offset; an offset equal to
        // the retained length lands at the end of the last chunk.
        let index = self.starts.partition_point(|start| *start <= offset) - 1;
        let index = if offset == self.len {
            self.chunks.len() - 1
        } else {
            index
        };
        self.chunk_index = index;
        self.chunk_offset = (offset - self.starts[index]) as usize;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::BufferStream;

    /// A source that hands out chunks of a fixed size.
    struct Chunked {
        inner: BufferStream,
        size: usize,
        pulls: usize,
    }

    impl Chunked {
        fn new(data: Vec<u8>, size: usize) -> Self {
            Self {
                inner: BufferStream::new(data, true),
                size,
                pulls: 0,
            }
        }
    }

    impl Stream for Chunked {
        fn read(&mut self, buf: &mut [u8]) {
            self.inner.read(buf)
        }
        fn tell(&self) -> u64 {
            self.inner.tell()
        }
        fn error(&self) -> Option<&StreamError> {
            self.inner.error()
        }
        fn fail(&mut self, err: StreamError) {
            self.inner.fail(err)
        }
        fn is_64bit(&self) -> bool {
            true
        }
        fn read_chunk(&mut self, max: usize) -> Option<Bytes> {
            self.pulls += 1;
            self.inner.read_chunk(max.min(self.size))
        }
    }

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 253) as u8).collect()
    }

    #[test]
    fn replay_after_seek_to_start() {
        for k in [0usize, 1, 7, 10, 64, 99, 100] {
            let mut pooled = PooledStream::new(Chunked::new(data(100), 10));
            let mut first = vec![0u8; k];
            pooled.read(&mut first);
            assert_eq!(pooled.tell(), k as u64);

            pooled.seek(0).unwrap();
            let mut second = vec![0u8; k];
            pooled.read(&mut second);

            assert_eq!(first, second, "k = {k}");
            assert_eq!(first, data(100)[..k].to_vec());
            assert_eq!(pooled.tell(), k as u64);
            assert!(!pooled.is_error());
        }
    }

    #[test]
    fn chunks_are_pulled_lazily_and_once() {
        let mut pooled = PooledStream::new(Chunked::new(data(100), 10));
        let mut buf = [0u8; 25];
        pooled.read(&mut buf);
        assert_eq!(pooled.chunk_count(), 3);

        pooled.seek(5).unwrap();
        pooled.read(&mut buf);
        assert_eq!(pooled.chunk_count(), 3);
        assert_eq!(pooled.get_ref().pulls, 3);
        assert_eq!(pooled.tell(), 30);
    }

    #[test]
    fn seek_ahead_pulls_until_reached() {
        let mut pooled = PooledStream::new(Chunked::new(data(100), 10));
        pooled.seek(55).unwrap();
        assert_eq!(pooled.tell(), 55);
        assert_eq!(pooled.read_u8(), 55);
        assert_eq!(pooled.retained_len(), 60);
    }

    #[test]
    fn seek_to_chunk_boundaries() {
        let mut pooled = PooledStream::new(Chunked::new(data(30), 10));
        pooled.seek(30).unwrap();
        assert_eq!(pooled.tell(), 30);

        pooled.seek(10).unwrap();
        assert_eq!(pooled.tell(), 10);
        assert_eq!(pooled.read_u8(), 10);

        pooled.seek(20).unwrap();
        assert_eq!(pooled.read_u8(), 20);
    }

    #[test]
    fn seek_beyond_end_fails_sticky() {
        let mut pooled = PooledStream::new(Chunked::new(data(30), 10));
        let err = pooled.seek(31).unwrap_err();
        assert!(matches!(err, StreamError::SeekOutOfRange(31)));
        assert!(pooled.is_error());
        assert!(pooled.seek(0).is_err());
    }

    #[test]
    fn read_past_end_zero_fills() {
        let mut pooled = PooledStream::new(Chunked::new(data(5), 10));
        let mut buf = [0xFFu8; 8];
        pooled.read(&mut buf);
        assert_eq!(buf, [0, 1, 2, 3, 4, 0, 0, 0]);
        assert!(matches!(pooled.error(), Some(StreamError::UnexpectedEnd)));
    }

    #[test]
    fn skip_then_read() {
        let mut pooled = PooledStream::new(Chunked::new(data(100), 7));
        pooled.skip(50);
        assert_eq!(pooled.read_u8(), 50);
        pooled.skip(60);
        assert!(pooled.is_error());
    }

    #[test]
    fn empty_source() {
        let mut pooled = PooledStream::new(Chunked::new(Vec::new(), 10));
        pooled.seek(0).unwrap();
        assert_eq!(pooled.tell(), 0);
        assert_eq!(pooled.read_u8(), 0);
        assert!(pooled.is_error());
    }

    #[test]
    fn read_chunk_replays_retained_data() {
        let mut pooled = PooledStream::new(Chunked::new(data(20), 8));
        let a = pooled.read_chunk(100).unwrap();
        let b = pooled.read_chunk(100).unwrap();
        assert_eq!((a.len(), b.len()), (8, 8));

        pooled.seek(4).unwrap();
        assert_eq!(pooled.read_chunk(100).unwrap().as_ref(), &data(20)[4..8]);
    }
}
