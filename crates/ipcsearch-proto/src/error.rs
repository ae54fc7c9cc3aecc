use std::sync::Arc;

use ipcsearch_frame::FrameError;

/// Sticky error recorded by a [`Stream`](crate::stream::Stream).
///
/// The first error wins; reads after it return zero-filled data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// Reading the next message of the response failed.
    #[error(transparent)]
    Frame(Arc<FrameError>),

    /// A read went past the final message of the response.
    #[error("read past the end of the response")]
    UnexpectedEnd,

    /// A VLQ length does not fit the native size of the decoder.
    #[error("encoded length does not fit the native size type")]
    LengthOverflow,

    /// A variant value carries a sub-type with no known width.
    #[error("unknown variant value type {0:#04x}")]
    UnknownVariantType(u8),

    /// A seek target lies beyond the end of the response.
    #[error("seek to offset {0} is beyond the end of the response")]
    SeekOutOfRange(u64),

    /// A result index outside the transferred viewport was requested.
    #[error("result index {index} is outside the viewport ({count} results)")]
    IndexOutOfRange { index: u64, count: u64 },
}

impl StreamError {
    /// The framing error behind this stream error, if any.
    pub fn frame_error(&self) -> Option<&FrameError> {
        match self {
            StreamError::Frame(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<FrameError> for StreamError {
    fn from(err: FrameError) -> Self {
        StreamError::Frame(Arc::new(err))
    }
}

/// Errors returned by [`Client`](crate::client::Client) operations.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// Connecting to the service failed.
    #[error("transport error: {0}")]
    Transport(#[from] ipcsearch_transport::TransportError),

    /// Sending a request or reading a scalar reply failed.
    #[error("ipc error: {0}")]
    Frame(#[from] FrameError),

    /// Decoding a result list failed.
    #[error("ipc error: {0}")]
    Stream(#[from] StreamError),

    /// The request cannot be encoded.
    #[error("invalid request: {0}")]
    Request(String),

    /// A scalar reply had the wrong size.
    #[error("unexpected {command} reply ({got} bytes, expected {expected})")]
    UnexpectedPayload {
        command: &'static str,
        expected: usize,
        got: usize,
    },
}

impl ProtoError {
    /// The framing error behind this error, looking through stream errors.
    pub fn frame_error(&self) -> Option<&FrameError> {
        match self {
            ProtoError::Frame(err) => Some(err),
            ProtoError::Stream(err) => err.frame_error(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtoError>;
