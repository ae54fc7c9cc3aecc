use crate::code::ResponseCode;

/// Errors that can occur while exchanging messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing messages.
    #[error("message I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The pipe was closed before a complete message was transferred.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,

    /// The service answered with a failure status.
    #[error("service replied {0}")]
    Response(ResponseCode),
}

pub type Result<T> = std::result::Result<T, FrameError>;
