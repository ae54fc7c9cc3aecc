use std::fmt;
use std::io;

use ipcsearch_frame::FrameError;
use ipcsearch_proto::{ProtoError, StreamError};
use ipcsearch_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const NO_SERVICE: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
#[allow(dead_code)]
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: &io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => NO_SERVICE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: &TransportError) -> CliError {
    match err {
        TransportError::NotRunning { .. } => {
            CliError::new(NO_SERVICE, format!("{context}: {err}"))
        }
        TransportError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
    }
}

pub fn frame_error(context: &str, err: &FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        FrameError::PayloadTooLarge { .. } | FrameError::Response(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn stream_error(context: &str, err: &StreamError) -> CliError {
    match err {
        StreamError::Frame(inner) => frame_error(context, inner),
        StreamError::IndexOutOfRange { .. } => CliError::usage(format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn proto_error(context: &str, err: &ProtoError) -> CliError {
    match err {
        ProtoError::Transport(err) => transport_error(context, err),
        ProtoError::Frame(err) => frame_error(context, err),
        ProtoError::Stream(err) => stream_error(context, err),
        ProtoError::Request(_) => CliError::usage(format!("{context}: {err}")),
        ProtoError::UnexpectedPayload { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use ipcsearch_frame::ResponseCode;

    use super::*;

    #[test]
    fn not_running_maps_to_no_service() {
        let err = ProtoError::Transport(TransportError::NotRunning {
            path: PathBuf::from("/tmp/x.sock"),
        });
        assert_eq!(proto_error("connect failed", &err).code, NO_SERVICE);
    }

    #[test]
    fn status_failures_are_data_invalid() {
        let err = ProtoError::Frame(FrameError::Response(ResponseCode::NotFound));
        assert_eq!(proto_error("search failed", &err).code, DATA_INVALID);
    }

    #[test]
    fn stream_errors_look_through_frames() {
        let err = StreamError::Frame(Arc::new(FrameError::ConnectionClosed));
        assert_eq!(stream_error("read failed", &err).code, TRANSPORT_ERROR);
        let err = StreamError::IndexOutOfRange { index: 9, count: 2 };
        assert_eq!(stream_error("seek failed", &err).code, USAGE);
        assert_eq!(stream_error("read failed", &StreamError::LengthOverflow).code, DATA_INVALID);
    }
}
