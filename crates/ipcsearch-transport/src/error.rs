use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while reaching the service pipe.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Nothing is listening on the pipe: the service is not running.
    #[error("search service is not running (no pipe at {})", path.display())]
    NotRunning { path: PathBuf },

    /// The pipe exists but the connection failed.
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The pipe stayed busy or absent for the whole connect window.
    #[error("timed out after {waited:?} waiting for {}", path.display())]
    Timeout { path: PathBuf, waited: Duration },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True when the error means the service itself is absent, as opposed to
    /// a failure talking to a running service.
    pub fn is_not_running(&self) -> bool {
        matches!(self, TransportError::NotRunning { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
