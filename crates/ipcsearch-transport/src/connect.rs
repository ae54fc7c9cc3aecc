use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::name::{pipe_name, pipe_path};
use crate::traits::IpcStream;

/// Default bounded wait while locating the service.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Connect to the pipe of an optional service instance (single attempt).
pub fn connect(instance: Option<&str>) -> Result<IpcStream> {
    connect_path(pipe_path(&pipe_name(instance)))
}

/// Connect to an explicit pipe path (single attempt).
pub fn connect_path(path: impl AsRef<Path>) -> Result<IpcStream> {
    let path = path.as_ref();
    match open(path) {
        Ok(stream) => {
            debug!(?path, "connected to service pipe");
            Ok(stream)
        }
        Err(err) => Err(classify(path, err)),
    }
}

/// Connect to an explicit pipe path, polling until `timeout` elapses.
///
/// Only "not running" and "busy" conditions are retried. Once connected,
/// nothing on the stream is timed out.
pub fn connect_with_timeout(path: impl AsRef<Path>, timeout: Duration) -> Result<IpcStream> {
    let path = path.as_ref();
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let err = match open(path) {
            Ok(stream) => {
                debug!(?path, attempts, "connected to service pipe");
                return Ok(stream);
            }
            Err(err) => err,
        };

        let busy = is_pipe_busy(&err);
        let err = classify(path, err);
        if !busy && !err.is_not_running() {
            return Err(err);
        }

        let waited = start.elapsed();
        if waited >= timeout {
            return Err(if busy {
                TransportError::Timeout {
                    path: path.to_path_buf(),
                    waited,
                }
            } else {
                err
            });
        }

        debug!(?path, attempts, busy, "service pipe unavailable, retrying");
        if busy {
            wait_for_pipe(path, timeout - waited);
        } else {
            std::thread::sleep(POLL_INTERVAL.min(timeout - waited));
        }
    }
}

fn classify(path: &Path, err: std::io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused => TransportError::NotRunning {
            path: path.to_path_buf(),
        },
        _ => TransportError::Connect {
            path: path.to_path_buf(),
            source: err,
        },
    }
}

#[cfg(unix)]
fn open(path: &Path) -> std::io::Result<IpcStream> {
    std::os::unix::net::UnixStream::connect(path).map(IpcStream::from_unix)
}

#[cfg(windows)]
fn open(path: &Path) -> std::io::Result<IpcStream> {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map(IpcStream::from_pipe)
}

#[cfg(not(any(unix, windows)))]
fn open(_path: &Path) -> std::io::Result<IpcStream> {
    Err(std::io::Error::new(
        ErrorKind::Unsupported,
        "no pipe transport on this platform",
    ))
}

#[cfg(windows)]
fn is_pipe_busy(err: &std::io::Error) -> bool {
    err.raw_os_error()
        .is_some_and(|code| code as u32 == windows_sys::Win32::Foundation::ERROR_PIPE_BUSY)
}

#[cfg(not(windows))]
fn is_pipe_busy(_err: &std::io::Error) -> bool {
    false
}

#[cfg(windows)]
fn wait_for_pipe(path: &Path, remaining: Duration) {
    use std::os::windows::ffi::OsStrExt;

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    let millis = u32::try_from(remaining.as_millis()).unwrap_or(u32::MAX).max(1);
    // SAFETY: `wide` is a NUL-terminated UTF-16 buffer that outlives the call.
    unsafe {
        windows_sys::Win32::System::Pipes::WaitNamedPipeW(wide.as_ptr(), millis);
    }
}

#[cfg(not(windows))]
fn wait_for_pipe(_path: &Path, remaining: Duration) {
    std::thread::sleep(POLL_INTERVAL.min(remaining));
}

/// Resolve the pipe path of an optional instance; convenience for callers
/// that want to log or display it.
pub fn instance_path(instance: Option<&str>) -> PathBuf {
    pipe_path(&pipe_name(instance))
}
