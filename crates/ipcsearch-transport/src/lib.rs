//! Transport to the search service's IPC pipe.
//!
//! The service listens on a named byte-stream pipe whose name is derived from
//! a fixed base string, optionally suffixed with an instance name:
//! - Windows: `\\.\pipe\<name>` opened as a file handle
//! - elsewhere: a Unix domain socket `<socket dir>/<name>.sock`
//!
//! This is the lowest layer of ipcsearch. Everything else builds on top of
//! the [`IpcStream`] type provided here.

pub mod connect;
pub mod error;
pub mod name;
pub mod traits;

pub use connect::{
    connect, connect_path, connect_with_timeout, instance_path, DEFAULT_CONNECT_TIMEOUT,
};
pub use error::{Result, TransportError};
pub use name::{pipe_name, pipe_path, PIPE_BASE_NAME, SOCKET_DIR_ENV};
pub use traits::IpcStream;
