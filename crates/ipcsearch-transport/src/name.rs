use std::path::PathBuf;

/// Base pipe name used by the service.
pub const PIPE_BASE_NAME: &str = "Everything IPC";

/// Environment variable overriding where pipe sockets live on non-Windows hosts.
pub const SOCKET_DIR_ENV: &str = "IPCSEARCH_SOCKET_DIR";

/// Pipe name for an optional service instance.
///
/// An empty instance name is treated the same as no instance.
pub fn pipe_name(instance: Option<&str>) -> String {
    match instance.map(str::trim).filter(|s| !s.is_empty()) {
        Some(instance) => format!("{PIPE_BASE_NAME} ({instance})"),
        None => PIPE_BASE_NAME.to_string(),
    }
}

/// Platform path for a pipe name.
#[cfg(windows)]
pub fn pipe_path(name: &str) -> PathBuf {
    PathBuf::from(format!(r"\\.\pipe\{name}"))
}

/// Platform path for a pipe name.
///
/// Resolved under `IPCSEARCH_SOCKET_DIR`, then `XDG_RUNTIME_DIR`, then the
/// system temp dir.
#[cfg(not(windows))]
pub fn pipe_path(name: &str) -> PathBuf {
    let dir = std::env::var_os(SOCKET_DIR_ENV)
        .or_else(|| std::env::var_os("XDG_RUNTIME_DIR"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    dir.join(format!("{name}.sock"))
}
