//! Single instance lock using Unix socket.
//!
//! Prevents two daemons from publishing merged health for the same sets.
//! The socket is removed by the OS when the process dies, so no stale lock
//! files are left behind.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Socket file name used by the daemon.
pub const SOCKET_NAME: &str = "health-merge.sock";

/// Error types for instance lock operations.
#[derive(Debug, Error)]
pub enum InstanceLockError {
    /// Another instance is already running.
    #[error("another instance is already running ({})", .0.display())]
    AlreadyRunning(PathBuf),

    /// I/O error during lock acquisition.
    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Held for as long as this process is the only running instance.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock at the default socket path.
    pub fn acquire() -> Result<Self, InstanceLockError> {
        Self::acquire_at(&Self::socket_path())
    }

    /// Acquire the lock at `path`.
    pub fn acquire_at(path: &Path) -> Result<Self, InstanceLockError> {
        // A socket left behind by a SIGKILL'd process refuses connections.
        if path.exists() {
            if UnixStream::connect(path).is_ok() {
                return Err(InstanceLockError::AlreadyRunning(path.to_path_buf()));
            }
            let _ = std::fs::remove_file(path);
        }

        match UnixListener::bind(path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                Err(InstanceLockError::AlreadyRunning(path.to_path_buf()))
            }
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `$XDG_RUNTIME_DIR/health-merge.sock`, falling back to `/tmp`.
    pub fn socket_path() -> PathBuf {
        Self::socket_path_in(std::env::var("XDG_RUNTIME_DIR").ok().as_deref())
    }

    fn socket_path_in(runtime_dir: Option<&str>) -> PathBuf {
        runtime_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(SOCKET_NAME)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_socket(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}.sock", name, std::process::id()))
    }

    #[test]
    fn test_socket_path_uses_runtime_dir() {
        assert_eq!(
            InstanceLock::socket_path_in(Some("/run/user/1000")),
            PathBuf::from("/run/user/1000/health-merge.sock")
        );
    }

    #[test]
    fn test_socket_path_fallback_to_tmp() {
        assert_eq!(
            InstanceLock::socket_path_in(None),
            PathBuf::from("/tmp/health-merge.sock")
        );
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let path = temp_socket("health-merge-lock-held");
        let lock = InstanceLock::acquire_at(&path).unwrap();
        assert!(matches!(
            InstanceLock::acquire_at(&path),
            Err(InstanceLockError::AlreadyRunning(_))
        ));

        drop(lock);
        assert!(!path.exists());
        let relock = InstanceLock::acquire_at(&path).unwrap();
        assert_eq!(relock.path(), path.as_path());
    }

    #[test]
    fn test_stale_socket_is_replaced() {
        let path = temp_socket("health-merge-lock-stale");
        {
            // Bind without the Drop cleanup to leave a stale socket file.
            let listener = UnixListener::bind(&path).unwrap();
            drop(listener);
        }
        assert!(path.exists());
        assert!(InstanceLock::acquire_at(&path).is_ok());
    }
}
