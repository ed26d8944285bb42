//! Unix domain socket plumbing.
//!
//! Addresses starting with `@` live in the Linux abstract namespace and need
//! no filesystem cleanup. Everything else is a filesystem path: stale sockets
//! are removed before binding and the socket file is unlinked again when the
//! listener goes away.

use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::Connection;

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Owns the filesystem entry of a bound socket and removes it on drop.
pub(crate) struct SocketFile {
    path: PathBuf,
    created_inode: (u64, u64),
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        let (expected_dev, expected_ino) = self.created_inode;
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

pub(crate) fn bind(address: &str) -> Result<(UnixListener, Option<SocketFile>)> {
    let bind_err = |source| TransportError::Bind {
        address: address.to_string(),
        source,
    };

    if let Some(name) = address.strip_prefix('@') {
        let listener = bind_abstract(name).map_err(bind_err)?;
        return Ok((listener, None));
    }

    let path = Path::new(address);
    check_path_len(path)?;

    // Remove stale socket if it exists, but never remove non-socket files.
    if let Ok(metadata) = std::fs::symlink_metadata(path) {
        if metadata.file_type().is_socket() {
            debug!(?path, "removing stale socket");
            std::fs::remove_file(path).map_err(bind_err)?;
        } else {
            return Err(bind_err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "existing path is not a unix socket",
            )));
        }
    }

    let listener = UnixListener::bind(path).map_err(bind_err)?;
    let metadata = std::fs::symlink_metadata(path).map_err(bind_err)?;

    Ok((
        listener,
        Some(SocketFile {
            path: path.to_path_buf(),
            created_inode: (metadata.dev(), metadata.ino()),
        }),
    ))
}

pub(crate) async fn connect(address: &str) -> Result<Connection> {
    let connect_err = |source| TransportError::Connect {
        address: address.to_string(),
        source,
    };

    let stream = match address.strip_prefix('@') {
        Some(name) => connect_abstract(name).map_err(connect_err)?,
        None => {
            check_path_len(Path::new(address))?;
            UnixStream::connect(address).await.map_err(connect_err)?
        }
    };

    Ok(Connection::from_unix(stream, format!("unix:{address}")))
}

fn check_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn abstract_addr(name: &str) -> std::io::Result<std::os::unix::net::SocketAddr> {
    use std::os::linux::net::SocketAddrExt;

    std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())
}

#[cfg(target_os = "linux")]
fn bind_abstract(name: &str) -> std::io::Result<UnixListener> {
    let listener = std::os::unix::net::UnixListener::bind_addr(&abstract_addr(name)?)?;
    listener.set_nonblocking(true)?;
    UnixListener::from_std(listener)
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &str) -> std::io::Result<UnixStream> {
    let stream = std::os::unix::net::UnixStream::connect_addr(&abstract_addr(name)?)?;
    stream.set_nonblocking(true)?;
    UnixStream::from_std(stream)
}

#[cfg(not(target_os = "linux"))]
fn bind_abstract(_name: &str) -> std::io::Result<UnixListener> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "abstract unix socket names require Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_name: &str) -> std::io::Result<UnixStream> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "abstract unix socket names require Linux",
    ))
}
