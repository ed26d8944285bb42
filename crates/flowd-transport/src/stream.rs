use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

/// A connected endpoint stream: implements `AsyncRead + AsyncWrite`.
///
/// This is the I/O type every listener and dialer hands out, whatever the
/// transport scheme of the locator was.
pub struct Connection {
    inner: ConnectionInner,
    peer: String,
}

enum ConnectionInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "tcp:unknown".to_string());
        // Frames are written whole; do not hold them back for coalescing.
        let _ = stream.set_nodelay(true);
        Self {
            inner: ConnectionInner::Tcp(stream),
            peer,
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: UnixStream, peer: String) -> Self {
        Self {
            inner: ConnectionInner::Unix(stream),
            peer,
        }
    }

    /// Human-readable description of the remote side, for logs.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            ConnectionInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            ConnectionInner::Unix(_) => "unix",
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            ConnectionInner::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            ConnectionInner::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            ConnectionInner::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            ConnectionInner::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("type", &self.transport_name())
            .field("peer", &self.peer)
            .finish()
    }
}

/// The concrete address a listener ended up bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundAddr {
    Tcp(SocketAddr),
    Unix(String),
}

impl BoundAddr {
    /// The bound TCP port; `None` for Unix sockets.
    pub fn port(&self) -> Option<u16> {
        match self {
            BoundAddr::Tcp(addr) => Some(addr.port()),
            BoundAddr::Unix(_) => None,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        match self {
            BoundAddr::Tcp(_) => "tcp",
            BoundAddr::Unix(_) => "unix",
        }
    }
}

impl fmt::Display for BoundAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundAddr::Tcp(addr) => write!(f, "{addr}"),
            BoundAddr::Unix(path) => f.write_str(path),
        }
    }
}
