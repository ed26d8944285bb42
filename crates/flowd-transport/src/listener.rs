use tokio::net::{lookup_host, TcpListener};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::locator::{Locator, Scheme};
use crate::stream::{BoundAddr, Connection};

/// A bound listening socket for one input endpoint.
///
/// Dropping the listener closes it. Filesystem Unix sockets created by
/// [`Listener::bind`] are unlinked on drop so the same path can be bound
/// again when the endpoint re-listens.
pub struct Listener {
    inner: ListenerInner,
    bound: BoundAddr,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: tokio::net::UnixListener,
        // Held for its Drop.
        _socket_file: Option<crate::unix::SocketFile>,
    },
}

impl Listener {
    /// Bind and listen on the locator's address.
    pub async fn bind(locator: &Locator) -> Result<Self> {
        match locator.scheme() {
            Scheme::Tcp | Scheme::Tcp4 | Scheme::Tcp6 => Self::bind_tcp(locator).await,
            Scheme::Unix => Self::bind_unix(locator),
        }
    }

    async fn bind_tcp(locator: &Locator) -> Result<Self> {
        let address = locator.address();
        let bind_err = |source| TransportError::Bind {
            address: address.clone(),
            source,
        };

        let addr = lookup_host(address.as_str())
            .await
            .map_err(bind_err)?
            .find(|addr| locator.scheme().accepts(addr))
            .ok_or_else(|| {
                bind_err(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("no {} address for host", locator.scheme()),
                ))
            })?;

        let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
        let local = listener.local_addr().map_err(bind_err)?;
        info!(%locator, bound = %local, "listening on tcp socket");

        Ok(Self {
            inner: ListenerInner::Tcp(listener),
            bound: BoundAddr::Tcp(local),
        })
    }

    #[cfg(unix)]
    fn bind_unix(locator: &Locator) -> Result<Self> {
        let address = locator.address();
        let (listener, socket_file) = crate::unix::bind(&address)?;
        info!(%locator, "listening on unix domain socket");

        Ok(Self {
            inner: ListenerInner::Unix {
                listener,
                _socket_file: socket_file,
            },
            bound: BoundAddr::Unix(address),
        })
    }

    #[cfg(not(unix))]
    fn bind_unix(locator: &Locator) -> Result<Self> {
        Err(TransportError::UnsupportedScheme(
            locator.scheme().to_string(),
        ))
    }

    /// Wait for one incoming connection.
    pub async fn accept(&self) -> Result<Connection> {
        let conn = match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, _addr) = listener.accept().await.map_err(TransportError::Accept)?;
                Connection::from_tcp(stream)
            }
            #[cfg(unix)]
            ListenerInner::Unix { listener, .. } => {
                let (stream, _addr) = listener.accept().await.map_err(TransportError::Accept)?;
                let peer = format!("unix:{}", self.bound);
                Connection::from_unix(stream, peer)
            }
        };
        debug!(bound = %self.bound, peer = conn.peer(), "accepted connection");
        Ok(conn)
    }

    /// The address actually bound; resolves ephemeral port requests.
    pub fn bound(&self) -> &BoundAddr {
        &self.bound
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").field("bound", &self.bound).finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn ephemeral_tcp_port_is_resolved() {
        let locator = Locator::parse("tcp://127.0.0.1:0#IN").unwrap();
        let listener = Listener::bind(&locator).await.unwrap();
        let port = listener.bound().port().expect("tcp listener has a port");
        assert_ne!(port, 0);
    }

    #[tokio::test]
    async fn tcp_accept_reads_bytes() {
        let locator = Locator::parse("tcp4://127.0.0.1:0#IN").unwrap();
        let listener = Listener::bind(&locator).await.unwrap();
        let addr = listener.bound().to_string();

        let client = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"hello").await.unwrap();
        });

        let mut conn = listener.accept().await.unwrap();
        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(conn.transport_name(), "tcp");
        client.await.unwrap();
    }

    #[tokio::test]
    async fn tcp6_rejects_ipv4_host() {
        let locator = Locator::parse("tcp6://127.0.0.1:0#IN").unwrap();
        let err = Listener::bind(&locator).await.unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
    }

    #[tokio::test]
    async fn second_bind_on_same_port_fails() {
        let first = Listener::bind(&Locator::parse("tcp://127.0.0.1:0").unwrap())
            .await
            .unwrap();
        let port = first.bound().port().unwrap();
        let again = Locator::parse(&format!("tcp://127.0.0.1:{port}")).unwrap();
        assert!(matches!(
            Listener::bind(&again).await,
            Err(TransportError::Bind { .. })
        ));
    }
}
