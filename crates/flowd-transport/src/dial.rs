use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::locator::{Locator, Scheme};
use crate::stream::Connection;

/// Default bound on a single connection attempt.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Open one connection to the locator's address.
///
/// A single attempt: resolution, then each resolved address of the
/// locator's family in turn, each bounded by `timeout`. Retrying is the
/// caller's business.
pub async fn dial(locator: &Locator, timeout: Duration) -> Result<Connection> {
    let address = locator.address();
    let conn = match locator.scheme() {
        Scheme::Tcp | Scheme::Tcp4 | Scheme::Tcp6 => {
            dial_tcp(locator.scheme(), &address, timeout).await?
        }
        #[cfg(unix)]
        Scheme::Unix => {
            let connect = crate::unix::connect(&address);
            match tokio::time::timeout(timeout, connect).await {
                Ok(result) => result?,
                Err(_) => return Err(timed_out(&address)),
            }
        }
        #[cfg(not(unix))]
        Scheme::Unix => {
            return Err(TransportError::UnsupportedScheme(
                locator.scheme().to_string(),
            ))
        }
    };
    debug!(%locator, peer = conn.peer(), "connected");
    Ok(conn)
}

async fn dial_tcp(scheme: Scheme, address: &str, timeout: Duration) -> Result<Connection> {
    let connect_err = |source| TransportError::Connect {
        address: address.to_string(),
        source,
    };

    let candidates: Vec<_> = lookup_host(address)
        .await
        .map_err(|source| TransportError::Resolve {
            address: address.to_string(),
            source,
        })?
        .filter(|addr| scheme.accepts(addr))
        .collect();

    let mut last_err = None;
    for addr in candidates {
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok(Connection::from_tcp(stream)),
            Ok(Err(err)) => last_err = Some(connect_err(err)),
            Err(_) => last_err = Some(timed_out(address)),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        connect_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no {scheme} address for host"),
        ))
    }))
}

fn timed_out(address: &str) -> TransportError {
    TransportError::Connect {
        address: address.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
    }
}
