use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The locator string could not be parsed.
    #[error("invalid locator {locator:?}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    /// The locator names a transport scheme this build does not support.
    #[error("unsupported transport scheme {0:?}")]
    UnsupportedScheme(String),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// Failed to resolve the host part of an address.
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

impl TransportError {
    /// The underlying I/O error, if this error wraps one.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            TransportError::Bind { source, .. }
            | TransportError::Resolve { source, .. }
            | TransportError::Connect { source, .. } => Some(source),
            TransportError::Accept(source) | TransportError::Io(source) => Some(source),
            _ => None,
        }
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// Peers that are not up yet show up as refused connections or, for
    /// filesystem Unix sockets, as a missing path.
    pub fn is_transient(&self) -> bool {
        match self {
            // Name service hiccups and not-yet-registered hosts resolve later.
            TransportError::Resolve { .. } => true,
            other => other.io_source().is_some_and(is_transient_io),
        }
    }
}

/// Classify an I/O error as transient (worth retrying) or permanent.
pub fn is_transient_io(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    matches!(
        err.kind(),
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
            | ErrorKind::NotFound
            | ErrorKind::AddrNotAvailable
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
    )
}

pub type Result<T> = std::result::Result<T, TransportError>;
