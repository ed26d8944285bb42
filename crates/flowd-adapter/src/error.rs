use std::time::Duration;

use flowd_frame::FrameError;
use flowd_transport::TransportError;

/// Errors that stop the adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Invalid endpoint, IIP or command configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level error (bind, accept, non-transient dial failure).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error outside the subprocess output stream.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// An output endpoint could not be reached within the retry budget.
    #[error("output {port}: gave up after {attempts} dial attempts: {source}")]
    DialExhausted {
        port: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The readiness barrier timed out.
    #[error("endpoints not connected after {timeout:?}: {}", .pending.join(", "))]
    ReadyTimeout {
        timeout: Duration,
        pending: Vec<String>,
    },

    /// The subprocess could not be started.
    #[error("failed to spawn {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An initial information packet could not be written.
    #[error("failed to deliver initial packet to port {port}: {source}")]
    IipDelivery {
        port: String,
        #[source]
        source: FrameError,
    },

    /// The subprocess wrote something that is not a valid frame.
    #[error("subprocess output is not a valid frame stream: {0}")]
    SubprocessProtocol(#[source] FrameError),

    /// The subprocess addressed a frame to an output port nobody declared.
    #[error("subprocess sent a frame to undeclared output port {0:?}")]
    UnroutableFrame(String),

    /// I/O error on the subprocess handle.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task panicked or vanished.
    #[error("task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
