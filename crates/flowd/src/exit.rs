use std::fmt;
use std::io;

use flowd_adapter::AdapterError;
use flowd_frame::FrameError;
use flowd_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
/// Conventional status after SIGINT.
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::InvalidLocator { .. }
        | TransportError::UnsupportedScheme(_)
        | TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Bind { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn adapter_error(context: &str, err: AdapterError) -> CliError {
    match err {
        AdapterError::Config(_) => CliError::new(USAGE, format!("{context}: {err}")),
        AdapterError::Transport(err) => transport_error(context, err),
        AdapterError::Frame(err) => frame_error(context, err),
        AdapterError::DialExhausted { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        AdapterError::SubprocessProtocol(_)
        | AdapterError::UnroutableFrame(_)
        | AdapterError::IipDelivery { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        AdapterError::ReadyTimeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        AdapterError::Spawn { .. } | AdapterError::Io(_) | AdapterError::Task(_) => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
    }
}
