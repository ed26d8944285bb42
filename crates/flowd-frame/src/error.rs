/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A header line could not be parsed.
    #[error("malformed frame header: {0}")]
    MalformedHeader(String),

    /// A mandatory header is absent.
    #[error("frame is missing the {0} header")]
    MissingHeader(&'static str),

    /// The frame kind is neither `data` nor `control`.
    #[error("invalid frame kind {0:?}")]
    InvalidKind(String),

    /// A header name or value cannot be represented on the wire.
    #[error("invalid header {name}: {reason}")]
    InvalidHeaderValue { name: String, reason: &'static str },

    /// The header section exceeds the configured maximum size.
    #[error("frame header too large (max {max} bytes)")]
    HeaderTooLarge { max: usize },

    /// The body exceeds the configured maximum size.
    #[error("frame body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// The stream ended in the middle of a frame.
    #[error("stream ended inside a frame ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    /// The stream ended cleanly between frames.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the bytes themselves were bad, as opposed to the stream.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FrameError::MalformedHeader(_)
                | FrameError::MissingHeader(_)
                | FrameError::InvalidKind(_)
                | FrameError::InvalidHeaderValue { .. }
                | FrameError::HeaderTooLarge { .. }
                | FrameError::BodyTooLarge { .. }
                | FrameError::Truncated { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
