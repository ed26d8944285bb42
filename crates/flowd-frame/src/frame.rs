use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::error::FrameError;

/// Subtype of the synthetic frames that carry initial information packets.
pub const SUBTYPE_IIP: &str = "IIP";

/// Content type of IIP bodies, which come from the command line.
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Frame kind: payload-carrying or protocol-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Data,
    Control,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Data => "data",
            FrameKind::Control => "control",
        }
    }
}

impl FromStr for FrameKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(FrameKind::Data),
            "control" => Ok(FrameKind::Control),
            other => Err(FrameError::InvalidKind(other.to_string())),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port-addressed message on a component stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    /// Semantic shape of the body, e.g. `IIP` or `OpenNotification`.
    pub subtype: String,
    /// Logical port the frame is addressed to or sent from. Routing key.
    pub port: String,
    /// Advisory MIME-like type of the body; empty when unknown.
    pub content_type: String,
    /// Out-of-band metadata such as connection identifiers.
    pub extensions: Option<BTreeMap<String, String>>,
    pub body: Bytes,
}

impl Frame {
    /// Create a data frame with no content type and no extensions.
    pub fn data(
        subtype: impl Into<String>,
        port: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            kind: FrameKind::Data,
            subtype: subtype.into(),
            port: port.into(),
            content_type: String::new(),
            extensions: None,
            body: body.into(),
        }
    }

    /// Create a control frame with an empty body.
    pub fn control(subtype: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Control,
            subtype: subtype.into(),
            port: port.into(),
            content_type: String::new(),
            extensions: None,
            body: Bytes::new(),
        }
    }

    /// The initial information packet for `port`.
    pub fn iip(port: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            content_type: CONTENT_TYPE_TEXT.to_string(),
            ..Self::data(SUBTYPE_IIP, port, payload)
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Whether this is an initial information packet.
    pub fn is_iip(&self) -> bool {
        self.kind == FrameKind::Data && self.subtype == SUBTYPE_IIP
    }

    /// Look up an extension header value.
    pub fn extension(&self, key: &str) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get(key))
            .map(String::as_str)
    }
}
