//! Port-addressed message framing for flowd component streams.
//!
//! A component speaks frames on its stdin and stdout. Every frame carries
//! a text header naming the frame kind, subtype and logical port, followed
//! by a binary body of `Content-Length` bytes:
//!
//! ```text
//! data.TextMessage\r\n
//! Port: IN\r\n
//! Content-Length: 5\r\n
//! \r\n
//! hello
//! ```
//!
//! Blocking users get [`FrameReader`] and [`FrameWriter`]; async users
//! enable the `async` feature for a `tokio_util` codec.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod frame;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::FlowdCodec;
pub use codec::{decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_BODY, DEFAULT_MAX_HEADER};
pub use error::{FrameError, Result};
pub use frame::{Frame, FrameKind, CONTENT_TYPE_TEXT, SUBTYPE_IIP};
pub use reader::FrameReader;
pub use writer::FrameWriter;
