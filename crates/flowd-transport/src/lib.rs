//! Endpoint transports for flowd components.
//!
//! Provides a unified interface over the stream transports an endpoint
//! locator can name:
//! - TCP (`tcp`, `tcp4`, `tcp6`)
//! - Unix domain sockets (`unix`), filesystem paths or Linux abstract names
//!
//! This is the lowest layer of flowd. Everything else builds on the
//! [`Connection`] type provided here.

pub mod dial;
pub mod error;
pub mod listener;
pub mod locator;
pub mod stream;

#[cfg(unix)]
mod unix;

pub use dial::{dial, DEFAULT_DIAL_TIMEOUT};
pub use error::{is_transient_io, Result, TransportError};
pub use listener::Listener;
pub use locator::{Locator, Scheme};
pub use stream::{BoundAddr, Connection};
