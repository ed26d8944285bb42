//! Bridges a component subprocess's framed stdio to its network endpoints.
//!
//! The component reads frames on stdin and writes frames on stdout, each
//! tagged with a logical port. The adapter gives every input port a
//! listening socket and every output port a dialed connection, holds the
//! component back until all of them are connected, and then moves frames:
//! - inbound: one task per input endpoint decodes frames from the network
//!   and writes them to the component's stdin;
//! - outbound: one task decodes the component's stdout and routes each
//!   frame to the output endpoint named by its port.

pub mod adapter;
pub mod barrier;
pub mod config;
pub mod demux;
pub mod endpoint;
pub mod error;
pub mod establish;
pub mod inject;
pub mod mux;
pub mod process;
pub mod raw;
pub mod registry;
pub mod retry;

pub use adapter::{Adapter, BoundInput, RunOutcome, Wiring};
pub use config::{AdapterConfig, RetryPolicy, DEFAULT_DRAIN_GRACE};
pub use endpoint::{ConnectionState, InputEndpoint, OutputEndpoint};
pub use error::{AdapterError, Result};
pub use registry::{EndpointRegistry, InitialPacket, PortNames};
