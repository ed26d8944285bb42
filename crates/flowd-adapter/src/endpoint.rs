//! Network endpoints bound to one local port name each.
//!
//! An endpoint is owned by exactly one task at a time: the establishment
//! task until it is connected, then the forwarding task for its direction.

use std::fmt;
use std::time::Duration;

use flowd_transport::{dial, BoundAddr, Connection, Listener, Locator, TransportError};
use tracing::{debug, info};

use crate::config::RetryPolicy;
use crate::error::Result;
use crate::retry::retry_transient;

/// Connection state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Unconnected => "unconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        })
    }
}

/// An inbound endpoint: listens, accepts one peer at a time.
#[derive(Debug)]
pub struct InputEndpoint {
    locator: Locator,
    local_port: String,
    state: ConnectionState,
    listener: Option<Listener>,
    bound: Option<BoundAddr>,
    connection: Option<Connection>,
}

impl InputEndpoint {
    pub fn new(locator: Locator, local_port: impl Into<String>) -> Self {
        Self {
            locator,
            local_port: local_port.into(),
            state: ConnectionState::Unconnected,
            listener: None,
            bound: None,
            connection: None,
        }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn local_port(&self) -> &str {
        &self.local_port
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Concrete address of the most recent bind.
    pub fn bound(&self) -> Option<&BoundAddr> {
        self.bound.as_ref()
    }

    /// Whether a new peer can find this endpoint again after a disconnect.
    pub fn reconnectable(&self) -> bool {
        !self.locator.is_ephemeral()
    }

    /// Bind the listener.
    pub async fn listen(&mut self) -> std::result::Result<&BoundAddr, TransportError> {
        self.state = ConnectionState::Connecting;
        let listener = match Listener::bind(&self.locator).await {
            Ok(listener) => listener,
            Err(err) => {
                self.state = ConnectionState::Closed;
                return Err(err);
            }
        };
        let bound = self.bound.insert(listener.bound().clone());
        self.listener = Some(listener);
        Ok(bound)
    }

    /// Wait for one peer, then stop listening.
    pub async fn accept(&mut self) -> std::result::Result<(), TransportError> {
        let Some(listener) = self.listener.take() else {
            return Err(TransportError::Accept(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                format!("input {} is not listening", self.local_port),
            )));
        };
        match listener.accept().await {
            Ok(conn) => {
                info!(port = %self.local_port, peer = conn.peer(), "input connected");
                self.connection = Some(conn);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Closed;
                Err(err)
            }
        }
    }

    /// Re-bind on the same address and wait for a new peer.
    pub async fn relisten(&mut self) -> std::result::Result<(), TransportError> {
        self.connection = None;
        self.listen().await?;
        debug!(port = %self.local_port, "re-listening for a new peer");
        self.accept().await
    }

    /// Move the live connection out for forwarding.
    pub fn take_connection(&mut self) -> Option<Connection> {
        self.connection.take()
    }

    pub fn close(&mut self) {
        self.listener = None;
        self.connection = None;
        self.state = ConnectionState::Closed;
    }
}

/// An outbound endpoint: dials the downstream process.
#[derive(Debug)]
pub struct OutputEndpoint {
    locator: Locator,
    local_port: String,
    remote_port: String,
    state: ConnectionState,
    connection: Option<Connection>,
}

impl OutputEndpoint {
    pub fn new(
        locator: Locator,
        local_port: impl Into<String>,
        remote_port: impl Into<String>,
    ) -> Self {
        Self {
            locator,
            local_port: local_port.into(),
            remote_port: remote_port.into(),
            state: ConnectionState::Unconnected,
            connection: None,
        }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn local_port(&self) -> &str {
        &self.local_port
    }

    /// Port name the downstream process expects on its frames.
    pub fn remote_port(&self) -> &str {
        &self.remote_port
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Dial with retry until connected or the policy gives up.
    pub async fn connect(&mut self, policy: &RetryPolicy, dial_timeout: Duration) -> Result<()> {
        self.state = ConnectionState::Connecting;
        let locator = &self.locator;
        let result = retry_transient(policy, &self.local_port, move |attempt| {
            debug!(%locator, attempt, "dialing");
            dial(locator, dial_timeout)
        })
        .await;

        match result {
            Ok(conn) => {
                info!(port = %self.local_port, peer = conn.peer(), "output connected");
                self.connection = Some(conn);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Closed;
                Err(err)
            }
        }
    }

    /// Move the live connection out for forwarding.
    pub fn take_connection(&mut self) -> Option<Connection> {
        self.connection.take()
    }

    pub fn close(&mut self) {
        self.connection = None;
        self.state = ConnectionState::Closed;
    }
}
