//! Endpoint declarations parsed into typed endpoint sets.

use std::collections::BTreeMap;
use std::str::FromStr;

use bytes::Bytes;
use flowd_transport::Locator;
use tracing::warn;

use crate::config::AdapterConfig;
use crate::endpoint::{InputEndpoint, OutputEndpoint};
use crate::error::{AdapterError, Result};

/// A one-shot frame delivered to the subprocess before any network traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialPacket {
    pub port: String,
    pub payload: Bytes,
}

impl FromStr for InitialPacket {
    type Err = AdapterError;

    /// Parse `port:payload`, splitting on the first `:`.
    fn from_str(declaration: &str) -> Result<Self> {
        let (port, payload) = declaration.split_once(':').ok_or_else(|| {
            AdapterError::Config(format!("initial packet {declaration:?} is not PORT:PAYLOAD"))
        })?;
        if port.is_empty() {
            return Err(AdapterError::Config(format!(
                "initial packet {declaration:?} has an empty port"
            )));
        }
        Ok(Self {
            port: port.to_string(),
            payload: Bytes::copy_from_slice(payload.as_bytes()),
        })
    }
}

/// The `local[>remote]` port naming carried in a locator fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortNames {
    pub local: String,
    pub remote: Option<String>,
}

impl PortNames {
    pub fn parse(locator: &Locator) -> Result<Self> {
        let invalid = |reason: &str| AdapterError::Config(format!("locator {locator}: {reason}"));

        let fragment = locator
            .fragment()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| invalid("missing #port fragment"))?;
        let (local, remote) = match fragment.split_once('>') {
            Some((local, remote)) => (local, Some(remote)),
            None => (fragment, None),
        };
        if local.is_empty() {
            return Err(invalid("empty local port name"));
        }
        if remote.is_some_and(str::is_empty) {
            return Err(invalid("empty remote port name"));
        }
        Ok(Self {
            local: local.to_string(),
            remote: remote.map(str::to_string),
        })
    }
}

/// Input and output endpoints keyed by local port name, plus the IIPs.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    inputs: BTreeMap<String, InputEndpoint>,
    outputs: BTreeMap<String, OutputEndpoint>,
    iips: Vec<InitialPacket>,
}

impl EndpointRegistry {
    /// Build the registry from configuration. Any malformed declaration fails the whole build.
    pub fn from_config(config: &AdapterConfig) -> Result<Self> {
        if !config.iips.is_empty() && !config.in_framing {
            return Err(AdapterError::Config(
                "initial packets need input framing".to_string(),
            ));
        }

        let mut registry = Self::default();
        for raw in &config.inputs {
            let locator = parse_locator(raw)?;
            let names = PortNames::parse(&locator)?;
            if let Some(remote) = &names.remote {
                warn!(%locator, remote, "remote port name has no effect on an input");
            }
            let endpoint = InputEndpoint::new(locator, names.local.clone());
            if let Some(previous) = registry.inputs.insert(names.local, endpoint) {
                warn!(
                    port = previous.local_port(),
                    replaced = %previous.locator(),
                    "duplicate input declaration, keeping the last one"
                );
            }
        }
        for raw in &config.outputs {
            let locator = parse_locator(raw)?;
            let names = PortNames::parse(&locator)?;
            let remote = names.remote.unwrap_or_else(|| names.local.clone());
            let endpoint = OutputEndpoint::new(locator, names.local.clone(), remote);
            if let Some(previous) = registry.outputs.insert(names.local, endpoint) {
                warn!(
                    port = previous.local_port(),
                    replaced = %previous.locator(),
                    "duplicate output declaration, keeping the last one"
                );
            }
        }
        registry.iips = config
            .iips
            .iter()
            .map(|raw| raw.parse())
            .collect::<Result<_>>()?;

        Ok(registry)
    }

    pub fn inputs(&self) -> &BTreeMap<String, InputEndpoint> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeMap<String, OutputEndpoint> {
        &self.outputs
    }

    pub fn iips(&self) -> &[InitialPacket] {
        &self.iips
    }

    /// Hand the endpoints over to their owning tasks.
    pub fn into_parts(
        self,
    ) -> (
        BTreeMap<String, InputEndpoint>,
        BTreeMap<String, OutputEndpoint>,
        Vec<InitialPacket>,
    ) {
        (self.inputs, self.outputs, self.iips)
    }
}

fn parse_locator(raw: &str) -> Result<Locator> {
    Locator::parse(raw).map_err(|err| AdapterError::Config(err.to_string()))
}
