//! Endpoint locators.
//!
//! A locator names where an endpoint lives and which logical port it carries:
//!
//! ```text
//! tcp://localhost:4000#IN
//! tcp6://[::1]:0#OUT>IN
//! unix://@flowd/copy-1#IN
//! unix:///run/flowd/copy-1.sock#IN
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Transport scheme of a locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// TCP over IPv4 or IPv6, whichever the host resolves to first.
    Tcp,
    /// TCP restricted to IPv4 addresses.
    Tcp4,
    /// TCP restricted to IPv6 addresses.
    Tcp6,
    /// Unix domain stream socket (filesystem path or Linux abstract name).
    Unix,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Tcp => "tcp",
            Scheme::Tcp4 => "tcp4",
            Scheme::Tcp6 => "tcp6",
            Scheme::Unix => "unix",
        }
    }

    pub fn is_tcp(self) -> bool {
        !matches!(self, Scheme::Unix)
    }

    /// Whether a resolved socket address belongs to this scheme's family.
    pub fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Scheme::Tcp => true,
            Scheme::Tcp4 => addr.is_ipv4(),
            Scheme::Tcp6 => addr.is_ipv6(),
            Scheme::Unix => false,
        }
    }
}

impl FromStr for Scheme {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Scheme::Tcp),
            "tcp4" => Ok(Scheme::Tcp4),
            "tcp6" => Ok(Scheme::Tcp6),
            "unix" => Ok(Scheme::Unix),
            _ => Err(TransportError::UnsupportedScheme(s.to_string())),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `scheme://host[:port][/path][#fragment]` endpoint locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    path: String,
    fragment: Option<String>,
}

impl Locator {
    /// Parse a locator string.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| TransportError::InvalidLocator {
            locator: input.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| invalid("missing \"://\" after scheme"))?;
        if scheme.is_empty() {
            return Err(invalid("missing scheme"));
        }
        let scheme: Scheme = scheme.parse()?;

        let (address, fragment) = match rest.split_once('#') {
            Some((address, fragment)) => (address, Some(fragment.to_string())),
            None => (rest, None),
        };

        let (authority, path) = match address.find('/') {
            Some(idx) => address.split_at(idx),
            None => (address, ""),
        };

        match scheme {
            Scheme::Unix => {
                if authority.contains(':') {
                    return Err(invalid("unix locators do not take a port"));
                }
                if authority.is_empty() && path.is_empty() {
                    return Err(invalid("missing socket path"));
                }
                Ok(Self {
                    scheme,
                    host: authority.to_string(),
                    port: None,
                    path: path.to_string(),
                    fragment,
                })
            }
            Scheme::Tcp | Scheme::Tcp4 | Scheme::Tcp6 => {
                if !path.is_empty() && path != "/" {
                    return Err(invalid("tcp locators do not take a path"));
                }
                let (host, port) = split_host_port(authority).map_err(invalid)?;
                Ok(Self {
                    scheme,
                    host,
                    port,
                    path: String::new(),
                    fragment,
                })
            }
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Requested TCP port; `None` when the locator omits it.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The `#fragment` part, carrying port naming for flowd endpoints.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Whether binding this locator yields a system-chosen port.
    ///
    /// Ephemeral endpoints cannot be found again by a new peer once the
    /// listener has been closed.
    pub fn is_ephemeral(&self) -> bool {
        self.scheme.is_tcp() && self.port.unwrap_or(0) == 0
    }

    /// Address string handed to the operating system.
    ///
    /// TCP: `host:port` (an empty host binds all interfaces of the family).
    /// Unix: `host` followed by `path`, e.g. `@flowd/copy-1` or `/run/x.sock`.
    pub fn address(&self) -> String {
        match self.scheme {
            Scheme::Unix => format!("{}{}", self.host, self.path),
            Scheme::Tcp | Scheme::Tcp4 => {
                let host = if self.host.is_empty() { "0.0.0.0" } else { &self.host };
                format_host_port(host, self.port.unwrap_or(0))
            }
            Scheme::Tcp6 => {
                let host = if self.host.is_empty() { "::" } else { &self.host };
                format_host_port(host, self.port.unwrap_or(0))
            }
        }
    }
}

impl FromStr for Locator {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        match self.port {
            Some(port) => f.write_str(&format_host_port(&self.host, port))?,
            None if self.host.contains(':') => write!(f, "[{}]", self.host)?,
            None => f.write_str(&self.host)?,
        }
        f.write_str(&self.path)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

fn split_host_port(authority: &str) -> std::result::Result<(String, Option<u16>), &'static str> {
    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or("unterminated \"[\" in host")?;
        match after {
            "" => (host, None),
            _ => {
                let port = after.strip_prefix(':').ok_or("unexpected text after \"]\"")?;
                (host, Some(port))
            }
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => {
                return Err("ipv6 hosts must be enclosed in \"[...]\"")
            }
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    let port = match port {
        None | Some("") => None,
        Some(port) => Some(port.parse::<u16>().map_err(|_| "port is not a number in 0-65535")?),
    };

    Ok((host.to_string(), port))
}

fn format_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_with_fragment() {
        let loc = Locator::parse("tcp://localhost:4000#IN").unwrap();
        assert_eq!(loc.scheme(), Scheme::Tcp);
        assert_eq!(loc.host(), "localhost");
        assert_eq!(loc.port(), Some(4000));
        assert_eq!(loc.fragment(), Some("IN"));
        assert_eq!(loc.address(), "localhost:4000");
        assert!(!loc.is_ephemeral());
    }

    #[test]
    fn port_zero_and_missing_port_are_ephemeral() {
        assert!(Locator::parse("tcp://localhost:0#IN").unwrap().is_ephemeral());
        assert!(Locator::parse("tcp4://127.0.0.1#IN").unwrap().is_ephemeral());
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let loc = Locator::parse("tcp6://[::1]:9000#OUT>IN").unwrap();
        assert_eq!(loc.host(), "::1");
        assert_eq!(loc.port(), Some(9000));
        assert_eq!(loc.address(), "[::1]:9000");
        assert_eq!(loc.to_string(), "tcp6://[::1]:9000#OUT>IN");
    }

    #[test]
    fn empty_host_binds_all_interfaces() {
        let loc = Locator::parse("tcp://:7000#IN").unwrap();
        assert_eq!(loc.address(), "0.0.0.0:7000");
        let loc = Locator::parse("tcp6://:7000#IN").unwrap();
        assert_eq!(loc.address(), "[::]:7000");
    }

    #[test]
    fn parses_unix_abstract_and_filesystem() {
        let abs = Locator::parse("unix://@flowd/copy-1#IN").unwrap();
        assert_eq!(abs.scheme(), Scheme::Unix);
        assert_eq!(abs.address(), "@flowd/copy-1");
        assert!(!abs.is_ephemeral());

        let fs = Locator::parse("unix:///run/flowd/copy.sock#IN").unwrap();
        assert_eq!(fs.address(), "/run/flowd/copy.sock");
        assert_eq!(fs.to_string(), "unix:///run/flowd/copy.sock#IN");
    }

    #[test]
    fn fragment_is_optional_at_transport_level() {
        let loc = Locator::parse("tcp://localhost:1").unwrap();
        assert_eq!(loc.fragment(), None);
    }

    #[test]
    fn rejects_malformed_locators() {
        for bad in [
            "localhost:4000#IN",
            "://localhost:4000#IN",
            "tcp://localhost:http#IN",
            "tcp://localhost:70000#IN",
            "tcp://localhost:1/path#IN",
            "tcp://::1:80#IN",
            "tcp://[::1#IN",
            "unix://#IN",
            "unix://host:1/x#IN",
        ] {
            assert!(
                matches!(Locator::parse(bad), Err(TransportError::InvalidLocator { .. })),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(matches!(
            Locator::parse("udp://localhost:1#IN"),
            Err(TransportError::UnsupportedScheme(s)) if s == "udp"
        ));
    }

    #[test]
    fn scheme_family_filter() {
        let v4: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let v6: SocketAddr = "[::1]:1".parse().unwrap();
        assert!(Scheme::Tcp.accepts(&v4) && Scheme::Tcp.accepts(&v6));
        assert!(Scheme::Tcp4.accepts(&v4) && !Scheme::Tcp4.accepts(&v6));
        assert!(!Scheme::Tcp6.accepts(&v4) && Scheme::Tcp6.accepts(&v6));
    }
}
