use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr, ToSocketAddrs};

use bjnp_frame::code::PORT_PRINT;
use bjnp_frame::{DeviceIdentity, MacAddress};
use bjnp_transport::reverse_lookup;
use serde::Serialize;
use tracing::debug;

/// URI scheme used for BJNP printers.
pub const URI_SCHEME: &str = "bjnp";

/// Names some routers hand out when a reverse lookup has no real answer.
const PLACEHOLDER_NAME: &str = "noname";

/// How desirable an address is for reaching a printer. Higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressRank {
    LinkLocal,
    Global,
    GlobalWithName,
}

/// A printer found on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPrinter {
    pub addr: IpAddr,
    pub port: u16,
    /// Resolved host name, or the numeric address when none is known.
    pub hostname: String,
    pub rank: AddressRank,
    pub mac: Option<MacAddress>,
    pub identity: DeviceIdentity,
}

impl DiscoveredPrinter {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }

    pub fn model(&self) -> &str {
        &self.identity.model
    }

    /// `bjnp://host:port`, with IPv6 literals in brackets.
    pub fn device_uri(&self) -> String {
        let host = match self.hostname.parse::<Ipv6Addr>() {
            Ok(_) => format!("[{}]", self.hostname),
            Err(_) => self.hostname.clone(),
        };
        format!("{URI_SCHEME}://{host}:{}", self.port)
    }

    /// The spooler's device listing line for this printer.
    pub fn cups_listing(&self) -> String {
        let model = self.model();
        format!(
            "network {} \"{model}\" \"{model} {}\" \"{}\"",
            self.device_uri(),
            self.hostname,
            self.identity.ieee1284_id
        )
    }
}

fn is_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => v6.segments()[0] & 0xffc0 == 0xfe80,
    }
}

/// Rank an address given whether a host name was resolved for it.
pub fn rank_address(ip: &IpAddr, has_name: bool) -> AddressRank {
    if is_link_local(ip) {
        AddressRank::LinkLocal
    } else if has_name {
        AddressRank::GlobalWithName
    } else {
        AddressRank::Global
    }
}

/// Resolve a host name for `ip` and rank the address.
///
/// Failed lookups and placeholder names fall back to the numeric address.
pub fn resolve_host(ip: IpAddr) -> (String, AddressRank) {
    match reverse_lookup(ip) {
        Some(name) if !name.starts_with(PLACEHOLDER_NAME) => {
            let rank = rank_address(&ip, true);
            (name, rank)
        }
        other => {
            if let Some(name) = other {
                debug!(%ip, %name, "ignoring placeholder host name");
            }
            (ip.to_string(), rank_address(&ip, false))
        }
    }
}

/// A printer named on the command line or by the spooler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterTarget {
    pub host: String,
    pub port: u16,
}

/// Error returned for a printer address that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTarget(pub String);

impl fmt::Display for InvalidTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid printer address: {}", self.0)
    }
}

impl std::error::Error for InvalidTarget {}

impl PrinterTarget {
    /// Parse `bjnp://host[:port][/...]` or `host[:port]`.
    pub fn parse(input: &str) -> Result<Self, InvalidTarget> {
        let invalid = || InvalidTarget(input.to_string());
        let rest = match input.split_once("://") {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case(URI_SCHEME) => rest,
            Some(_) => return Err(invalid()),
            None => input,
        };
        let authority = rest.split(['/', '?']).next().unwrap_or_default();
        if authority.is_empty() {
            return Err(invalid());
        }

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed.split_once(']').ok_or_else(invalid)?;
            let port = match tail.strip_prefix(':') {
                Some(port) => Some(port),
                None if tail.is_empty() => None,
                None => return Err(invalid()),
            };
            (host, port)
        } else if authority.matches(':').count() > 1 {
            // Bare IPv6 literal without a port.
            (authority, None)
        } else {
            match authority.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        let port = match port {
            Some(p) => p.parse::<u16>().map_err(|_| invalid())?,
            None => PORT_PRINT,
        };
        if host.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Candidate socket addresses for this target, in resolver order.
    pub fn resolve(&self) -> std::io::Result<Vec<SocketAddr>> {
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }
}

impl fmt::Display for PrinterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{URI_SCHEME}://[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{URI_SCHEME}://{}:{}", self.host, self.port)
        }
    }
}
