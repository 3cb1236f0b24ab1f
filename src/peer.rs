//! Peer value objects and the descriptors nodes report about each other

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr};

/// A reachable node. Equality and hashing use only the identity fields
/// (address and both ports); observed height, version and latency do not
/// change which peer this is.
#[derive(Debug, Clone, Serialize)]
pub struct Peer {
    pub ip: String,
    pub api_port: u16,
    pub p2p_port: u16,
    pub height: Option<u64>,
    pub version: Option<String>,
    pub latency_ms: Option<u64>,
}

impl Peer {
    pub fn new(ip: impl Into<String>, api_port: u16, p2p_port: u16) -> Self {
        Peer {
            ip: ip.into(),
            api_port,
            p2p_port,
            height: None,
            version: None,
            latency_ms: None,
        }
    }

    /// `host:port` of the API endpoint
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.api_port)
    }

    fn identity(&self) -> (&str, u16, u16) {
        (&self.ip, self.api_port, self.p2p_port)
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Peer {}

impl Hash for Peer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.addr())
    }
}

/// One entry of a node's `/api/peers` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PeerDescriptor {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, alias = "latency")]
    pub delay: Option<u64>,
}

impl PeerDescriptor {
    /// V1 nodes report `"OK"`, V2 nodes an HTTP-like `200`.
    pub fn is_healthy(&self) -> bool {
        match &self.status {
            Some(Value::String(s)) => s == "OK",
            Some(Value::Number(n)) => n.as_u64() == Some(200),
            _ => false,
        }
    }

    /// Peer reachable on the listed port for both APIs.
    pub fn into_peer(self) -> Peer {
        let port = self.port;
        self.into_peer_with_api_port(port)
    }

    pub fn into_peer_with_api_port(self, api_port: u16) -> Peer {
        Peer {
            ip: self.ip,
            api_port,
            p2p_port: self.port,
            height: self.height,
            version: self.version,
            latency_ms: self.delay,
        }
    }
}

/// Loopback, private, link-local and unspecified addresses are never
/// useful as public peers.
pub fn is_non_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => non_public_v4(v4),
        IpAddr::V6(v6) => {
            // ::ffff:a.b.c.d is just an IPv4 address in disguise
            if let Some(v4) = v6.to_ipv4_mapped() {
                return non_public_v4(v4);
            }
            // fc00::/7 unique local, fe80::/10 link local
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}

fn non_public_v4(v4: Ipv4Addr) -> bool {
    v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
}
