//! Flow match predicates.
//!
//! A match predicate is the structured set of packet-header fields a
//! flow entry matches against. All fields are optional; an unset field
//! is a wildcard. Together with table id and priority, the match
//! predicate identifies a flow entry on a switch, so the type is
//! `Eq + Hash` and field order never affects identity.

use crate::{ParseError, PortNumber, VlanId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// IP protocol selector for a match predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpProtocol {
    Tcp,
    Udp,
    Icmp,
    /// Any other protocol, by IANA number.
    Other(u8),
}

impl IpProtocol {
    /// Returns the IANA protocol number.
    pub const fn number(&self) -> u8 {
        match self {
            IpProtocol::Icmp => 1,
            IpProtocol::Tcp => 6,
            IpProtocol::Udp => 17,
            IpProtocol::Other(n) => *n,
        }
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpProtocol::Tcp => write!(f, "tcp"),
            IpProtocol::Udp => write!(f, "udp"),
            IpProtocol::Icmp => write!(f, "icmp"),
            IpProtocol::Other(n) => write!(f, "proto-{}", n),
        }
    }
}

impl FromStr for IpProtocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(IpProtocol::Tcp),
            "udp" => Ok(IpProtocol::Udp),
            "icmp" => Ok(IpProtocol::Icmp),
            other => other
                .parse::<u8>()
                .map(IpProtocol::Other)
                .map_err(|_| ParseError::InvalidIpProtocol(s.to_string())),
        }
    }
}

/// Structured packet-header match predicate.
///
/// # Examples
///
/// ```
/// use flowsync_types::{FlowMatch, IpProtocol};
///
/// let m = FlowMatch::new()
///     .src_ip("192.168.1.10".parse().unwrap())
///     .dst_ip("172.16.0.1".parse().unwrap())
///     .protocol(IpProtocol::Tcp)
///     .dst_port(80);
/// assert!(!m.is_wildcard());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMatch {
    /// Source IP address.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub src_ip: Option<IpAddr>,
    /// Destination IP address.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dst_ip: Option<IpAddr>,
    /// Transport-layer source port.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub src_port: Option<u16>,
    /// Transport-layer destination port.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dst_port: Option<u16>,
    /// IP protocol.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub protocol: Option<IpProtocol>,
    /// VLAN tag.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vlan_id: Option<VlanId>,
    /// Ingress switch port.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub in_port: Option<PortNumber>,
}

impl FlowMatch {
    /// Creates an all-wildcard match.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source IP field.
    pub fn src_ip(mut self, addr: IpAddr) -> Self {
        self.src_ip = Some(addr);
        self
    }

    /// Sets the destination IP field.
    pub fn dst_ip(mut self, addr: IpAddr) -> Self {
        self.dst_ip = Some(addr);
        self
    }

    /// Sets the transport source port field.
    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = Some(port);
        self
    }

    /// Sets the transport destination port field.
    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = Some(port);
        self
    }

    /// Sets the IP protocol field.
    pub fn protocol(mut self, proto: IpProtocol) -> Self {
        self.protocol = Some(proto);
        self
    }

    /// Sets the VLAN field.
    pub fn vlan(mut self, vlan: VlanId) -> Self {
        self.vlan_id = Some(vlan);
        self
    }

    /// Sets the ingress port field.
    pub fn in_port(mut self, port: PortNumber) -> Self {
        self.in_port = Some(port);
        self
    }

    /// Returns true if every field is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.src_ip.is_none()
            && self.dst_ip.is_none()
            && self.src_port.is_none()
            && self.dst_port.is_none()
            && self.protocol.is_none()
            && self.vlan_id.is_none()
            && self.in_port.is_none()
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wildcard() {
            return write!(f, "any");
        }
        let mut sep = "";
        let mut field = |f: &mut fmt::Formatter<'_>, name: &str, value: String| {
            let r = write!(f, "{}{}={}", sep, name, value);
            sep = ",";
            r
        };
        if let Some(p) = self.in_port {
            field(f, "in_port", p.to_string())?;
        }
        if let Some(v) = self.vlan_id {
            field(f, "vlan", v.to_string())?;
        }
        if let Some(ip) = self.src_ip {
            field(f, "src", ip.to_string())?;
        }
        if let Some(ip) = self.dst_ip {
            field(f, "dst", ip.to_string())?;
        }
        if let Some(p) = self.protocol {
            field(f, "proto", p.to_string())?;
        }
        if let Some(p) = self.src_port {
            field(f, "sport", p.to_string())?;
        }
        if let Some(p) = self.dst_port {
            field(f, "dport", p.to_string())?;
        }
        Ok(())
    }
}
