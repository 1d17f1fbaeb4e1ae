//! Switch port status and counters.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// OpenFlow port number.
///
/// Port numbers above `0xffffff00` are reserved for logical ports
/// (controller, flood, all, ...); physical ports start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNumber(u32);

impl PortNumber {
    /// Highest valid physical port number.
    pub const MAX_PHYSICAL: u32 = 0xffff_ff00 - 1;

    /// Creates a physical port number.
    ///
    /// # Errors
    ///
    /// Returns an error for port 0 or numbers in the reserved range.
    pub const fn new(n: u32) -> Result<Self, ParseError> {
        if n >= 1 && n <= Self::MAX_PHYSICAL {
            Ok(PortNumber(n))
        } else {
            Err(ParseError::InvalidPortNumber(n))
        }
    }

    /// Returns the raw port number.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Administrative / operational state of a port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Link up, forwarding.
    Up,
    /// Link down.
    #[default]
    Down,
    /// Administratively blocked (e.g. by spanning tree).
    Blocked,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::Up => write!(f, "up"),
            PortState::Down => write!(f, "down"),
            PortState::Blocked => write!(f, "blocked"),
        }
    }
}

/// Monotonic traffic counters for a port.
///
/// Counters only move forward; they reset to zero only when the
/// owning switch resets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCounters {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

/// A switch port as reported by the switch.
///
/// Ports are exclusively owned by their switch: they are created and
/// updated from switch-reported port status messages and removed only
/// when the switch itself is evicted from the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Port number, unique within the switch.
    pub number: PortNumber,
    /// Interface name (e.g. "s1-eth1").
    pub name: String,
    /// Hardware address, if reported.
    pub hw_addr: Option<String>,
    /// Current port state.
    pub state: PortState,
    /// Current speed in kbps, if reported.
    pub curr_speed: Option<u64>,
    /// Traffic counters.
    pub counters: PortCounters,
}

impl Port {
    /// Creates a port in the default `Down` state with zero counters.
    pub fn new(number: PortNumber, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            hw_addr: None,
            state: PortState::default(),
            curr_speed: None,
            counters: PortCounters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_number_validation() {
        assert!(PortNumber::new(0).is_err());
        assert!(PortNumber::new(1).is_ok());
        assert!(PortNumber::new(PortNumber::MAX_PHYSICAL).is_ok());
        assert!(PortNumber::new(0xffff_ff00).is_err());
    }

    #[test]
    fn test_port_defaults() {
        let port = Port::new(PortNumber::new(1).unwrap(), "s1-eth1");
        assert_eq!(port.state, PortState::Down);
        assert_eq!(port.counters, PortCounters::default());
    }

    #[test]
    fn test_port_state_display() {
        assert_eq!(PortState::Up.to_string(), "up");
        assert_eq!(PortState::Blocked.to_string(), "blocked");
    }
}
