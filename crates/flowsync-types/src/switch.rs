//! Switch connection state and capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state of a switch as seen by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No active control session.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Control session established.
    Connected,
}

impl ConnectionState {
    /// Returns true if the control session is established.
    pub const fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Capabilities reported by a switch during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchCapabilities {
    /// Number of flow tables the switch supports.
    pub num_tables: u8,
    /// Number of physical ports.
    pub num_ports: u32,
    /// Free-form manufacturer description, if reported.
    pub description: Option<String>,
}

impl Default for SwitchCapabilities {
    fn default() -> Self {
        Self {
            num_tables: 255,
            num_ports: 0,
            description: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_capabilities_default() {
        let caps = SwitchCapabilities::default();
        assert_eq!(caps.num_tables, 255);
    }
}
