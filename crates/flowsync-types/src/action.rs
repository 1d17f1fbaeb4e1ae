//! Flow actions.

use crate::{PortNumber, VlanId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A primitive action applied to packets matching a flow entry.
///
/// Actions form an ordered list; the switch executes them in sequence.
/// `Drop` is terminal and must be the only action in its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    /// Forward out the given port.
    Output(PortNumber),
    /// Rewrite the VLAN tag.
    SetVlan(VlanId),
    /// Enqueue on the given egress QoS queue.
    SetQueue(u8),
    /// Rewrite the IP DSCP field.
    SetDscp(u8),
    /// Discard the packet.
    Drop,
}

impl FlowAction {
    /// Returns true for actions that end packet processing.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, FlowAction::Drop)
    }
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowAction::Output(port) => write!(f, "output:{}", port),
            FlowAction::SetVlan(vlan) => write!(f, "set_vlan:{}", vlan),
            FlowAction::SetQueue(q) => write!(f, "set_queue:{}", q),
            FlowAction::SetDscp(d) => write!(f, "set_dscp:{}", d),
            FlowAction::Drop => write!(f, "drop"),
        }
    }
}
