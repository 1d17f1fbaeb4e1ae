//! Auxiliary desired-state inputs: QoS policies and traffic rules.
//!
//! Neither entity is installed on a switch directly. Traffic rules are
//! expanded into per-switch flow rules along their forwarding path;
//! QoS policies decorate the expanded rules with queue/DSCP actions.

use crate::{DatapathId, IpProtocol, PortNumber, VlanId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bandwidth shaping / queueing policy referenced by traffic rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosPolicy {
    pub id: Uuid,
    pub name: String,
    /// Egress queue packets are steered to (0-7).
    pub queue_id: u8,
    /// Minimum guaranteed rate in kbps, if shaped.
    pub min_rate_kbps: Option<u64>,
    /// Maximum rate in kbps, if shaped.
    pub max_rate_kbps: Option<u64>,
    /// DSCP remark value (0-63), if marking is requested.
    pub dscp: Option<u8>,
    pub enabled: bool,
}

impl QosPolicy {
    /// Creates an enabled policy steering to the given queue.
    pub fn new(name: impl Into<String>, queue_id: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            queue_id,
            min_rate_kbps: None,
            max_rate_kbps: None,
            dscp: None,
            enabled: true,
        }
    }
}

/// Path selection strategy recorded on a traffic rule.
///
/// Path computation itself happens upstream; the engine only consumes
/// the materialized `forwarding_path`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    #[default]
    Shortest,
    LowestLatency,
    HighestBandwidth,
    Manual,
}

/// One hop on a traffic rule's forwarding path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHop {
    /// The switch this hop traverses.
    pub switch_id: DatapathId,
    /// Egress port toward the next hop (or the destination host on
    /// the final hop).
    pub out_port: PortNumber,
}

/// An end-to-end forwarding intent, expanded into one flow rule per
/// switch on its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRule {
    pub id: Uuid,
    pub name: String,
    /// Ordered list of hops from ingress to egress.
    pub forwarding_path: Vec<PathHop>,
    pub path_type: PathType,
    /// Protocol constraint carried into each expanded match.
    pub protocol: Option<IpProtocol>,
    /// VLAN constraint carried into each expanded match.
    pub vlan_id: Option<VlanId>,
    /// Source address constraint.
    pub src_ip: Option<std::net::IpAddr>,
    /// Destination address constraint.
    pub dst_ip: Option<std::net::IpAddr>,
    /// Priority for every expanded rule.
    pub priority: u16,
    /// QoS policy decorating the expanded rules, if any.
    pub qos_policy_id: Option<Uuid>,
    pub active: bool,
}

impl TrafficRule {
    /// Creates an active rule along the given path.
    pub fn new(name: impl Into<String>, forwarding_path: Vec<PathHop>, priority: u16) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            forwarding_path,
            path_type: PathType::default(),
            protocol: None,
            vlan_id: None,
            src_ip: None,
            dst_ip: None,
            priority,
            qos_policy_id: None,
            active: true,
        }
    }

    /// Returns true if the rule's path traverses the given switch.
    pub fn traverses(&self, switch_id: DatapathId) -> bool {
        self.forwarding_path.iter().any(|h| h.switch_id == switch_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(dpid: u64, port: u32) -> PathHop {
        PathHop {
            switch_id: DatapathId::new(dpid),
            out_port: PortNumber::new(port).unwrap(),
        }
    }

    #[test]
    fn test_traverses() {
        let rule = TrafficRule::new("h1-h2", vec![hop(1, 2), hop(2, 1)], 300);
        assert!(rule.traverses(DatapathId::new(1)));
        assert!(rule.traverses(DatapathId::new(2)));
        assert!(!rule.traverses(DatapathId::new(3)));
    }

    #[test]
    fn test_qos_policy_defaults() {
        let policy = QosPolicy::new("gold", 5);
        assert!(policy.enabled);
        assert_eq!(policy.dscp, None);
    }
}
