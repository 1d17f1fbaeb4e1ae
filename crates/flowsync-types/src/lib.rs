//! Common flowsync types for SDN flow-rule synchronization.
//!
//! This crate provides the shared domain vocabulary used across the
//! flowsync control plane:
//!
//! - [`DatapathId`]: OpenFlow datapath identifiers
//! - [`FlowMatch`]: structured packet-header match predicates
//! - [`FlowAction`]: primitive forwarding actions
//! - [`FlowRule`]: operator-declared desired-state rules
//! - [`FlowEntry`] / [`EntryKey`] / [`FlowMod`]: installed-entry view
//!   and the control operations that mutate it
//! - [`Port`]: switch-reported port status and counters
//! - [`QosPolicy`] / [`TrafficRule`]: auxiliary desired-state inputs
//!
//! Everything here is plain data: no async, no I/O, no interior
//! mutability. The core and daemon crates build on top of these.

mod action;
mod dpid;
mod entry;
mod flow_match;
mod policy;
mod port;
mod rule;
mod switch;
mod vlan;

pub use action::FlowAction;
pub use dpid::DatapathId;
pub use entry::{EntryKey, FlowEntry, FlowMod, FlowStats, StatsReport};
pub use flow_match::{FlowMatch, IpProtocol};
pub use policy::{PathHop, PathType, QosPolicy, TrafficRule};
pub use port::{Port, PortCounters, PortNumber, PortState};
pub use rule::{FailReason, FlowRule, InstallStatus, RuleCounters};
pub use switch::{ConnectionState, SwitchCapabilities};
pub use vlan::VlanId;

/// Common error type for parsing and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid datapath id: {0}")]
    InvalidDatapathId(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("invalid IP protocol: {0}")]
    InvalidIpProtocol(String),

    #[error("invalid port number: {0}")]
    InvalidPortNumber(u32),

    #[error("empty match predicate")]
    EmptyMatch,

    #[error("empty action list")]
    EmptyActions,
}
