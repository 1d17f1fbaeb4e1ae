//! Switch transport seam.
//!
//! The lower-level switch session (the actual control protocol) is an
//! external collaborator. The engine only needs a capability to push
//! flow-mods and pull stats; connection lifecycle events flow the
//! other way, into the [`SwitchRegistry`](crate::SwitchRegistry) via
//! the daemon's connection callbacks.

use crate::error::TransportError;
use async_trait::async_trait;
use flowsync_types::{DatapathId, FlowMod, StatsReport};

/// Capability to talk to switches.
///
/// Both calls are asynchronous and resolve when the switch
/// acknowledges (or the session gives up). Errors are transient from
/// the caller's perspective; the engine owns retry policy.
#[async_trait]
pub trait SwitchTransport: Send + Sync {
    /// Sends one flow-mod and waits for the acknowledgement.
    async fn send_flow_mod(
        &self,
        switch_id: DatapathId,
        flow_mod: &FlowMod,
    ) -> Result<(), TransportError>;

    /// Requests a flow-stats report from the switch.
    async fn request_stats(&self, switch_id: DatapathId) -> Result<StatsReport, TransportError>;
}
