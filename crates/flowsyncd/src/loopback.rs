//! Loopback transport for standalone runs.
//!
//! Acknowledges every flow-mod and reports empty stats. Stands in for
//! a real switch session layer when the daemon runs without switches
//! attached (development, demos); tests script their own transport.

use async_trait::async_trait;
use flowsync_core::{SwitchTransport, TransportError};
use flowsync_types::{DatapathId, FlowMod, StatsReport};
use tracing::debug;

/// Transport that acks everything and sees no traffic.
#[derive(Debug, Default)]
pub struct LoopbackTransport;

#[async_trait]
impl SwitchTransport for LoopbackTransport {
    async fn send_flow_mod(
        &self,
        switch_id: DatapathId,
        flow_mod: &FlowMod,
    ) -> Result<(), TransportError> {
        debug!(switch = %switch_id, op = %flow_mod, "loopback ack");
        Ok(())
    }

    async fn request_stats(&self, _switch_id: DatapathId) -> Result<StatsReport, TransportError> {
        Ok(StatsReport::default())
    }
}
