//! Switch registry.
//!
//! Tracks which switches are currently connected, their capabilities,
//! and their switch-reported ports. Registration is idempotent and
//! disconnection is a state transition, not an eviction: a
//! disconnected switch keeps its record (and its desired rules stay
//! queued in the store) so they can be replayed on reconnect. Eviction
//! only happens through [`SwitchRegistry::remove`], which cascades to
//! the switch's ports.
//!
//! Lookups never create entries; operations on unknown switches fail
//! with [`CoreError::UnknownSwitch`].

use crate::error::{CoreError, Result};
use crate::task::{ReconcileReason, ReconcileTask, TaskSink};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use flowsync_types::{ConnectionState, DatapathId, Port, PortNumber, SwitchCapabilities};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry-internal record for one switch.
#[derive(Debug, Clone)]
struct SwitchRecord {
    state: ConnectionState,
    capabilities: SwitchCapabilities,
    ports: BTreeMap<PortNumber, Port>,
    last_seen: DateTime<Utc>,
    connected_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of one registered switch.
#[derive(Debug, Clone)]
pub struct SwitchSnapshot {
    pub switch_id: DatapathId,
    pub state: ConnectionState,
    pub capabilities: SwitchCapabilities,
    pub ports: Vec<Port>,
    pub last_seen: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

/// Tracks connected switches and their capabilities.
///
/// Connection-state transitions enqueue a `switch-reconnected`
/// reconciliation task through the injected [`TaskSink`], waking the
/// owning worker.
pub struct SwitchRegistry {
    switches: DashMap<DatapathId, SwitchRecord>,
    tasks: Arc<dyn TaskSink>,
}

impl SwitchRegistry {
    /// Creates an empty registry feeding tasks into `tasks`.
    pub fn new(tasks: Arc<dyn TaskSink>) -> Self {
        Self {
            switches: DashMap::new(),
            tasks,
        }
    }

    /// Registers a switch after a successful handshake.
    ///
    /// Idempotent: re-registering an already-connected switch
    /// refreshes its capabilities and `last_seen` without creating a
    /// duplicate or re-triggering reconciliation.
    pub fn register(&self, switch_id: DatapathId, capabilities: SwitchCapabilities) {
        use dashmap::mapref::entry::Entry;

        let now = Utc::now();
        let transitioned = match self.switches.entry(switch_id) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                record.capabilities = capabilities;
                record.last_seen = now;
                if record.state != ConnectionState::Connected {
                    record.state = ConnectionState::Connected;
                    record.connected_at = Some(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(SwitchRecord {
                    state: ConnectionState::Connected,
                    capabilities,
                    ports: BTreeMap::new(),
                    last_seen: now,
                    connected_at: Some(now),
                });
                true
            }
        };

        if transitioned {
            info!(switch = %switch_id, "switch connected");
            self.tasks.enqueue(ReconcileTask::new(
                switch_id,
                ReconcileReason::SwitchReconnected,
            ));
        } else {
            debug!(switch = %switch_id, "re-registration refreshed capabilities");
        }
    }

    /// Marks a switch disconnected.
    ///
    /// Ports and desired rules are untouched; they persist for replay
    /// on reconnect.
    pub fn mark_disconnected(&self, switch_id: DatapathId) -> Result<()> {
        let mut record = self
            .switches
            .get_mut(&switch_id)
            .ok_or(CoreError::UnknownSwitch(switch_id))?;

        if record.state == ConnectionState::Disconnected {
            debug!(switch = %switch_id, "already disconnected");
            return Ok(());
        }

        record.state = ConnectionState::Disconnected;
        record.last_seen = Utc::now();
        record.connected_at = None;
        drop(record);

        info!(switch = %switch_id, "switch disconnected");
        self.tasks.enqueue(ReconcileTask::new(
            switch_id,
            ReconcileReason::SwitchReconnected,
        ));
        Ok(())
    }

    /// Ingests a switch-reported port status update, creating or
    /// refreshing the port.
    pub fn update_port(&self, switch_id: DatapathId, port: Port) -> Result<()> {
        let mut record = self
            .switches
            .get_mut(&switch_id)
            .ok_or(CoreError::UnknownSwitch(switch_id))?;
        record.last_seen = Utc::now();
        debug!(switch = %switch_id, port = %port.number, state = %port.state, "port status");
        record.ports.insert(port.number, port);
        Ok(())
    }

    /// Explicitly evicts a switch, cascading to its ports.
    ///
    /// This is the only way a switch leaves the registry.
    pub fn remove(&self, switch_id: DatapathId) -> Result<SwitchSnapshot> {
        let (_, record) = self
            .switches
            .remove(&switch_id)
            .ok_or(CoreError::UnknownSwitch(switch_id))?;
        warn!(switch = %switch_id, ports = record.ports.len(), "switch evicted");
        Ok(snapshot_of(switch_id, &record))
    }

    /// Returns the connection state of a switch.
    pub fn connection_state(&self, switch_id: DatapathId) -> Result<ConnectionState> {
        self.switches
            .get(&switch_id)
            .map(|r| r.state)
            .ok_or(CoreError::UnknownSwitch(switch_id))
    }

    /// Returns true if the switch is registered and connected.
    ///
    /// Workers call this before every transport operation, so it must
    /// stay cheap.
    pub fn is_connected(&self, switch_id: DatapathId) -> bool {
        self.switches
            .get(&switch_id)
            .map(|r| r.state.is_connected())
            .unwrap_or(false)
    }

    /// Returns a snapshot of one switch.
    pub fn get(&self, switch_id: DatapathId) -> Result<SwitchSnapshot> {
        self.switches
            .get(&switch_id)
            .map(|r| snapshot_of(switch_id, &r))
            .ok_or(CoreError::UnknownSwitch(switch_id))
    }

    /// Snapshots every registered switch, ordered by datapath id.
    pub fn list(&self) -> Vec<SwitchSnapshot> {
        let mut all: Vec<SwitchSnapshot> = self
            .switches
            .iter()
            .map(|item| snapshot_of(*item.key(), item.value()))
            .collect();
        all.sort_by_key(|s| s.switch_id);
        all
    }

    /// Number of registered switches (connected or not).
    pub fn len(&self) -> usize {
        self.switches.len()
    }

    /// Returns true if no switch has ever registered.
    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }
}

fn snapshot_of(switch_id: DatapathId, record: &SwitchRecord) -> SwitchSnapshot {
    SwitchSnapshot {
        switch_id,
        state: record.state,
        capabilities: record.capabilities.clone(),
        ports: record.ports.values().cloned().collect(),
        last_seen: record.last_seen,
        connected_at: record.connected_at,
    }
}
