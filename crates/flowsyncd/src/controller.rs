//! Controller facade.
//!
//! The surface the Web API layer and the switch transport call into.
//! Authentication happened upstream; by the time a mutation reaches
//! this type the operator is already trusted. Mutations write desired
//! state to the store and wake the owning worker; nothing here talks
//! to a switch directly.

use crate::engine::StatusBoard;
use flowsync_core::{
    CoreError, FlowTableMirror, ReconcileReason, ReconcileTask, RuleStore, SwitchRegistry,
    TaskSink,
};
use flowsync_types::{
    ConnectionState, DatapathId, FlowRule, InstallStatus, Port, SwitchCapabilities,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Operator-facing view of one switch's synchronization state.
#[derive(Debug, Clone)]
pub struct SwitchStatus {
    pub connection_state: ConnectionState,
    /// Entries believed installed on the switch.
    pub installed_count: usize,
    /// Active desired rules not yet confirmed installed.
    pub pending_count: usize,
    /// Most recent reconciliation error, if any.
    pub last_error: Option<String>,
}

/// Entry points exposed to the Web API layer and the switch
/// transport's connection callbacks.
pub struct Controller {
    registry: Arc<SwitchRegistry>,
    mirror: Arc<FlowTableMirror>,
    store: Arc<dyn RuleStore>,
    status: Arc<StatusBoard>,
    tasks: Arc<dyn TaskSink>,
}

impl Controller {
    pub fn new(
        registry: Arc<SwitchRegistry>,
        mirror: Arc<FlowTableMirror>,
        store: Arc<dyn RuleStore>,
        status: Arc<StatusBoard>,
        tasks: Arc<dyn TaskSink>,
    ) -> Self {
        Self {
            registry,
            mirror,
            store,
            status,
            tasks,
        }
    }

    /// Accepts a new desired rule: validates, persists, and wakes the
    /// target switch's worker. Returns the rule id.
    ///
    /// The switch does not have to be connected, or even known yet;
    /// the rule waits in the store until it is.
    pub async fn submit_rule(&self, rule: FlowRule) -> Result<Uuid, CoreError> {
        rule.validate()?;
        let rule_id = rule.id;
        let switch_id = rule.switch_id;
        info!(rule = %rule_id, switch = %switch_id, name = %rule.name, "rule submitted");
        self.store.insert_rule(rule).await?;
        self.tasks
            .enqueue(ReconcileTask::new(switch_id, ReconcileReason::RuleChanged));
        Ok(rule_id)
    }

    /// Retracts a rule: marks it inactive and wakes the worker, which
    /// issues the delete flow-mod before the rule disappears from the
    /// switch.
    pub async fn retract_rule(&self, rule_id: Uuid) -> Result<(), CoreError> {
        let rule = self.store.set_rule_active(rule_id, false).await?;
        info!(rule = %rule_id, switch = %rule.switch_id, "rule retracted");
        self.tasks.enqueue(ReconcileTask::new(
            rule.switch_id,
            ReconcileReason::RuleChanged,
        ));
        Ok(())
    }

    /// Synchronization status for one switch.
    pub async fn switch_status(&self, switch_id: DatapathId) -> Result<SwitchStatus, CoreError> {
        let connection_state = self.registry.connection_state(switch_id)?;
        let pending_count = self
            .store
            .list_active_rules(switch_id)
            .await?
            .iter()
            .filter(|r| r.status == InstallStatus::Pending)
            .count();
        Ok(SwitchStatus {
            connection_state,
            installed_count: self.mirror.installed_count(switch_id),
            pending_count,
            last_error: self.status.get(switch_id).last_error,
        })
    }

    /// Transport callback: switch completed its handshake.
    pub fn handle_connect(&self, switch_id: DatapathId, capabilities: SwitchCapabilities) {
        self.registry.register(switch_id, capabilities);
    }

    /// Transport callback: control session dropped.
    pub fn handle_disconnect(&self, switch_id: DatapathId) -> Result<(), CoreError> {
        self.registry.mark_disconnected(switch_id)
    }

    /// Transport callback: switch-reported port status change.
    pub fn handle_port_status(&self, switch_id: DatapathId, port: Port) -> Result<(), CoreError> {
        self.registry.update_port(switch_id, port)
    }

    /// Registry snapshot for operator listings.
    pub fn list_switches(&self) -> Vec<flowsync_core::SwitchSnapshot> {
        self.registry.list()
    }
}
