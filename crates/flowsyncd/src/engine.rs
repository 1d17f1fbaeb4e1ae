//! Reconciliation engine.
//!
//! One worker task per switch, spawned on first demand. Workers are
//! strictly serial within a switch and fully parallel across switches;
//! the mirror for a switch is only ever touched by its worker. Tasks
//! arriving while a pass runs pile up in the worker's channel and are
//! coalesced into a single re-run, which bounds work under rule-edit
//! storms.
//!
//! A pass walks the state machine `Idle → Diffing → Applying → Idle`,
//! detouring `Applying → Retrying → Applying` on transient transport
//! failure and giving up on a rule after the configured attempt
//! budget. A switch disconnect mid-pass aborts cleanly: on-switch
//! state is unknown, not wrong, so nothing is marked failed.

use crate::config::EngineConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use flowsync_core::{
    diff, expand_for_switch, resolve, FlowTableMirror, ReconcileReason, ReconcileTask, RuleStore,
    StoreError, SwitchRegistry, SwitchTransport, TaskSink,
};
use flowsync_types::{DatapathId, FailReason, FlowEntry, FlowMod, FlowRule, InstallStatus};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unbounded task queue; the sending half is the [`TaskSink`] handed
/// to the registry and the controller facade.
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<ReconcileTask>,
}

impl TaskQueue {
    /// Creates the queue, returning the sink and the receiving half
    /// the engine consumes.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ReconcileTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl TaskSink for TaskQueue {
    fn enqueue(&self, task: ReconcileTask) {
        // A closed channel means the engine is shutting down; tasks
        // are ephemeral, dropping them is correct.
        let _ = self.tx.send(task);
    }
}

/// Where a switch's worker currently is in its pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassState {
    #[default]
    Idle,
    Diffing,
    Applying,
    Retrying,
}

impl std::fmt::Display for PassState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassState::Idle => write!(f, "idle"),
            PassState::Diffing => write!(f, "diffing"),
            PassState::Applying => write!(f, "applying"),
            PassState::Retrying => write!(f, "retrying"),
        }
    }
}

/// Per-switch synchronization status, readable by the controller
/// facade while the worker runs.
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    pub state: PassState,
    pub last_error: Option<String>,
    pub last_pass_at: Option<DateTime<Utc>>,
}

/// Shared per-switch status map.
#[derive(Default)]
pub struct StatusBoard {
    inner: DashMap<DatapathId, SyncStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_state(&self, switch_id: DatapathId, state: PassState) {
        let mut status = self.inner.entry(switch_id).or_default();
        status.state = state;
        if state == PassState::Idle {
            status.last_pass_at = Some(Utc::now());
        }
    }

    fn record_error(&self, switch_id: DatapathId, message: impl Into<String>) {
        self.inner.entry(switch_id).or_default().last_error = Some(message.into());
    }

    fn clear_error(&self, switch_id: DatapathId) {
        self.inner.entry(switch_id).or_default().last_error = None;
    }

    /// Snapshot of one switch's status (default when never seen).
    pub fn get(&self, switch_id: DatapathId) -> SyncStatus {
        self.inner
            .get(&switch_id)
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

/// Everything a worker needs for a pass.
struct WorkerCtx {
    registry: Arc<SwitchRegistry>,
    mirror: Arc<FlowTableMirror>,
    store: Arc<dyn RuleStore>,
    transport: Arc<dyn SwitchTransport>,
    status: Arc<StatusBoard>,
    config: EngineConfig,
}

/// Routes reconciliation tasks to per-switch workers.
pub struct ReconcileEngine {
    ctx: Arc<WorkerCtx>,
    workers: DashMap<DatapathId, mpsc::UnboundedSender<ReconcileTask>>,
}

impl ReconcileEngine {
    pub fn new(
        registry: Arc<SwitchRegistry>,
        mirror: Arc<FlowTableMirror>,
        store: Arc<dyn RuleStore>,
        transport: Arc<dyn SwitchTransport>,
        status: Arc<StatusBoard>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ctx: Arc::new(WorkerCtx {
                registry,
                mirror,
                store,
                transport,
                status,
                config,
            }),
            workers: DashMap::new(),
        }
    }

    /// Consumes the task queue, routing each task to the owning
    /// worker. Returns when every sink handle has been dropped.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<ReconcileTask>) {
        info!("reconciliation engine started");
        while let Some(task) = rx.recv().await {
            self.dispatch(task);
        }
        info!("reconciliation engine stopped");
    }

    fn dispatch(&self, task: ReconcileTask) {
        let tx = self
            .workers
            .entry(task.switch_id)
            .or_insert_with(|| {
                let (tx, worker_rx) = mpsc::unbounded_channel();
                let ctx = Arc::clone(&self.ctx);
                let switch_id = task.switch_id;
                debug!(switch = %switch_id, "spawning worker");
                tokio::spawn(worker_loop(ctx, switch_id, worker_rx));
                tx
            })
            .clone();
        // A dead worker only happens at shutdown; dropping is fine.
        let _ = tx.send(task);
    }
}

/// Serial pass loop for one switch.
async fn worker_loop(
    ctx: Arc<WorkerCtx>,
    switch_id: DatapathId,
    mut rx: mpsc::UnboundedReceiver<ReconcileTask>,
) {
    while let Some(mut task) = rx.recv().await {
        // Everything queued while the previous pass ran collapses
        // into one re-run with the strongest reason.
        while let Ok(later) = rx.try_recv() {
            task = task.coalesce(later);
        }
        run_pass(&ctx, task).await;
    }
    debug!(switch = %switch_id, "worker stopped");
}

async fn run_pass(ctx: &WorkerCtx, task: ReconcileTask) {
    let switch_id = task.switch_id;
    debug!(switch = %switch_id, reason = %task.reason, "pass start");

    if !ctx.registry.is_connected(switch_id) {
        handle_offline(ctx, switch_id).await;
        return;
    }

    ctx.status.set_state(switch_id, PassState::Diffing);
    if let Err(err) = reconcile(ctx, task).await {
        // Store failures are infrastructure trouble, not rule
        // outcomes; the next task retries the whole pass.
        warn!(switch = %switch_id, %err, "pass aborted on store error");
        ctx.status.record_error(switch_id, err.to_string());
    }
    ctx.status.set_state(switch_id, PassState::Idle);
    debug!(switch = %switch_id, "pass end");
}

/// Disconnect handling: on-switch state is unknown, so believed-
/// installed rules go `Stale` and the mirror is forgotten. The next
/// reconnect pass diffs against an empty mirror and reissues all Adds.
async fn handle_offline(ctx: &WorkerCtx, switch_id: DatapathId) {
    let believed = ctx.mirror.snapshot(switch_id);
    debug!(switch = %switch_id, entries = believed.len(), "switch offline, marking stale");
    for entry in believed {
        if let Some(rule_id) = entry.rule_id {
            let result = ctx
                .store
                .update_status(rule_id, InstallStatus::Stale, None)
                .await;
            if let Err(err) = ignore_unknown(result) {
                warn!(switch = %switch_id, rule = %rule_id, %err, "failed to mark rule stale");
                ctx.status.record_error(switch_id, err.to_string());
            }
        }
    }
    ctx.mirror.clear(switch_id);
    ctx.status.set_state(switch_id, PassState::Idle);
}

async fn reconcile(ctx: &WorkerCtx, task: ReconcileTask) -> Result<(), StoreError> {
    let switch_id = task.switch_id;

    // 1. Desired set: direct rules plus traffic/QoS expansion.
    let mut desired = ctx.store.list_active_rules(switch_id).await?;
    let traffic_rules = ctx.store.list_traffic_rules().await?;
    let qos_policies = ctx.store.list_qos_policies().await?;
    desired.extend(expand_for_switch(switch_id, &traffic_rules, &qos_policies));

    // 2. Conflict resolution per table; rejects become failed(conflict).
    let mut by_table: BTreeMap<u8, Vec<FlowRule>> = BTreeMap::new();
    for rule in desired {
        by_table.entry(rule.table_id).or_default().push(rule);
    }
    let mut accepted = Vec::new();
    for (table_id, candidates) in by_table {
        let resolution = resolve(candidates);
        for (rejected, winner) in resolution.rejected {
            warn!(
                switch = %switch_id,
                table = table_id,
                rule = %rejected.id,
                %winner,
                "rule rejected: ambiguous tie"
            );
            ignore_unknown(
                ctx.store
                    .update_status(
                        rejected.id,
                        InstallStatus::Failed(FailReason::Conflict),
                        None,
                    )
                    .await,
            )?;
        }
        accepted.extend(resolution.accepted);
    }

    // 3. Diff against the mirror.
    let desired_entries: Vec<FlowEntry> = accepted.iter().map(FlowRule::to_entry).collect();
    let ops = diff(&desired_entries, &ctx.mirror.snapshot(switch_id));

    // 4. Converged entries can still change owners: a rule retracted
    // and resubmitted with identical content lands on an entry that is
    // already installed, so no flow-mod goes out, but ownership and
    // status must still move onto the new rule. Without this the
    // replacement sits pending forever and audits write status onto
    // the retracted predecessor.
    for rule in &accepted {
        let wanted = rule.to_entry();
        let Some(installed) = ctx.mirror.get(switch_id, &wanted.key) else {
            continue;
        };
        if installed.differs_from(&wanted) {
            continue;
        }
        if installed.rule_id != Some(rule.id) {
            ctx.mirror.adopt(switch_id, &wanted.key, rule.id);
        }
        if rule.status != InstallStatus::Installed {
            ignore_unknown(
                ctx.store
                    .update_status(rule.id, InstallStatus::Installed, None)
                    .await,
            )?;
        }
    }

    // 5. Apply, deletes first (ordering fixed by the diff).
    if !ops.is_empty() {
        info!(switch = %switch_id, ops = ops.len(), "applying changeset");
        ctx.status.set_state(switch_id, PassState::Applying);
        for op in ops {
            if !ctx.registry.is_connected(switch_id) {
                debug!(switch = %switch_id, "switch dropped mid-pass, aborting");
                return Ok(());
            }
            match apply_with_retry(ctx, switch_id, &op).await {
                ApplyOutcome::Applied => {
                    ctx.status.clear_error(switch_id);
                    if let Some(rule_id) = rule_id_of(&op) {
                        ignore_unknown(
                            ctx.store
                                .update_status(rule_id, InstallStatus::Installed, None)
                                .await,
                        )?;
                    }
                }
                ApplyOutcome::Exhausted(message) => {
                    warn!(switch = %switch_id, op = %op, "giving up after retry budget");
                    ctx.status.record_error(switch_id, &message);
                    if let Some(rule_id) = rule_id_of(&op) {
                        ignore_unknown(
                            ctx.store
                                .update_status(
                                    rule_id,
                                    InstallStatus::Failed(FailReason::InstallFailed),
                                    None,
                                )
                                .await,
                        )?;
                    }
                }
                ApplyOutcome::Disconnected => {
                    debug!(switch = %switch_id, "switch dropped while retrying, aborting");
                    return Ok(());
                }
            }
        }
    }

    // 6. Stats refresh on audit passes.
    if task.reason == ReconcileReason::PeriodicAudit {
        refresh_stats(ctx, switch_id).await;
    }
    Ok(())
}

enum ApplyOutcome {
    Applied,
    Exhausted(String),
    Disconnected,
}

/// Sends one flow-mod with optimistic mirror update, rolling the
/// mirror back on each failed attempt and backing off exponentially
/// between attempts.
async fn apply_with_retry(ctx: &WorkerCtx, switch_id: DatapathId, op: &FlowMod) -> ApplyOutcome {
    let retry = &ctx.config.retry;
    let max_attempts = retry.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let applied = ctx.mirror.apply(switch_id, op);
        match ctx.transport.send_flow_mod(switch_id, op).await {
            Ok(()) => {
                ctx.mirror.confirm(applied);
                return ApplyOutcome::Applied;
            }
            Err(err) => {
                ctx.mirror.revert(applied);
                warn!(switch = %switch_id, op = %op, attempt, %err, "flow-mod failed");
                if attempt == max_attempts {
                    return ApplyOutcome::Exhausted(err.to_string());
                }
                ctx.status.set_state(switch_id, PassState::Retrying);
                tokio::time::sleep(jittered(retry.backoff_delay(attempt))).await;
                if !ctx.registry.is_connected(switch_id) {
                    return ApplyOutcome::Disconnected;
                }
                ctx.status.set_state(switch_id, PassState::Applying);
            }
        }
    }
    ApplyOutcome::Exhausted("retry budget is zero".to_string())
}

async fn refresh_stats(ctx: &WorkerCtx, switch_id: DatapathId) {
    let report = match ctx.transport.request_stats(switch_id).await {
        Ok(report) => report,
        Err(err) => {
            debug!(switch = %switch_id, %err, "stats request failed");
            return;
        }
    };
    ctx.mirror.ingest_stats(switch_id, &report);
    for stats in &report.flows {
        // Only entries the mirror still tracks feed back into rule
        // counters; anything else is a stale ack and is dropped.
        let Some(entry) = ctx.mirror.get(switch_id, &stats.key) else {
            continue;
        };
        if let Some(rule_id) = entry.rule_id {
            let _ = ctx
                .store
                .update_status(rule_id, InstallStatus::Installed, Some(stats.counters))
                .await;
        }
    }
}

/// The desired rule behind an operation, if any. Deletes target
/// entries leaving the desired set, so there is no status to write.
fn rule_id_of(op: &FlowMod) -> Option<Uuid> {
    match op {
        FlowMod::Add(entry) | FlowMod::Modify(entry) => entry.rule_id,
        FlowMod::Delete(_) => None,
    }
}

/// Status updates for rules deleted mid-flight hit `UnknownRule`;
/// that is the stale-mirror case and is discarded silently.
fn ignore_unknown(result: Result<(), StoreError>) -> Result<(), StoreError> {
    match result {
        Err(StoreError::UnknownRule(_)) => Ok(()),
        other => other,
    }
}

/// Half-fixed, half-random jitter keeps retry herds apart without
/// collapsing the delay to zero.
fn jittered(delay: Duration) -> Duration {
    let half = delay / 2;
    half + rand::thread_rng().gen_range(Duration::ZERO..=half)
}

/// Periodically wakes every connected switch for a stats audit pass.
pub async fn run_audit_timer(
    registry: Arc<SwitchRegistry>,
    sink: Arc<dyn TaskSink>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await; // first tick fires immediately; skip it
    loop {
        ticker.tick().await;
        for switch in registry.list() {
            if switch.state.is_connected() {
                sink.enqueue(ReconcileTask::new(
                    switch.switch_id,
                    ReconcileReason::PeriodicAudit,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowsync_core::TransportError;
    use flowsync_types::{
        EntryKey, FlowAction, FlowMatch, QosPolicy, RuleCounters, StatsReport, TrafficRule,
    };

    #[test]
    fn test_jitter_stays_within_delay() {
        let delay = Duration::from_millis(400);
        for _ in 0..100 {
            let j = jittered(delay);
            assert!(j >= delay / 2 && j <= delay);
        }
    }

    #[test]
    fn test_rule_id_of_delete_is_none() {
        let key = EntryKey::new(0, 100, FlowMatch::new().dst_port(80));
        assert_eq!(rule_id_of(&FlowMod::Delete(key)), None);
    }

    #[test]
    fn test_ignore_unknown_passes_backend_errors() {
        assert!(ignore_unknown(Err(StoreError::UnknownRule(Uuid::new_v4()))).is_ok());
        assert!(ignore_unknown(Err(StoreError::Backend("down".into()))).is_err());
        assert!(ignore_unknown(Ok(())).is_ok());
    }

    /// Store whose status writes always fail with a backend error.
    struct FailingStore;

    #[async_trait]
    impl RuleStore for FailingStore {
        async fn list_active_rules(
            &self,
            _switch_id: DatapathId,
        ) -> Result<Vec<FlowRule>, StoreError> {
            Ok(Vec::new())
        }

        async fn list_traffic_rules(&self) -> Result<Vec<TrafficRule>, StoreError> {
            Ok(Vec::new())
        }

        async fn list_qos_policies(&self) -> Result<Vec<QosPolicy>, StoreError> {
            Ok(Vec::new())
        }

        async fn update_status(
            &self,
            _rule_id: Uuid,
            _status: InstallStatus,
            _counters: Option<RuleCounters>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend("store unavailable".into()))
        }

        async fn insert_rule(&self, _rule: FlowRule) -> Result<(), StoreError> {
            Ok(())
        }

        async fn set_rule_active(
            &self,
            rule_id: Uuid,
            _active: bool,
        ) -> Result<FlowRule, StoreError> {
            Err(StoreError::UnknownRule(rule_id))
        }

        async fn get_rule(&self, rule_id: Uuid) -> Result<FlowRule, StoreError> {
            Err(StoreError::UnknownRule(rule_id))
        }
    }

    struct NullTransport;

    #[async_trait]
    impl SwitchTransport for NullTransport {
        async fn send_flow_mod(
            &self,
            _switch_id: DatapathId,
            _flow_mod: &FlowMod,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn request_stats(
            &self,
            _switch_id: DatapathId,
        ) -> Result<StatsReport, TransportError> {
            Ok(StatsReport { flows: Vec::new() })
        }
    }

    #[tokio::test]
    async fn test_offline_pass_survives_store_failure() {
        let (queue, _rx) = TaskQueue::new();
        let ctx = WorkerCtx {
            registry: Arc::new(SwitchRegistry::new(queue)),
            mirror: Arc::new(FlowTableMirror::new()),
            store: Arc::new(FailingStore),
            transport: Arc::new(NullTransport),
            status: Arc::new(StatusBoard::new()),
            config: EngineConfig::default(),
        };
        let dpid = DatapathId::new(7);
        let key = EntryKey::new(0, 100, FlowMatch::new().dst_port(80));
        let entry = FlowEntry::new(key, vec![FlowAction::Drop], Some(Uuid::new_v4()));
        ctx.mirror.apply(dpid, &FlowMod::Add(entry));

        handle_offline(&ctx, dpid).await;

        // The mirror is still forgotten and the failure is surfaced.
        assert_eq!(ctx.mirror.installed_count(dpid), 0);
        assert!(ctx.status.get(dpid).last_error.is_some());
    }

    #[test]
    fn test_status_board_tracks_state_and_errors() {
        let board = StatusBoard::new();
        let dpid = DatapathId::new(1);

        assert_eq!(board.get(dpid).state, PassState::Idle);
        board.set_state(dpid, PassState::Applying);
        board.record_error(dpid, "timeout");
        assert_eq!(board.get(dpid).state, PassState::Applying);
        assert_eq!(board.get(dpid).last_error.as_deref(), Some("timeout"));

        board.set_state(dpid, PassState::Idle);
        assert!(board.get(dpid).last_pass_at.is_some());
        board.clear_error(dpid);
        assert_eq!(board.get(dpid).last_error, None);
    }
}
