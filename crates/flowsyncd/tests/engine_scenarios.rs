//! End-to-end reconciliation scenarios against a scripted transport.
//!
//! The mock transport records every flow-mod in emission order and can
//! be told to fail the next N sends, which is enough to exercise the
//! retry, disconnect, and conflict paths without a real switch
//! session. All tests run on a paused clock, so backoff sleeps and the
//! audit timer advance instantly.

use async_trait::async_trait;
use flowsync_core::{MemoryRuleStore, RuleStore, SwitchTransport, TransportError};
use flowsync_types::{
    ConnectionState, DatapathId, FailReason, FlowAction, FlowMatch, FlowMod, FlowRule,
    InstallStatus, IpProtocol, PathHop, PortNumber, QosPolicy, StatsReport, SwitchCapabilities,
    TrafficRule,
};
use flowsyncd::config::DaemonConfig;
use flowsyncd::{Controller, Daemon};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Transport that records sends and fails on demand.
#[derive(Default)]
struct MockTransport {
    sent: Mutex<Vec<(DatapathId, FlowMod)>>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
    stats_requests: AtomicUsize,
}

impl MockTransport {
    fn sent_ops(&self) -> Vec<FlowMod> {
        self.sent.lock().iter().map(|(_, op)| op.clone()).collect()
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The next `n` sends will fail with a timeout.
    fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl SwitchTransport for MockTransport {
    async fn send_flow_mod(
        &self,
        switch_id: DatapathId,
        flow_mod: &FlowMod,
    ) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Timeout);
        }
        self.sent.lock().push((switch_id, flow_mod.clone()));
        Ok(())
    }

    async fn request_stats(&self, _switch_id: DatapathId) -> Result<StatsReport, TransportError> {
        self.stats_requests.fetch_add(1, Ordering::SeqCst);
        Ok(StatsReport::default())
    }
}

struct TestBed {
    store: Arc<MemoryRuleStore>,
    transport: Arc<MockTransport>,
    controller: Arc<Controller>,
}

fn spawn_daemon(config: DaemonConfig) -> TestBed {
    let store = Arc::new(MemoryRuleStore::new());
    let transport = Arc::new(MockTransport::default());
    let daemon = Daemon::new(store.clone(), transport.clone(), config);
    let controller = daemon.controller();
    tokio::spawn(daemon.run());
    TestBed {
        store,
        transport,
        controller,
    }
}

/// Default config with the audit timer disabled.
fn quiet_config() -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.engine.audit_interval_secs = 0;
    config
}

fn dpid() -> DatapathId {
    DatapathId::new(1)
}

fn drop_rule(priority: u16, dst_port: u16) -> FlowRule {
    FlowRule::new(
        format!("drop-{}", dst_port),
        dpid(),
        0,
        priority,
        FlowMatch::new().protocol(IpProtocol::Tcp).dst_port(dst_port),
        vec![FlowAction::Drop],
    )
}

/// Polls until the condition holds; the paused clock makes the sleeps
/// free.
async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for: {}", what);
}

async fn wait_rule_status(store: &MemoryRuleStore, rule_id: Uuid, status: InstallStatus) {
    for _ in 0..1_000 {
        if store
            .get_rule(rule_id)
            .await
            .map(|r| r.status == status)
            .unwrap_or(false)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("rule {} never reached {}", rule_id, status);
}

#[tokio::test(start_paused = true)]
async fn single_add_reaches_installed() {
    let bed = spawn_daemon(quiet_config());
    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());

    let rule_id = bed.controller.submit_rule(drop_rule(200, 80)).await.unwrap();
    wait_rule_status(&bed.store, rule_id, InstallStatus::Installed).await;

    // Exactly one Add went out.
    let ops = bed.transport.sent_ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(ops[0], FlowMod::Add(_)));

    let status = bed.controller.switch_status(dpid()).await.unwrap();
    assert_eq!(status.installed_count, 1);
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.last_error, None);
}

#[tokio::test(start_paused = true)]
async fn converged_audit_pass_sends_nothing() {
    let mut config = DaemonConfig::default();
    config.engine.audit_interval_secs = 1;
    let bed = spawn_daemon(config);
    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());

    let rule_id = bed.controller.submit_rule(drop_rule(200, 80)).await.unwrap();
    wait_rule_status(&bed.store, rule_id, InstallStatus::Installed).await;

    // Let at least two audit passes run.
    let transport = bed.transport.clone();
    wait_until("audit passes", || {
        transport.stats_requests.load(Ordering::SeqCst) >= 2
    })
    .await;

    // The desired set never changed, so the diff stayed empty: still
    // exactly one flow-mod ever sent.
    assert_eq!(bed.transport.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn ambiguous_tie_installs_earliest_fails_other() {
    let bed = spawn_daemon(quiet_config());
    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());

    let first = drop_rule(100, 80);
    let mut second = drop_rule(100, 80);
    // Same match, same priority, strictly later creation.
    second.created_at = first.created_at + chrono::Duration::seconds(1);
    let first_id = bed.controller.submit_rule(first).await.unwrap();
    let second_id = bed.controller.submit_rule(second).await.unwrap();

    wait_rule_status(&bed.store, first_id, InstallStatus::Installed).await;
    wait_rule_status(
        &bed.store,
        second_id,
        InstallStatus::Failed(FailReason::Conflict),
    )
    .await;

    // Only the winner was pushed.
    assert_eq!(bed.transport.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_budget_exhaustion_marks_install_failed() {
    let mut config = quiet_config();
    config.engine.retry.max_attempts = 3;
    let bed = spawn_daemon(config);
    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());

    // Fail more times than the budget allows.
    bed.transport.fail_next(10);
    let rule_id = bed.controller.submit_rule(drop_rule(200, 80)).await.unwrap();

    wait_rule_status(
        &bed.store,
        rule_id,
        InstallStatus::Failed(FailReason::InstallFailed),
    )
    .await;

    assert_eq!(bed.transport.attempt_count(), 3);
    let status = bed.controller.switch_status(dpid()).await.unwrap();
    assert_eq!(status.installed_count, 0);
    assert!(status.last_error.is_some());

    // No further automatic retry: attempts stay put.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(bed.transport.attempt_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn disconnect_mid_pass_never_marks_failed_and_reissues_on_reconnect() {
    let mut config = quiet_config();
    // Budget far larger than the test window, so the worker is still
    // retrying when the disconnect lands.
    config.engine.retry.max_attempts = 10_000;
    let bed = spawn_daemon(config);
    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());

    // Keep the transport failing so the worker sits in its retry loop.
    bed.transport.fail_next(usize::MAX);
    let rule_id = bed.controller.submit_rule(drop_rule(200, 80)).await.unwrap();

    let transport = bed.transport.clone();
    wait_until("first attempt", || transport.attempt_count() >= 1).await;

    // Drop the switch while the worker is applying/retrying, then wait
    // for the retry loop to notice and go quiet.
    bed.controller.handle_disconnect(dpid()).unwrap();
    let mut settled = false;
    for _ in 0..100 {
        let before = bed.transport.attempt_count();
        tokio::time::sleep(Duration::from_secs(30)).await;
        if bed.transport.attempt_count() == before {
            settled = true;
            break;
        }
    }
    assert!(settled, "retry loop kept running after disconnect");

    // Abort was clean: the rule is not failed and the switch reads
    // disconnected.
    let rule = bed.store.get_rule(rule_id).await.unwrap();
    assert!(!rule.status.is_failed(), "got {}", rule.status);
    let status = bed.controller.switch_status(dpid()).await.unwrap();
    assert_eq!(status.connection_state, ConnectionState::Disconnected);

    // Reconnect with a healthy transport: the fresh pass diffs against
    // an empty mirror and reissues the Add.
    bed.transport.fail_next(0);
    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());

    wait_rule_status(&bed.store, rule_id, InstallStatus::Installed).await;
    assert_eq!(bed.transport.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn retract_issues_delete_before_removal() {
    let bed = spawn_daemon(quiet_config());
    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());

    let rule_id = bed.controller.submit_rule(drop_rule(200, 80)).await.unwrap();
    wait_rule_status(&bed.store, rule_id, InstallStatus::Installed).await;

    bed.controller.retract_rule(rule_id).await.unwrap();
    let transport = bed.transport.clone();
    wait_until("delete sent", || transport.sent_count() == 2).await;

    let names: Vec<&str> = bed
        .transport
        .sent_ops()
        .iter()
        .map(|op| op.op_name())
        .collect();
    assert_eq!(names, vec!["add", "delete"]);
    let status = bed.controller.switch_status(dpid()).await.unwrap();
    assert_eq!(status.installed_count, 0);
}

#[tokio::test(start_paused = true)]
async fn traffic_rule_expands_with_qos_decoration() {
    let bed = spawn_daemon(quiet_config());

    let mut policy = QosPolicy::new("gold", 5);
    policy.dscp = Some(46);
    let mut traffic = TrafficRule::new(
        "h1-h2",
        vec![
            PathHop {
                switch_id: dpid(),
                out_port: PortNumber::new(2).unwrap(),
            },
            PathHop {
                switch_id: DatapathId::new(2),
                out_port: PortNumber::new(1).unwrap(),
            },
        ],
        300,
    );
    traffic.protocol = Some(IpProtocol::Udp);
    traffic.qos_policy_id = Some(policy.id);
    bed.store.insert_qos_policy(policy);
    bed.store.insert_traffic_rule(traffic);

    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());

    let transport = bed.transport.clone();
    wait_until("expanded rule installed", || transport.sent_count() >= 1).await;

    // This switch is the first hop: queue steering, DSCP remark, then
    // output toward the next hop.
    let ops = bed.transport.sent_ops();
    match &ops[0] {
        FlowMod::Add(entry) => {
            assert_eq!(
                entry.actions,
                vec![
                    FlowAction::SetQueue(5),
                    FlowAction::SetDscp(46),
                    FlowAction::Output(PortNumber::new(2).unwrap()),
                ]
            );
            assert_eq!(entry.key.priority, 300);
            assert_eq!(entry.key.r#match.protocol, Some(IpProtocol::Udp));
        }
        other => panic!("expected Add, got {}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn resubmitted_identical_rule_takes_over_installed_entry() {
    let bed = spawn_daemon(quiet_config());
    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());

    let rule = drop_rule(200, 80);
    let rule_id = bed.controller.submit_rule(rule.clone()).await.unwrap();
    wait_rule_status(&bed.store, rule_id, InstallStatus::Installed).await;

    // Retract and resubmit byte-identical content under a fresh id.
    // Both tasks land before the worker wakes, so they coalesce into
    // one pass whose diff is empty: the installed entry already
    // matches the replacement.
    bed.controller.retract_rule(rule_id).await.unwrap();
    let mut replacement = drop_rule(200, 80);
    replacement.name = rule.name.clone();
    let replacement_id = bed.controller.submit_rule(replacement).await.unwrap();

    // The replacement still reaches Installed even though no flow-mod
    // goes out: it adopts the entry left behind by its predecessor.
    wait_rule_status(&bed.store, replacement_id, InstallStatus::Installed).await;
    assert_eq!(bed.transport.sent_count(), 1);

    let status = bed.controller.switch_status(dpid()).await.unwrap();
    assert_eq!(status.installed_count, 1);
    assert_eq!(status.pending_count, 0);

    // And it stays quiet: later passes see a converged table.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(bed.transport.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn priority_change_deletes_old_entry_before_adding() {
    let bed = spawn_daemon(quiet_config());
    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());

    let rule = drop_rule(100, 80);
    let rule_id = bed.controller.submit_rule(rule.clone()).await.unwrap();
    wait_rule_status(&bed.store, rule_id, InstallStatus::Installed).await;

    // Same match at a new priority: a new entry key, so the pass must
    // delete the old entry before adding the new one.
    bed.controller.retract_rule(rule_id).await.unwrap();
    let mut replacement = drop_rule(200, 80);
    replacement.name = rule.name.clone();
    let replacement_id = bed.controller.submit_rule(replacement).await.unwrap();

    wait_rule_status(&bed.store, replacement_id, InstallStatus::Installed).await;

    let names: Vec<&str> = bed
        .transport
        .sent_ops()
        .iter()
        .map(|op| op.op_name())
        .collect();
    assert_eq!(names, vec!["add", "delete", "add"]);
}

#[tokio::test(start_paused = true)]
async fn rule_for_unknown_switch_waits_for_connect() {
    let bed = spawn_daemon(quiet_config());

    // Submitting before the switch ever connected is fine; nothing is
    // sent until it shows up.
    let rule_id = bed.controller.submit_rule(drop_rule(200, 80)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(bed.transport.sent_count(), 0);
    let rule = bed.store.get_rule(rule_id).await.unwrap();
    assert_eq!(rule.status, InstallStatus::Pending);

    bed.controller
        .handle_connect(dpid(), SwitchCapabilities::default());
    wait_rule_status(&bed.store, rule_id, InstallStatus::Installed).await;
}
