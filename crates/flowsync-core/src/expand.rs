//! Traffic-rule and QoS-policy expansion.
//!
//! A traffic rule is an end-to-end forwarding intent; per switch it
//! materializes as one flow rule outputting toward the next hop. An
//! attached QoS policy decorates each expanded rule with queue
//! steering and, when configured, DSCP marking, ahead of the output
//! action.
//!
//! Expanded rule ids are a deterministic function of (traffic rule id,
//! hop index), so re-expanding an unchanged traffic rule yields
//! byte-identical rules and an empty diff.

use chrono::{DateTime, Utc};
use flowsync_types::{
    DatapathId, FlowAction, FlowMatch, FlowRule, InstallStatus, QosPolicy, RuleCounters,
    TrafficRule,
};
use uuid::Uuid;

/// Expands every traffic rule traversing `switch_id` into flow rules
/// for that switch.
///
/// Inactive traffic rules and disabled policies are already filtered
/// out by the store; a dangling `qos_policy_id` simply expands without
/// decoration.
pub fn expand_for_switch(
    switch_id: DatapathId,
    traffic_rules: &[TrafficRule],
    qos_policies: &[QosPolicy],
) -> Vec<FlowRule> {
    let mut expanded = Vec::new();
    for traffic_rule in traffic_rules {
        let policy = traffic_rule
            .qos_policy_id
            .and_then(|id| qos_policies.iter().find(|p| p.id == id));
        for (hop_index, hop) in traffic_rule.forwarding_path.iter().enumerate() {
            if hop.switch_id != switch_id {
                continue;
            }
            expanded.push(expand_hop(traffic_rule, hop_index, policy));
        }
    }
    expanded
}

fn expand_hop(
    traffic_rule: &TrafficRule,
    hop_index: usize,
    policy: Option<&QosPolicy>,
) -> FlowRule {
    let hop = &traffic_rule.forwarding_path[hop_index];

    let mut r#match = FlowMatch::new();
    r#match.src_ip = traffic_rule.src_ip;
    r#match.dst_ip = traffic_rule.dst_ip;
    r#match.protocol = traffic_rule.protocol;
    r#match.vlan_id = traffic_rule.vlan_id;

    let mut actions = Vec::new();
    if let Some(policy) = policy {
        actions.push(FlowAction::SetQueue(policy.queue_id));
        if let Some(dscp) = policy.dscp {
            actions.push(FlowAction::SetDscp(dscp));
        }
    }
    actions.push(FlowAction::Output(hop.out_port));

    FlowRule {
        id: derived_rule_id(traffic_rule.id, hop_index),
        name: format!("{}#{}", traffic_rule.name, hop_index),
        switch_id: hop.switch_id,
        table_id: 0,
        priority: traffic_rule.priority,
        r#match,
        actions,
        idle_timeout: 0,
        hard_timeout: 0,
        active: true,
        status: InstallStatus::Pending,
        counters: RuleCounters::default(),
        created_at: derived_created_at(traffic_rule.id),
    }
}

/// Deterministic id for the expansion of one hop.
fn derived_rule_id(traffic_rule_id: Uuid, hop_index: usize) -> Uuid {
    let (hi, lo) = traffic_rule_id.as_u64_pair();
    // Hop indexes are tiny; flipping low bits keeps ids unique per
    // hop while staying a pure function of the inputs.
    Uuid::from_u64_pair(hi, lo ^ (hop_index as u64 + 1))
}

/// Stable creation timestamp so conflict tie-breaks do not churn
/// between expansions of the same traffic rule.
fn derived_created_at(traffic_rule_id: Uuid) -> DateTime<Utc> {
    let (_, lo) = traffic_rule_id.as_u64_pair();
    // Spread deterministically over a fixed historical second range.
    DateTime::<Utc>::from_timestamp((lo % 1_000_000) as i64, 0).unwrap_or_else(Utc::now)
}
