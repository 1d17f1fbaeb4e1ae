//! Rule store adapter.
//!
//! The persistence store (switches, rules, policies, operators) lives
//! outside the core. The engine sees it through the [`RuleStore`]
//! trait: desired rules come out, installation status and counters go
//! back in. Status updates are per-rule and last-writer-wins, which is
//! safe because only the owning switch worker writes a given rule's
//! status.
//!
//! [`MemoryRuleStore`] is the in-memory implementation used by tests
//! and standalone runs; a production deployment substitutes a
//! database-backed adapter behind the same trait.

use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use flowsync_types::{
    DatapathId, FlowRule, InstallStatus, QosPolicy, RuleCounters, TrafficRule,
};
use uuid::Uuid;

/// Async seam to the external persistence store.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Desired flow rules for one switch: active rules only.
    async fn list_active_rules(&self, switch_id: DatapathId) -> Result<Vec<FlowRule>, StoreError>;

    /// All active traffic rules (expansion input).
    async fn list_traffic_rules(&self) -> Result<Vec<TrafficRule>, StoreError>;

    /// All enabled QoS policies (expansion input).
    async fn list_qos_policies(&self) -> Result<Vec<QosPolicy>, StoreError>;

    /// Writes installation status (and optionally fresher counters)
    /// for one rule.
    async fn update_status(
        &self,
        rule_id: Uuid,
        status: InstallStatus,
        counters: Option<RuleCounters>,
    ) -> Result<(), StoreError>;

    /// Inserts a new desired rule.
    async fn insert_rule(&self, rule: FlowRule) -> Result<(), StoreError>;

    /// Flips a rule's active flag, returning the updated rule.
    async fn set_rule_active(&self, rule_id: Uuid, active: bool) -> Result<FlowRule, StoreError>;

    /// Fetches one rule by id.
    async fn get_rule(&self, rule_id: Uuid) -> Result<FlowRule, StoreError>;
}

/// In-memory [`RuleStore`] backed by concurrent maps.
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: DashMap<Uuid, FlowRule>,
    traffic_rules: DashMap<Uuid, TrafficRule>,
    qos_policies: DashMap<Uuid, QosPolicy>,
}

impl MemoryRuleStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a traffic rule (test/bootstrap helper).
    pub fn insert_traffic_rule(&self, rule: TrafficRule) {
        self.traffic_rules.insert(rule.id, rule);
    }

    /// Seeds a QoS policy (test/bootstrap helper).
    pub fn insert_qos_policy(&self, policy: QosPolicy) {
        self.qos_policies.insert(policy.id, policy);
    }

    /// Number of stored flow rules, active or not.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list_active_rules(&self, switch_id: DatapathId) -> Result<Vec<FlowRule>, StoreError> {
        let mut rules: Vec<FlowRule> = self
            .rules
            .iter()
            .filter(|r| r.switch_id == switch_id && r.active)
            .map(|r| r.clone())
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn list_traffic_rules(&self) -> Result<Vec<TrafficRule>, StoreError> {
        let mut rules: Vec<TrafficRule> = self
            .traffic_rules
            .iter()
            .filter(|r| r.active)
            .map(|r| r.clone())
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    async fn list_qos_policies(&self) -> Result<Vec<QosPolicy>, StoreError> {
        let mut policies: Vec<QosPolicy> = self
            .qos_policies
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.clone())
            .collect();
        policies.sort_by_key(|p| p.id);
        Ok(policies)
    }

    async fn update_status(
        &self,
        rule_id: Uuid,
        status: InstallStatus,
        counters: Option<RuleCounters>,
    ) -> Result<(), StoreError> {
        let mut rule = self
            .rules
            .get_mut(&rule_id)
            .ok_or(StoreError::UnknownRule(rule_id))?;
        rule.status = status;
        if let Some(counters) = counters {
            rule.counters = counters;
        }
        Ok(())
    }

    async fn insert_rule(&self, rule: FlowRule) -> Result<(), StoreError> {
        self.rules.insert(rule.id, rule);
        Ok(())
    }

    async fn set_rule_active(&self, rule_id: Uuid, active: bool) -> Result<FlowRule, StoreError> {
        let mut rule = self
            .rules
            .get_mut(&rule_id)
            .ok_or(StoreError::UnknownRule(rule_id))?;
        rule.active = active;
        Ok(rule.clone())
    }

    async fn get_rule(&self, rule_id: Uuid) -> Result<FlowRule, StoreError> {
        self.rules
            .get(&rule_id)
            .map(|r| r.clone())
            .ok_or(StoreError::UnknownRule(rule_id))
    }
}
