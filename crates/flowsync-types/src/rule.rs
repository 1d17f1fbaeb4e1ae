//! Desired-state flow rules.

use crate::{DatapathId, FlowAction, FlowMatch, ParseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reason a rule ended up in [`InstallStatus::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    /// Rejected by conflict resolution: an equal-priority rule with an
    /// identical match was accepted instead.
    Conflict,
    /// The switch transport kept failing past the configured retry
    /// budget.
    InstallFailed,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::Conflict => write!(f, "conflict"),
            FailReason::InstallFailed => write!(f, "install_failed"),
        }
    }
}

/// Installation status of a desired rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    /// Not yet pushed to the switch.
    #[default]
    Pending,
    /// Confirmed installed on the switch.
    Installed,
    /// Gave up installing; see the reason.
    Failed(FailReason),
    /// Believed installed but the switch connection was lost, so the
    /// on-switch state is unknown.
    Stale,
}

impl InstallStatus {
    /// Returns true if the rule is confirmed on the switch.
    pub const fn is_installed(&self) -> bool {
        matches!(self, InstallStatus::Installed)
    }

    /// Returns true if installation gave up.
    pub const fn is_failed(&self) -> bool {
        matches!(self, InstallStatus::Failed(_))
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStatus::Pending => write!(f, "pending"),
            InstallStatus::Installed => write!(f, "installed"),
            InstallStatus::Failed(reason) => write!(f, "failed({})", reason),
            InstallStatus::Stale => write!(f, "stale"),
        }
    }
}

/// Packet/byte counters mirrored from switch statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCounters {
    pub packets: u64,
    pub bytes: u64,
}

/// An operator-declared flow rule.
///
/// This is the desired-state entity: what the operator wants installed
/// on `switch_id`. The reconciliation engine owns `status` and
/// `counters`; operators own everything else, and operator edits
/// re-trigger reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRule {
    /// Stable rule identity.
    pub id: Uuid,
    /// Operator-facing name.
    pub name: String,
    /// Target switch.
    pub switch_id: DatapathId,
    /// Flow table on the switch.
    pub table_id: u8,
    /// Priority 0-65535, higher wins at match time.
    pub priority: u16,
    /// Match predicate.
    pub r#match: FlowMatch,
    /// Ordered action list.
    pub actions: Vec<FlowAction>,
    /// Idle timeout in seconds, 0 = permanent.
    pub idle_timeout: u16,
    /// Hard timeout in seconds, 0 = permanent.
    pub hard_timeout: u16,
    /// Logically deleted when false; physical removal happens via a
    /// delete flow-mod on the next reconciliation pass.
    pub active: bool,
    /// Installation status, written only by the reconciliation engine.
    pub status: InstallStatus,
    /// Counters mirrored from switch stats.
    pub counters: RuleCounters,
    /// Creation time, used as the deterministic conflict tie-break.
    pub created_at: DateTime<Utc>,
}

impl FlowRule {
    /// Creates an active, pending rule with a fresh id.
    pub fn new(
        name: impl Into<String>,
        switch_id: DatapathId,
        table_id: u8,
        priority: u16,
        r#match: FlowMatch,
        actions: Vec<FlowAction>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            switch_id,
            table_id,
            priority,
            r#match,
            actions,
            idle_timeout: 0,
            hard_timeout: 0,
            active: true,
            status: InstallStatus::Pending,
            counters: RuleCounters::default(),
            created_at: Utc::now(),
        }
    }

    /// Returns the flow entry this rule should materialize as on the
    /// switch.
    pub fn to_entry(&self) -> crate::FlowEntry {
        let mut entry = crate::FlowEntry::new(
            crate::EntryKey::new(self.table_id, self.priority, self.r#match.clone()),
            self.actions.clone(),
            Some(self.id),
        );
        entry.idle_timeout = self.idle_timeout;
        entry.hard_timeout = self.hard_timeout;
        entry
    }

    /// Validates the rule before it is accepted into the store.
    ///
    /// # Errors
    ///
    /// Rejects empty action lists and all-wildcard matches; a rule
    /// that matches everything and does nothing is an operator
    /// mistake, not a forwarding decision.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.actions.is_empty() {
            return Err(ParseError::EmptyActions);
        }
        if self.r#match.is_wildcard() && self.priority == 0 {
            return Err(ParseError::EmptyMatch);
        }
        Ok(())
    }
}
