//! Reconciliation tasks.
//!
//! A task is an ephemeral unit of work: "switch X needs a pass, for
//! this reason". Tasks are created by triggers (rule edits, connection
//! transitions, the periodic audit timer), consumed by the per-switch
//! worker, and never persisted. Tasks arriving while a pass is in
//! flight coalesce into a single pending re-run.

use flowsync_types::DatapathId;
use std::fmt;

/// Why a reconciliation pass was requested.
///
/// Variants are declared weakest-first; `coalesce` relies on the
/// derived ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReconcileReason {
    /// The stats audit timer fired; refresh counters, then verify the
    /// diff is empty.
    PeriodicAudit,
    /// A desired rule was created, edited, or retracted.
    RuleChanged,
    /// The switch (re)connected; the mirror was reset and the full
    /// desired set needs reissuing.
    SwitchReconnected,
}

impl fmt::Display for ReconcileReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileReason::PeriodicAudit => write!(f, "periodic-audit"),
            ReconcileReason::RuleChanged => write!(f, "rule-changed"),
            ReconcileReason::SwitchReconnected => write!(f, "switch-reconnected"),
        }
    }
}

/// One requested reconciliation pass for one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileTask {
    pub switch_id: DatapathId,
    pub reason: ReconcileReason,
}

impl ReconcileTask {
    pub fn new(switch_id: DatapathId, reason: ReconcileReason) -> Self {
        Self { switch_id, reason }
    }

    /// Merges a later task for the same switch into this one, keeping
    /// the strongest pending reason: a reconnect subsumes a rule
    /// change, which subsumes an audit.
    pub fn coalesce(self, later: ReconcileTask) -> Self {
        debug_assert_eq!(self.switch_id, later.switch_id);
        ReconcileTask {
            switch_id: self.switch_id,
            reason: self.reason.max(later.reason),
        }
    }
}

impl fmt::Display for ReconcileTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.switch_id, self.reason)
    }
}

/// Receives tasks from triggers and routes them toward the owning
/// worker. Implemented by the daemon's dispatcher; consumed by the
/// registry and the controller facade.
pub trait TaskSink: Send + Sync {
    /// Enqueues a task. Must never block: callers sit on connection
    /// and API paths.
    fn enqueue(&self, task: ReconcileTask);
}
