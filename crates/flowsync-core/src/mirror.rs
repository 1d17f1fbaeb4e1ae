//! Flow table mirror.
//!
//! The mirror is the controller's belief about what is actually
//! installed on each switch, keyed by the OpenFlow flow-entry identity
//! (table, priority, match). Mutations are optimistic: [`apply`]
//! updates the mirror before the switch acknowledges and hands back an
//! [`AppliedOp`] undo record, which the caller either drops on ack or
//! feeds to [`revert`] on transport failure.
//!
//! The mirror for a given switch is only ever mutated by that switch's
//! reconciliation worker, so the locking here is sharding, not
//! coordination.
//!
//! [`apply`]: FlowTableMirror::apply
//! [`revert`]: FlowTableMirror::revert

use dashmap::DashMap;
use flowsync_types::{DatapathId, EntryKey, FlowEntry, FlowMod, StatsReport};
use std::collections::BTreeMap;
use tracing::{debug, trace};
use uuid::Uuid;

/// Undo record for one optimistic mirror mutation.
///
/// Holds whatever entry the operation displaced, so a failed transport
/// call can put the mirror back exactly as it was.
#[derive(Debug)]
pub struct AppliedOp {
    switch_id: DatapathId,
    key: EntryKey,
    /// Entry displaced by the operation, if any.
    prior: Option<FlowEntry>,
}

impl AppliedOp {
    /// The key the operation touched.
    pub fn key(&self) -> &EntryKey {
        &self.key
    }
}

/// Per-switch in-memory view of believed-installed flow entries.
#[derive(Default)]
pub struct FlowTableMirror {
    tables: DashMap<DatapathId, BTreeMap<EntryKey, FlowEntry>>,
}

impl FlowTableMirror {
    /// Creates an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a flow-mod optimistically, before acknowledgement.
    ///
    /// An Add whose key already exists replaces the existing entry
    /// rather than duplicating it; a Modify on an absent key installs
    /// the entry; a Delete on an absent key is a no-op. All three
    /// cases keep the invariant that no two entries share a key.
    pub fn apply(&self, switch_id: DatapathId, flow_mod: &FlowMod) -> AppliedOp {
        let mut table = self.tables.entry(switch_id).or_default();
        let prior = match flow_mod {
            FlowMod::Add(entry) | FlowMod::Modify(entry) => {
                table.insert(entry.key.clone(), entry.clone())
            }
            FlowMod::Delete(key) => table.remove(key),
        };
        trace!(switch = %switch_id, op = %flow_mod, replaced = prior.is_some(), "mirror apply");
        AppliedOp {
            switch_id,
            key: flow_mod.key().clone(),
            prior,
        }
    }

    /// Confirms an optimistic mutation after a successful ack.
    ///
    /// The optimistic state is already correct; this just consumes the
    /// undo record.
    pub fn confirm(&self, applied: AppliedOp) {
        trace!(switch = %applied.switch_id, key = %applied.key, "mirror confirm");
    }

    /// Rolls back an optimistic mutation after a failed transport
    /// call, restoring the displaced entry (or the entry's absence).
    pub fn revert(&self, applied: AppliedOp) {
        let mut table = self.tables.entry(applied.switch_id).or_default();
        debug!(switch = %applied.switch_id, key = %applied.key, "mirror revert");
        match applied.prior {
            Some(prior) => {
                table.insert(applied.key, prior);
            }
            None => {
                table.remove(&applied.key);
            }
        }
    }

    /// Ordered snapshot of the believed-installed entries for a
    /// switch: by table, then priority descending.
    pub fn snapshot(&self, switch_id: DatapathId) -> Vec<FlowEntry> {
        self.tables
            .get(&switch_id)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Updates packet/byte counters from a stats report.
    ///
    /// Installation status is untouched. Stats for entries the mirror
    /// no longer tracks are dropped silently: they describe an entry
    /// that stopped matching desired state mid-flight.
    pub fn ingest_stats(&self, switch_id: DatapathId, report: &StatsReport) {
        let Some(mut table) = self.tables.get_mut(&switch_id) else {
            return;
        };
        for stats in &report.flows {
            match table.get_mut(&stats.key) {
                Some(entry) => entry.counters = stats.counters,
                None => trace!(switch = %switch_id, key = %stats.key, "stats for untracked entry"),
            }
        }
    }

    /// Reassigns the desired rule an installed entry realizes.
    ///
    /// A rule retracted and resubmitted with identical content lands
    /// on an entry that is already on the switch; no flow-mod goes
    /// out, but the entry's ownership moves to the new rule. No-op if
    /// the entry is not tracked.
    pub fn adopt(&self, switch_id: DatapathId, key: &EntryKey, rule_id: Uuid) {
        if let Some(mut table) = self.tables.get_mut(&switch_id) {
            if let Some(entry) = table.get_mut(key) {
                debug!(switch = %switch_id, %key, rule = %rule_id, "mirror entry adopted");
                entry.rule_id = Some(rule_id);
            }
        }
    }

    /// Number of entries believed installed on a switch.
    pub fn installed_count(&self, switch_id: DatapathId) -> usize {
        self.tables.get(&switch_id).map(|t| t.len()).unwrap_or(0)
    }

    /// Looks up a single entry by key.
    pub fn get(&self, switch_id: DatapathId, key: &EntryKey) -> Option<FlowEntry> {
        self.tables.get(&switch_id)?.get(key).cloned()
    }

    /// Forgets everything believed installed on a switch.
    ///
    /// Called on reconnect: a cold-started switch comes back with an
    /// empty flow table, and the next pass reissues the full set.
    pub fn clear(&self, switch_id: DatapathId) {
        if let Some(mut table) = self.tables.get_mut(&switch_id) {
            debug!(switch = %switch_id, dropped = table.len(), "mirror cleared");
            table.clear();
        }
    }

    /// Drops the per-switch table entirely (switch eviction).
    pub fn remove(&self, switch_id: DatapathId) {
        self.tables.remove(&switch_id);
    }
}
