//! Installed flow entries and the control operations that mutate them.
//!
//! A [`FlowEntry`] is the controller's view of one entry in a switch
//! flow table. Entries are identified by [`EntryKey`], the composite
//! (table, priority, match) key OpenFlow uses for flow identity: two
//! entries with the same key are the same entry, whatever their
//! actions.

use crate::{FlowAction, FlowMatch, RuleCounters};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Composite identity of a flow entry on a switch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    /// Flow table id.
    pub table_id: u8,
    /// Entry priority.
    pub priority: u16,
    /// Match predicate.
    pub r#match: FlowMatch,
}

impl EntryKey {
    /// Creates a new entry key.
    pub fn new(table_id: u8, priority: u16, r#match: FlowMatch) -> Self {
        Self {
            table_id,
            priority,
            r#match,
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table={},prio={},{}",
            self.table_id, self.priority, self.r#match
        )
    }
}

// Snapshot ordering: table, then priority descending (the order the
// switch consults entries), then match for determinism.
impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.table_id
            .cmp(&other.table_id)
            .then(other.priority.cmp(&self.priority))
            .then_with(|| format!("{}", self.r#match).cmp(&format!("{}", other.r#match)))
    }
}

impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// One entry in a switch flow table, as believed by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEntry {
    /// Identity on the switch.
    pub key: EntryKey,
    /// Ordered action list.
    pub actions: Vec<FlowAction>,
    /// Idle timeout in seconds, 0 = permanent.
    pub idle_timeout: u16,
    /// Hard timeout in seconds, 0 = permanent.
    pub hard_timeout: u16,
    /// The desired rule this entry realizes. `None` for entries
    /// observed on the switch but not managed by this controller.
    pub rule_id: Option<Uuid>,
    /// Packet/byte counters from the last stats report.
    pub counters: RuleCounters,
}

impl FlowEntry {
    /// Creates an entry with zeroed counters.
    pub fn new(key: EntryKey, actions: Vec<FlowAction>, rule_id: Option<Uuid>) -> Self {
        Self {
            key,
            actions,
            idle_timeout: 0,
            hard_timeout: 0,
            rule_id,
            counters: RuleCounters::default(),
        }
    }

    /// Returns true if this entry is managed by an external agent
    /// rather than a desired rule in the store.
    pub fn is_externally_managed(&self) -> bool {
        self.rule_id.is_none()
    }

    /// Returns true if actions or timeouts differ, i.e. the installed
    /// entry no longer realizes the desired rule and needs a Modify.
    pub fn differs_from(&self, other: &FlowEntry) -> bool {
        self.actions != other.actions
            || self.idle_timeout != other.idle_timeout
            || self.hard_timeout != other.hard_timeout
    }
}

/// A flow-mod: one control operation against a switch flow table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlowMod {
    /// Install a new entry. Replaces an existing entry with the same
    /// key rather than duplicating it.
    Add(FlowEntry),
    /// Replace the actions/timeouts of an existing entry.
    Modify(FlowEntry),
    /// Remove the entry with this key.
    Delete(EntryKey),
}

impl FlowMod {
    /// Returns the key the operation targets.
    pub fn key(&self) -> &EntryKey {
        match self {
            FlowMod::Add(entry) | FlowMod::Modify(entry) => &entry.key,
            FlowMod::Delete(key) => key,
        }
    }

    /// Short operation name for logging.
    pub const fn op_name(&self) -> &'static str {
        match self {
            FlowMod::Add(_) => "add",
            FlowMod::Modify(_) => "modify",
            FlowMod::Delete(_) => "delete",
        }
    }
}

impl fmt::Display for FlowMod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.op_name(), self.key())
    }
}

/// Per-entry statistics from a switch stats reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStats {
    /// Identity of the entry the stats belong to.
    pub key: EntryKey,
    /// Monotonic counters as reported by the switch.
    pub counters: RuleCounters,
}

/// A full stats report for one switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    pub flows: Vec<FlowStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FlowMatch, IpProtocol, PortNumber};

    fn key(table: u8, priority: u16, dst_port: u16) -> EntryKey {
        EntryKey::new(
            table,
            priority,
            FlowMatch::new().protocol(IpProtocol::Tcp).dst_port(dst_port),
        )
    }

    #[test]
    fn test_key_ordering_priority_descending() {
        let high = key(0, 200, 80);
        let low = key(0, 100, 80);
        assert!(high < low, "higher priority sorts first within a table");

        let table1 = key(1, 65535, 80);
        assert!(high < table1, "lower table sorts first");
    }

    #[test]
    fn test_differs_from() {
        let out = PortNumber::new(1).unwrap();
        let a = FlowEntry::new(key(0, 100, 80), vec![FlowAction::Output(out)], None);
        let mut b = a.clone();
        assert!(!a.differs_from(&b));
        b.actions = vec![FlowAction::Drop];
        assert!(a.differs_from(&b));
    }

    #[test]
    fn test_flow_mod_key() {
        let k = key(0, 100, 80);
        let del = FlowMod::Delete(k.clone());
        assert_eq!(del.key(), &k);
        assert_eq!(del.op_name(), "delete");
    }
}
