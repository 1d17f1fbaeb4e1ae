//! Conflict resolution for candidate rule sets.
//!
//! Pure logic, no I/O, no retained state. Given the candidate rules
//! for one switch and table, [`resolve`] orders them and rejects true
//! ambiguous ties: two active rules with identical match *and*
//! identical priority, which the switch could not disambiguate at
//! match time. Overlapping-but-distinct matches at different
//! priorities are fine; the switch resolves those with
//! highest-priority-match semantics.

use flowsync_types::{FlowMatch, FlowRule};
use std::collections::HashSet;
use tracing::debug;

/// Outcome of conflict resolution over one candidate set.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Non-conflicting rules, ordered by priority descending then
    /// creation time ascending.
    pub accepted: Vec<FlowRule>,
    /// Rules rejected as ambiguous ties, each paired with the id of
    /// the accepted rule that won.
    pub rejected: Vec<(FlowRule, uuid::Uuid)>,
}

/// Resolves a candidate rule set for one switch and table.
///
/// Deterministic: candidates are sorted by priority descending, then
/// `created_at` ascending, then id as a final total-order tie-break.
/// Walking that order, a candidate whose (priority, match) was already
/// accepted is rejected; the earliest-created rule always wins a tie.
pub fn resolve(mut candidates: Vec<FlowRule>) -> Resolution {
    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });

    let mut resolution = Resolution::default();
    let mut accepted_keys: HashSet<(u8, u16, FlowMatch)> = HashSet::new();
    fn winner_of(resolution: &Resolution, key: &(u8, u16, FlowMatch)) -> Option<uuid::Uuid> {
        resolution
            .accepted
            .iter()
            .find(|r| r.table_id == key.0 && r.priority == key.1 && r.r#match == key.2)
            .map(|r| r.id)
    }

    for rule in candidates {
        let key = (rule.table_id, rule.priority, rule.r#match.clone());
        if accepted_keys.contains(&key) {
            let winner = winner_of(&resolution, &key).unwrap_or(rule.id);
            debug!(rule = %rule.id, %winner, priority = rule.priority, "ambiguous tie rejected");
            resolution.rejected.push((rule, winner));
        } else {
            accepted_keys.insert(key);
            resolution.accepted.push(rule);
        }
    }
    resolution
}
