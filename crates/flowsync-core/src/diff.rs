//! Desired-vs-mirror changeset computation.
//!
//! Pure function: given the accepted desired entries and the mirror
//! snapshot for one switch, compute the flow-mods that drive actual
//! state toward desired state. The returned order is fixed: Deletes,
//! then Modifies, then Adds. Deletes-first avoids transient
//! double-matching of overlapping priority rules while a priority
//! change is half-applied.

use flowsync_types::{EntryKey, FlowEntry, FlowMod};
use std::collections::HashMap;

/// Computes the ordered changeset turning `mirror` into `desired`.
///
/// - present in desired, absent in mirror: Add
/// - present in mirror, absent in desired: Delete, unless the entry
///   is externally managed (installed by an agent outside this
///   controller, which we must not fight)
/// - present in both with differing actions or timeouts: Modify
///
/// Applying the same desired set twice yields an empty changeset the
/// second time; reconciliation is idempotent.
pub fn diff(desired: &[FlowEntry], mirror: &[FlowEntry]) -> Vec<FlowMod> {
    let desired_by_key: HashMap<&EntryKey, &FlowEntry> =
        desired.iter().map(|e| (&e.key, e)).collect();
    let mirror_by_key: HashMap<&EntryKey, &FlowEntry> =
        mirror.iter().map(|e| (&e.key, e)).collect();

    let mut deletes = Vec::new();
    let mut modifies = Vec::new();
    let mut adds = Vec::new();

    for installed in mirror {
        if desired_by_key.contains_key(&installed.key) {
            continue;
        }
        if installed.is_externally_managed() {
            continue;
        }
        deletes.push(FlowMod::Delete(installed.key.clone()));
    }

    for wanted in desired {
        match mirror_by_key.get(&wanted.key) {
            None => adds.push(FlowMod::Add(wanted.clone())),
            Some(installed) if installed.differs_from(wanted) => {
                modifies.push(FlowMod::Modify(wanted.clone()));
            }
            Some(_) => {}
        }
    }

    let mut ops = deletes;
    ops.append(&mut modifies);
    ops.append(&mut adds);
    ops
}
