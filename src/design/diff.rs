//! Differences between two compiled designs.
//!
//! Migration tooling uses this to decide which index keys must be backfilled
//! or cleared when declarations change.

use serde::Serialize;

use crate::schema::registry::Registry;

/// One changed assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum AssignmentChange {
    /// Lookup gained an index slot.
    Added {
        /// Assignment key.
        key: String,
        /// New slot.
        index: u8,
    },
    /// Lookup lost its index slot.
    Removed {
        /// Assignment key.
        key: String,
        /// Previous slot.
        index: u8,
    },
    /// Lookup moved to another slot.
    Moved {
        /// Assignment key.
        key: String,
        /// Previous slot.
        from: u8,
        /// New slot.
        to: u8,
    },
}

/// Summary of what changed between two registries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignDiff {
    /// Entities only present in the new design.
    pub added_entities: Vec<String>,
    /// Entities only present in the old design.
    pub removed_entities: Vec<String>,
    /// Assignment changes, ordered by key.
    pub assignments: Vec<AssignmentChange>,
}

impl DesignDiff {
    /// True when the designs are physically identical.
    pub fn is_empty(&self) -> bool {
        self.added_entities.is_empty() && self.removed_entities.is_empty() && self.assignments.is_empty()
    }
}

/// Compares two registries.
pub fn diff(old: &Registry, new: &Registry) -> DesignDiff {
    let mut out = DesignDiff::default();
    for model in &new.models {
        if old.model(&model.name).is_none() {
            out.added_entities.push(model.name.clone());
        }
    }
    for model in &old.models {
        if new.model(&model.name).is_none() {
            out.removed_entities.push(model.name.clone());
        }
    }

    if old.fingerprint != 0 && old.fingerprint == new.fingerprint {
        return out;
    }

    let mut keys: Vec<&String> = old
        .index_assignments
        .keys()
        .chain(new.index_assignments.keys())
        .collect();
    keys.sort();
    keys.dedup();
    for key in keys {
        let change = match (old.index_assignments.get(key), new.index_assignments.get(key)) {
            (None, Some(&index)) => AssignmentChange::Added {
                key: key.clone(),
                index,
            },
            (Some(&index), None) => AssignmentChange::Removed {
                key: key.clone(),
                index,
            },
            (Some(&from), Some(&to)) if from != to => AssignmentChange::Moved {
                key: key.clone(),
                from,
                to,
            },
            _ => continue,
        };
        out.assignments.push(change);
    }
    out
}
