//! Reference resolution for incoming bundles.
//!
//! Ids are globally unique and never remapped. A foreign key is satisfied
//! when the destination already holds the target, or when the target is part
//! of the same bundle and planned for insertion ahead of the referencing
//! record. The plan comes out in [`EntityKind::INSERT_ORDER`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use uuid::Uuid;

use super::record::{EntityKind, Record};
use super::summary::RecordIssue;

/// Ids known to exist, per entity type.
#[derive(Debug, Clone, Default)]
pub struct KnownIds {
    ids: HashMap<EntityKind, HashSet<Uuid>>,
}

impl KnownIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, kind: EntityKind, id: Uuid) -> bool {
        self.ids.get(&kind).map_or(false, |ids| ids.contains(&id))
    }

    pub fn insert(&mut self, kind: EntityKind, id: Uuid) {
        self.ids.entry(kind).or_default().insert(id);
    }

    pub fn extend(&mut self, kind: EntityKind, ids: impl IntoIterator<Item = Uuid>) {
        self.ids.entry(kind).or_default().extend(ids);
    }
}

/// Foreign-key targets grouped by type, for the destination lookup.
pub fn referenced_ids(records: &[Record]) -> BTreeMap<EntityKind, BTreeSet<Uuid>> {
    let mut targets: BTreeMap<EntityKind, BTreeSet<Uuid>> = BTreeMap::new();
    for reference in records.iter().flat_map(Record::references) {
        targets.entry(reference.kind).or_default().insert(reference.id);
    }
    targets
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub kind: EntityKind,
    pub id: Uuid,
    pub issue: RecordIssue,
}

#[derive(Debug, Clone, Default)]
pub struct InsertionPlan {
    pub steps: Vec<Record>,
    pub rejected: Vec<Rejection>,
}

impl InsertionPlan {
    /// Builds the plan against the ids already present in the destination.
    pub fn build(mut records: Vec<Record>, destination: &KnownIds) -> Self {
        records.sort_by_key(Record::kind);

        let mut available = destination.clone();
        let mut plan = InsertionPlan::default();
        for record in records {
            let issue = record.invalid_value().or_else(|| {
                record
                    .references()
                    .into_iter()
                    .find(|r| !available.contains(r.kind, r.id))
                    .map(RecordIssue::from)
            });

            match issue {
                Some(issue) => plan.rejected.push(Rejection {
                    kind: record.kind(),
                    id: record.id(),
                    issue,
                }),
                None => {
                    available.insert(record.kind(), record.id());
                    plan.steps.push(record);
                }
            }
        }
        plan
    }

    /// Planned records of one type, in plan order.
    pub fn pass(&self, kind: EntityKind) -> impl Iterator<Item = &Record> {
        self.steps.iter().filter(move |r| r.kind() == kind)
    }

}
