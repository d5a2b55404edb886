use std::collections::HashMap;

use crate::fingerprint::fingerprint;
use crate::scan::TaskRecord;
use crate::store::RemoteTask;

/// The remote store's open tasks, fetched once per run and indexed by
/// fingerprint.
///
/// Newly created tasks are appended via [`RemoteSnapshot::insert`] so later
/// items in the same run deduplicate against them, not just against the
/// pre-run state.
#[derive(Debug, Default)]
pub struct RemoteSnapshot {
    by_fingerprint: HashMap<String, RemoteTask>,
}

impl RemoteSnapshot {
    pub fn new(tasks: Vec<RemoteTask>) -> Self {
        let mut snapshot = Self::default();
        for task in tasks {
            snapshot.insert(task);
        }
        snapshot
    }

    /// The first task registered for a fingerprint wins, matching a linear
    /// first-match scan over the fetched list.
    pub fn insert(&mut self, task: RemoteTask) {
        self.by_fingerprint
            .entry(fingerprint(&task.content))
            .or_insert(task);
    }

    /// The remote task this record duplicates, if any.
    pub fn resolve(&self, record: &TaskRecord) -> Option<&RemoteTask> {
        self.by_fingerprint.get(&record.fingerprint)
    }

    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }
}
