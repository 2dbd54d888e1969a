//! Run summary - Final per-item verdicts of a conversion run

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::value_objects::WorkItemId;

/// Verified outcome of a run, keyed by item id
///
/// An id appears in at most one of the two collections.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RunSummary {
    succeeded: BTreeSet<WorkItemId>,
    failed: BTreeMap<WorkItemId, String>,
}

impl RunSummary {
    /// Create an empty summary
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an item as verified
    pub fn record_success(&mut self, id: WorkItemId) {
        self.failed.remove(&id);
        self.succeeded.insert(id);
    }

    /// Mark an item as failed with a reason
    pub fn record_failure(&mut self, id: WorkItemId, reason: impl Into<String>) {
        self.succeeded.remove(&id);
        self.failed.insert(id, reason.into());
    }

    /// Verified ids, in natural order
    pub const fn succeeded(&self) -> &BTreeSet<WorkItemId> {
        &self.succeeded
    }

    /// Failed ids with reasons, in natural order
    pub const fn failed(&self) -> &BTreeMap<WorkItemId, String> {
        &self.failed
    }

    /// Number of verified items
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    /// Number of failed items
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// Number of items judged
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether nothing failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
