//! Batch planning - Contiguous, ordered partitions of pending work

use std::num::NonZeroUsize;

use serde::Serialize;

use crate::entities::WorkItem;
use crate::value_objects::WorkItemId;

/// A contiguous slice of the ordered pending list, executed as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    index: usize,
    items: Vec<WorkItem>,
}

impl Batch {
    /// Create a batch at the given zero-based position
    #[must_use]
    pub const fn new(index: usize, items: Vec<WorkItem>) -> Self {
        Self { index, items }
    }

    /// Zero-based position of this batch within the run
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Items of the batch, in catalog order
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Mutable access for the scheduler
    pub fn items_mut(&mut self) -> &mut [WorkItem] {
        &mut self.items
    }

    /// Number of items in the batch
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether every item reached a terminal state
    pub fn is_done(&self) -> bool {
        self.items.iter().all(|item| item.status().is_terminal())
    }

    /// Summarize the terminal outcome of every item
    #[must_use]
    pub fn report(&self) -> BatchReport {
        let mut report = BatchReport::new(self.index);
        for item in &self.items {
            if item.is_succeeded() {
                report.succeeded.push(item.id().clone());
            } else if let Some(reason) = item.failure_reason() {
                report
                    .failed
                    .push(ItemFailure::new(item.id().clone(), reason, item.attempts()));
            }
        }
        report
    }
}

/// Partition pending items into ordered batches of at most `batch_size`
///
/// Concatenating the batches yields the input unchanged; every batch except
/// possibly the last holds exactly `batch_size` items.
#[must_use]
pub fn plan_batches(items: Vec<WorkItem>, batch_size: NonZeroUsize) -> Vec<Batch> {
    let size = batch_size.get();
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();

    while iter.peek().is_some() {
        let chunk: Vec<WorkItem> = iter.by_ref().take(size).collect();
        batches.push(Batch::new(batches.len(), chunk));
    }

    batches
}

/// A failed item as seen by the error aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Failed item
    pub id: WorkItemId,
    /// Reason of the last failed attempt
    pub reason: String,
    /// Attempts used so far
    pub attempts: u32,
}

impl ItemFailure {
    /// Create a failure record
    pub fn new(id: WorkItemId, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            id,
            reason: reason.into(),
            attempts,
        }
    }

    /// Whether the item still has an attempt left
    pub const fn is_retryable(&self) -> bool {
        self.attempts < WorkItem::MAX_ATTEMPTS
    }
}

/// Outcome of one batch, once all its items are terminal
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BatchReport {
    /// Batch position
    pub index: usize,
    /// Items that succeeded
    pub succeeded: Vec<WorkItemId>,
    /// Items that failed
    pub failed: Vec<ItemFailure>,
}

impl BatchReport {
    /// Create an empty report for a batch
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Whether any item failed
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Failed items that may still be retried
    pub fn retryable(&self) -> impl Iterator<Item = &ItemFailure> {
        self.failed.iter().filter(|f| f.is_retryable())
    }

    /// Total number of items reported
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
