//! Progress port - Rendering of run progress

use std::time::Duration;

use domain::WorkItemId;
#[cfg(test)]
use mockall::automock;

/// How a single attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Output written and checked
    Succeeded {
        /// Size of the written audio
        bytes: u64,
    },
    /// Attempt failed
    Failed {
        /// Failure description
        reason: String,
    },
}

/// Events published while a run executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The run is about to execute its batches
    RunStarted {
        /// Items considered by the run, including already completed ones
        total: u64,
        /// Items completed before this run
        already_completed: u64,
        /// Batches to execute
        batches: usize,
    },
    /// A batch begins
    BatchStarted {
        /// Batch position
        index: usize,
        /// Batches in the run
        of: usize,
        /// Items dispatched
        size: usize,
    },
    /// Failed items of a batch are dispatched again
    RetryStarted {
        /// Batch position
        index: usize,
        /// Items dispatched
        size: usize,
    },
    /// An item was dispatched
    ItemStarted {
        /// Item
        id: WorkItemId,
        /// Attempt number, starting at 1
        attempt: u32,
    },
    /// An attempt reached a terminal state
    ItemFinished {
        /// Item
        id: WorkItemId,
        /// Result of the attempt
        outcome: ItemOutcome,
        /// Wall time of the attempt
        elapsed: Duration,
        /// Distinct items that reached a terminal state so far
        completed: u64,
        /// Items considered by the run
        total: u64,
    },
    /// A batch with failures waits for the operator's recovery decision
    AwaitingDecision {
        /// Batch position
        index: usize,
        /// Failed items
        failed: usize,
    },
    /// A batch is done
    BatchFinished {
        /// Batch position
        index: usize,
        /// Successful items
        succeeded: usize,
        /// Failed items
        failed: usize,
    },
    /// The run is over
    RunFinished {
        /// Total wall time
        elapsed: Duration,
        /// Whether the operator aborted
        aborted: bool,
    },
}

/// Port for progress rendering
///
/// Called from a dedicated task, never from the scheduler itself.
#[cfg_attr(test, automock)]
pub trait ProgressSink: Send + Sync {
    /// Render one event
    fn handle(&self, event: &ProgressEvent);
}
