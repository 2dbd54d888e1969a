//! Decision port - Operator choices at the two points a run can pause

use async_trait::async_trait;
use domain::{BatchReport, RecoveryDecision, WorkItemId};
#[cfg(test)]
use mockall::automock;
use serde::Serialize;

/// What a run is about to do, shown before asking to start
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPlan {
    /// Items in the catalog
    pub total_items: usize,
    /// Items already completed by an unfinished earlier run
    pub already_completed: usize,
    /// Items that will be converted now
    pub pending: usize,
    /// First pending item
    pub first: Option<WorkItemId>,
    /// Last pending item
    pub last: Option<WorkItemId>,
    /// Number of batches
    pub batch_count: usize,
    /// Maximum items per batch
    pub batch_size: usize,
    /// Whether an unfinished earlier run is being resumed
    pub resuming: bool,
}

impl RunPlan {
    /// Whether there is nothing left to convert
    pub const fn is_empty(&self) -> bool {
        self.pending == 0
    }
}

/// Port for operator decisions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DecisionPort: Send + Sync {
    /// Ask whether to start the planned run
    async fn confirm_start(&self, plan: &RunPlan) -> bool;

    /// Ask how to proceed after a batch finished with failures
    async fn on_batch_failure(&self, report: &BatchReport) -> RecoveryDecision;
}
