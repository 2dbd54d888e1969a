//! Error aggregator - Turns a finished batch into a recovery verdict

use std::fmt;
use std::sync::Arc;

use domain::{BatchReport, RecoveryDecision, WorkItemId};
use tracing::{info, instrument, warn};

use crate::ports::DecisionPort;

/// What the scheduler does after a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchVerdict {
    /// No failures
    Clean,
    /// Failures accepted, go on with the next batch
    Continue,
    /// Run these failed items once more before the next batch
    Retry(Vec<WorkItemId>),
    /// Stop after this batch
    Abort,
}

/// Collects batch failures and asks the operator how to proceed
#[derive(Clone)]
pub struct ErrorAggregator {
    decisions: Arc<dyn DecisionPort>,
}

impl fmt::Debug for ErrorAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorAggregator").finish_non_exhaustive()
    }
}

impl ErrorAggregator {
    /// Create an aggregator backed by a decision provider
    pub fn new(decisions: Arc<dyn DecisionPort>) -> Self {
        Self { decisions }
    }

    /// Review a batch whose items are all terminal
    ///
    /// A retry request only covers items with an attempt left; when none has,
    /// the request degrades to continue.
    #[instrument(skip(self, report), fields(batch = report.index))]
    pub async fn review(&self, report: &BatchReport) -> BatchVerdict {
        if !report.has_failures() {
            return BatchVerdict::Clean;
        }

        for failure in &report.failed {
            warn!(
                id = %failure.id,
                attempts = failure.attempts,
                reason = %failure.reason,
                "Item failed"
            );
        }

        let decision = self.decisions.on_batch_failure(report).await;
        info!(%decision, failed = report.failed.len(), "Recovery decision");

        match decision {
            RecoveryDecision::Continue => BatchVerdict::Continue,
            RecoveryDecision::Abort => BatchVerdict::Abort,
            RecoveryDecision::Retry => {
                let ids: Vec<WorkItemId> = report.retryable().map(|f| f.id.clone()).collect();
                if ids.is_empty() {
                    warn!("No failed item has an attempt left; continuing");
                    BatchVerdict::Continue
                } else {
                    BatchVerdict::Retry(ids)
                }
            },
        }
    }
}
