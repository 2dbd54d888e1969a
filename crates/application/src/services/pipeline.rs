//! Conversion pipeline - One complete, resumable run
//!
//! scan → prepare output → load checkpoint → plan → confirm → acquire
//! checkpoint → execute batches → validate → release checkpoint unless aborted.
//!
//! A run that finishes, failures included, releases its checkpoint; only an
//! aborted run leaves it behind to resume from.

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use domain::{RunId, RunSummary, WorkItem, WorkItemId, plan_batches};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::ApplicationError;
use crate::ports::{CheckpointPort, CheckpointState, DecisionPort, RunPlan};
use crate::services::aggregator::ErrorAggregator;
use crate::services::catalog::FileCatalog;
use crate::services::conversion::ConversionClient;
use crate::services::progress::ProgressReporter;
use crate::services::scheduler::BatchScheduler;
use crate::services::validator::ResultValidator;

/// Run-wide tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Maximum items per batch, also the concurrency ceiling
    pub batch_size: NonZeroUsize,
    /// Outputs below this size count as truncated
    pub min_output_bytes: u64,
}

/// Result of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Identifier of the run that owns the checkpoint
    pub run_id: RunId,
    /// Whether an unfinished earlier run was resumed
    pub resumed: bool,
    /// Whether the operator aborted
    pub aborted: bool,
    /// Batches executed by this invocation
    pub batches_executed: usize,
    /// Items skipped because an earlier run completed them
    pub skipped: usize,
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
    /// Verified per-item result
    pub summary: RunSummary,
}

impl RunReport {
    /// Whether every audited item succeeded and the run was not aborted
    pub fn is_clean(&self) -> bool {
        !self.aborted && self.summary.is_clean()
    }
}

/// How a pipeline invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The operator declined to start
    Declined(RunPlan),
    /// The run executed (possibly with failures or aborted)
    Completed(RunReport),
}

/// Orchestrates catalog, checkpoint, scheduler and validator
pub struct ConversionPipeline {
    catalog: FileCatalog,
    client: ConversionClient,
    checkpoint: Arc<dyn CheckpointPort>,
    decisions: Arc<dyn DecisionPort>,
    progress: ProgressReporter,
    scheduler: BatchScheduler,
    aggregator: ErrorAggregator,
    validator: ResultValidator,
    options: PipelineOptions,
}

impl fmt::Debug for ConversionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionPipeline")
            .field("catalog", &self.catalog)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ConversionPipeline {
    /// Wire a pipeline from its collaborators
    pub fn new(
        catalog: FileCatalog,
        client: ConversionClient,
        checkpoint: Arc<dyn CheckpointPort>,
        decisions: Arc<dyn DecisionPort>,
        progress: ProgressReporter,
        options: PipelineOptions,
    ) -> Self {
        let scheduler = BatchScheduler::new(
            client.clone(),
            Arc::clone(&checkpoint),
            progress.clone(),
            options.batch_size,
        );
        let aggregator = ErrorAggregator::new(Arc::clone(&decisions));

        Self {
            catalog,
            client,
            checkpoint,
            decisions,
            progress,
            scheduler,
            aggregator,
            validator: ResultValidator::new(options.min_output_bytes),
            options,
        }
    }

    /// Execute a run
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<PipelineOutcome, ApplicationError> {
        let started = Instant::now();

        let items = self.catalog.scan().await?;
        self.prepare_output_dir().await?;

        let previous = self.checkpoint.load().await?;
        let resumed = previous.is_some();
        let ledger = previous.map(|state| state.completed).unwrap_or_default();
        let (done, pending) = self.partition(items, &ledger).await;

        let plan = self.plan(&done, &pending, resumed);
        info!(
            total = plan.total_items,
            pending = plan.pending,
            batches = plan.batch_count,
            resumed,
            "Run planned"
        );

        if !plan.is_empty() {
            if !self.client.service_available().await {
                warn!("Speech service did not answer the availability probe");
            }
            if !self.decisions.confirm_start(&plan).await {
                info!("Run declined by operator");
                return Ok(PipelineOutcome::Declined(plan));
            }
        }

        let state = self.checkpoint.begin(RunId::new()).await?;
        info!(run_id = %state.run_id, "Checkpoint acquired");

        let batches = plan_batches(pending, self.options.batch_size);
        let total = done.len() + batches.iter().map(|b| b.len()).sum::<usize>();
        self.progress
            .run_started(total as u64, done.len() as u64, batches.len());

        let outcome = self.scheduler.run(batches, &self.aggregator).await;

        let skipped = done.len();
        let mut audited = done;
        audited.extend(outcome.items().cloned());
        let summary = self.validator.validate(&audited).await;

        let report = RunReport {
            run_id: state.run_id,
            resumed,
            aborted: outcome.aborted,
            batches_executed: outcome.batches.len(),
            skipped,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            summary,
        };

        if report.aborted {
            info!(
                failed = report.summary.failure_count(),
                "Checkpoint kept for resume"
            );
        } else {
            match self.checkpoint.release().await {
                Ok(()) => info!("Checkpoint released"),
                Err(e) => warn!(error = %e, "Could not release checkpoint"),
            }
        }

        self.progress
            .run_finished(started.elapsed(), report.aborted);
        info!(
            succeeded = report.summary.success_count(),
            failed = report.summary.failure_count(),
            elapsed_ms = report.elapsed_ms,
            "Run finished"
        );

        Ok(PipelineOutcome::Completed(report))
    }

    /// Audit the whole catalog against the output directory without converting
    #[instrument(skip(self))]
    pub async fn audit(&self) -> Result<RunSummary, ApplicationError> {
        let items = self.catalog.scan().await?;
        Ok(self.validator.validate(&items).await)
    }

    /// Checkpoint of an unfinished run, if any
    pub async fn checkpoint_state(&self) -> Result<Option<CheckpointState>, ApplicationError> {
        self.checkpoint.load().await
    }

    async fn prepare_output_dir(&self) -> Result<(), ApplicationError> {
        let dir = &self.catalog.config().output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ApplicationError::filesystem(dir, &e))
    }

    /// Split items into already completed and still to convert
    ///
    /// A ledger entry whose output no longer validates is converted again.
    async fn partition(
        &self,
        items: Vec<WorkItem>,
        ledger: &BTreeSet<WorkItemId>,
    ) -> (Vec<WorkItem>, Vec<WorkItem>) {
        let mut done = Vec::new();
        let mut pending = Vec::new();

        for item in items {
            if !ledger.contains(item.id()) {
                pending.push(item);
                continue;
            }
            match self.validator.check_output(item.output_path()).await {
                Ok(_) => done.push(item),
                Err(reason) => {
                    warn!(id = %item.id(), %reason, "Recorded as completed but output is invalid; converting again");
                    pending.push(item);
                },
            }
        }

        (done, pending)
    }

    fn plan(&self, done: &[WorkItem], pending: &[WorkItem], resuming: bool) -> RunPlan {
        let batch_size = self.options.batch_size.get();
        RunPlan {
            total_items: done.len() + pending.len(),
            already_completed: done.len(),
            pending: pending.len(),
            first: pending.first().map(|item| item.id().clone()),
            last: pending.last().map(|item| item.id().clone()),
            batch_count: pending.len().div_ceil(batch_size),
            batch_size,
            resuming,
        }
    }
}
