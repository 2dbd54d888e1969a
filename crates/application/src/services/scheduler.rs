//! Batch scheduler - Runs batches sequentially, items within a batch concurrently
//!
//! Each batch gets its own queue drained by a bounded pool of worker tasks.
//! Workers report over a completion channel; the scheduler alone mutates item
//! state and writes the checkpoint ledger.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::{Batch, WorkItem, WorkItemId, WorkStatus};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, debug_span, info, instrument, warn};

use crate::ports::{CheckpointPort, ItemOutcome};
use crate::services::aggregator::{BatchVerdict, ErrorAggregator};
use crate::services::conversion::{ConversionClient, ConversionFailure};
use crate::services::progress::ProgressReporter;

/// Messages from workers to the scheduler
#[derive(Debug)]
enum WorkerEvent {
    Started {
        slot: usize,
    },
    Finished {
        slot: usize,
        result: Result<u64, ConversionFailure>,
        elapsed: Duration,
    },
}

/// Batches after execution
#[derive(Debug)]
pub struct ScheduleOutcome {
    /// Every batch that was executed, in order
    pub batches: Vec<Batch>,
    /// Whether the operator stopped the run early
    pub aborted: bool,
}

impl ScheduleOutcome {
    /// Items of all executed batches
    pub fn items(&self) -> impl Iterator<Item = &WorkItem> {
        self.batches.iter().flat_map(Batch::items)
    }
}

/// Executes planned batches
#[derive(Clone)]
pub struct BatchScheduler {
    client: ConversionClient,
    checkpoint: Arc<dyn CheckpointPort>,
    progress: ProgressReporter,
    concurrency: NonZeroUsize,
}

impl fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("client", &self.client)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl BatchScheduler {
    /// Create a scheduler running at most `concurrency` conversions at once
    pub fn new(
        client: ConversionClient,
        checkpoint: Arc<dyn CheckpointPort>,
        progress: ProgressReporter,
        concurrency: NonZeroUsize,
    ) -> Self {
        Self {
            client,
            checkpoint,
            progress,
            concurrency,
        }
    }

    /// Run batches in order, consulting the aggregator after each one
    pub async fn run(&self, batches: Vec<Batch>, aggregator: &ErrorAggregator) -> ScheduleOutcome {
        let count = batches.len();
        let mut executed = Vec::with_capacity(count);
        let mut aborted = false;

        for mut batch in batches {
            self.progress
                .batch_started(batch.index(), count, batch.len());
            self.execute(&mut batch).await;

            // One decision per batch; items failing their retry stay failed.
            let report = batch.report();
            if report.has_failures() {
                self.progress
                    .awaiting_decision(report.index, report.failed.len());
            }
            match aggregator.review(&report).await {
                BatchVerdict::Clean | BatchVerdict::Continue => {},
                BatchVerdict::Abort => aborted = true,
                BatchVerdict::Retry(ids) => self.retry(&mut batch, &ids).await,
            }

            let report = batch.report();
            self.progress
                .batch_finished(report.index, report.succeeded.len(), report.failed.len());
            info!(
                batch = report.index,
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "Batch finished"
            );
            executed.push(batch);

            if aborted {
                info!("Run aborted by operator");
                break;
            }
        }

        ScheduleOutcome {
            batches: executed,
            aborted,
        }
    }

    /// Re-arm the given failed items and run them once more
    #[instrument(skip(self, batch, ids), fields(batch = batch.index(), items = ids.len()))]
    pub async fn retry(&self, batch: &mut Batch, ids: &[WorkItemId]) {
        let wanted: BTreeSet<&WorkItemId> = ids.iter().collect();
        let mut rearmed = 0;

        for item in batch.items_mut() {
            if !wanted.contains(item.id()) {
                continue;
            }
            match item.reset_for_retry() {
                Ok(()) => rearmed += 1,
                Err(e) => warn!(error = %e, "Item cannot be retried"),
            }
        }

        if rearmed > 0 {
            self.progress.retry_started(batch.index(), rearmed);
            self.execute(batch).await;
        }
    }

    /// Dispatch every pending item of the batch and wait until all are terminal
    #[instrument(skip(self, batch), fields(batch = batch.index()))]
    pub async fn execute(&self, batch: &mut Batch) {
        let queued: VecDeque<(usize, WorkItem)> = batch
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| *item.status() == WorkStatus::Pending)
            .map(|(slot, item)| (slot, item.clone()))
            .collect();
        if queued.is_empty() {
            return;
        }

        let slots: Vec<usize> = queued.iter().map(|(slot, _)| *slot).collect();
        let workers = self.concurrency.get().min(queued.len());
        debug!(items = queued.len(), workers, "Dispatching");

        let queue = Arc::new(Mutex::new(queued));
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerEvent>();

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let tx = tx.clone();
                let client = self.client.clone();
                tokio::spawn(
                    async move {
                        loop {
                            let next = queue.lock().pop_front();
                            let Some((slot, item)) = next else { break };

                            if tx.send(WorkerEvent::Started { slot }).is_err() {
                                break;
                            }
                            let started = Instant::now();
                            let result = client.convert(&item).await;
                            let event = WorkerEvent::Finished {
                                slot,
                                result,
                                elapsed: started.elapsed(),
                            };
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    .instrument(debug_span!("worker", worker)),
                )
            })
            .collect();
        drop(tx);

        while let Some(event) = rx.recv().await {
            self.apply(batch, event).await;
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }

        // Only reachable if a worker died without reporting.
        for slot in slots {
            let item = &mut batch.items_mut()[slot];
            if item.status().is_terminal() {
                continue;
            }
            if *item.status() == WorkStatus::Pending && item.start().is_err() {
                continue;
            }
            if let Err(e) = item.fail("worker terminated before reporting") {
                warn!(error = %e, "Could not record lost item");
            }
        }

        debug_assert!(batch.is_done());
    }

    async fn apply(&self, batch: &mut Batch, event: WorkerEvent) {
        match event {
            WorkerEvent::Started { slot } => {
                let item = &mut batch.items_mut()[slot];
                if let Err(e) = item.start() {
                    warn!(error = %e, "Unexpected dispatch");
                    return;
                }
                self.progress.item_started(item.id(), item.attempts());
            },
            WorkerEvent::Finished {
                slot,
                result,
                elapsed,
            } => {
                let item = &mut batch.items_mut()[slot];
                let outcome = match result {
                    Ok(bytes) => {
                        if let Err(e) = item.succeed() {
                            warn!(error = %e, "Unexpected completion");
                            return;
                        }
                        debug!(id = %item.id(), bytes, ?elapsed, "Item converted");
                        if let Err(e) = self.checkpoint.record_completed(item.id()).await {
                            warn!(id = %item.id(), error = %e, "Could not record completion in checkpoint");
                        }
                        ItemOutcome::Succeeded { bytes }
                    },
                    Err(failure) => {
                        let reason = failure.to_string();
                        if let Err(e) = item.fail(reason.clone()) {
                            warn!(error = %e, "Unexpected failure report");
                            return;
                        }
                        ItemOutcome::Failed { reason }
                    },
                };
                self.progress.item_finished(item.id(), outcome, elapsed);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use domain::{RecoveryDecision, plan_batches};

    use super::*;
    use crate::error::ApplicationError;
    use crate::ports::{MockCheckpointPort, MockDecisionPort, ProgressEvent};
    use crate::test_support::{
        CollectingSink, FakeReply, FakeSpeech, Fixture, MemoryCheckpoint,
    };

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn scheduler(
        fixture: &Fixture,
        speech: Arc<FakeSpeech>,
        checkpoint: Arc<dyn CheckpointPort>,
        concurrency: usize,
    ) -> BatchScheduler {
        BatchScheduler::new(
            fixture.client(speech),
            checkpoint,
            ProgressReporter::disabled(),
            nz(concurrency),
        )
    }

    fn decisions(answers: Vec<RecoveryDecision>) -> ErrorAggregator {
        let mut mock = MockDecisionPort::new();
        let mut answers = answers.into_iter();
        let expected = answers.len();
        mock.expect_on_batch_failure()
            .times(expected)
            .returning(move |_| answers.next().unwrap_or_default());
        ErrorAggregator::new(Arc::new(mock))
    }

    fn statuses(outcome: &ScheduleOutcome) -> Vec<(String, String, u32)> {
        outcome
            .items()
            .map(|item| {
                (
                    item.id().to_string(),
                    item.status().to_string(),
                    item.attempts(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn all_items_succeed_in_two_batches() {
        let fixture = Fixture::with_items(&["1", "2", "3"]);
        let speech = Arc::new(FakeSpeech::new());
        let checkpoint = Arc::new(MemoryCheckpoint::begun());
        let scheduler = scheduler(&fixture, speech.clone(), checkpoint.clone(), 2);

        let batches = plan_batches(fixture.items(), nz(2));
        let outcome = scheduler.run(batches, &decisions(Vec::new())).await;

        assert!(!outcome.aborted);
        let sizes: Vec<usize> = outcome.batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert!(outcome.items().all(WorkItem::is_succeeded));
        assert_eq!(checkpoint.completed_ids(), vec!["1", "2", "3"]);
        assert!(fixture.output("3").exists());
    }

    #[tokio::test]
    async fn retried_item_succeeds_on_second_attempt() {
        let fixture = Fixture::with_items(&["1", "2", "3"]);
        let speech = Arc::new(
            FakeSpeech::new().script("2", vec![FakeReply::Error("gateway timeout")]),
        );
        let checkpoint = Arc::new(MemoryCheckpoint::begun());
        let scheduler = scheduler(&fixture, speech.clone(), checkpoint, 2);

        let batches = plan_batches(fixture.items(), nz(2));
        let outcome = scheduler
            .run(batches, &decisions(vec![RecoveryDecision::Retry]))
            .await;

        assert_eq!(
            statuses(&outcome),
            vec![
                ("1".to_string(), "succeeded".to_string(), 1),
                ("2".to_string(), "succeeded".to_string(), 2),
                ("3".to_string(), "succeeded".to_string(), 1),
            ]
        );
        assert_eq!(speech.calls("2"), 2);
        assert_eq!(speech.calls("1"), 1);
    }

    #[tokio::test]
    async fn abort_stops_before_next_batch() {
        let fixture = Fixture::with_items(&["1", "2", "3"]);
        let speech = Arc::new(FakeSpeech::new().script("1", vec![FakeReply::Error("boom")]));
        let checkpoint = Arc::new(MemoryCheckpoint::begun());
        let scheduler = scheduler(&fixture, speech.clone(), checkpoint, 2);

        let batches = plan_batches(fixture.items(), nz(2));
        let outcome = scheduler
            .run(batches, &decisions(vec![RecoveryDecision::Abort]))
            .await;

        assert!(outcome.aborted);
        assert_eq!(outcome.batches.len(), 1);
        assert_eq!(speech.calls("3"), 0);
        assert!(!fixture.output("1").exists());
    }

    #[tokio::test]
    async fn never_more_than_two_attempts() {
        let fixture = Fixture::with_items(&["1"]);
        let speech = Arc::new(FakeSpeech::new().script(
            "1",
            vec![
                FakeReply::Error("first"),
                FakeReply::Error("second"),
                FakeReply::Audio(4096),
            ],
        ));
        let checkpoint = Arc::new(MemoryCheckpoint::begun());
        let scheduler = scheduler(&fixture, speech.clone(), checkpoint.clone(), 1);

        let batches = plan_batches(fixture.items(), nz(1));
        let outcome = scheduler
            .run(batches, &decisions(vec![RecoveryDecision::Retry]))
            .await;

        let item = outcome.items().next().unwrap();
        assert_eq!(item.attempts(), 2);
        assert!(item.failure_reason().unwrap().contains("second"));
        assert_eq!(speech.calls("1"), 2);
        assert!(checkpoint.completed_ids().is_empty());
        assert!(!fixture.output("1").exists());
    }

    #[tokio::test]
    async fn failed_retry_moves_on_without_asking_again() {
        let fixture = Fixture::with_items(&["1", "2", "3"]);
        let speech = Arc::new(FakeSpeech::new().script(
            "2",
            vec![FakeReply::Error("first"), FakeReply::Error("second")],
        ));
        let checkpoint = Arc::new(MemoryCheckpoint::begun());
        let scheduler = scheduler(&fixture, speech.clone(), checkpoint.clone(), 2);

        // A second prompt would trip the mock's call count.
        let batches = plan_batches(fixture.items(), nz(2));
        let outcome = scheduler
            .run(batches, &decisions(vec![RecoveryDecision::Retry]))
            .await;

        assert!(!outcome.aborted);
        assert_eq!(outcome.batches.len(), 2);
        assert_eq!(
            statuses(&outcome),
            vec![
                ("1".to_string(), "succeeded".to_string(), 1),
                ("2".to_string(), "failed".to_string(), 2),
                ("3".to_string(), "succeeded".to_string(), 1),
            ]
        );
        assert_eq!(speech.calls("3"), 1);
        assert_eq!(checkpoint.completed_ids(), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn decision_is_announced_before_the_operator_is_asked() {
        let fixture = Fixture::with_items(&["1", "2"]);
        let speech = Arc::new(FakeSpeech::new().script("2", vec![FakeReply::Error("boom")]));
        let sink = Arc::new(CollectingSink::default());
        let (progress, renderer) = ProgressReporter::spawn(sink.clone());
        let scheduler = BatchScheduler::new(
            fixture.client(speech),
            Arc::new(MemoryCheckpoint::begun()),
            progress.clone(),
            nz(2),
        );

        let batches = plan_batches(fixture.items(), nz(1));
        scheduler
            .run(batches, &decisions(vec![RecoveryDecision::Continue]))
            .await;
        progress.close();
        renderer.await.unwrap();

        let events = sink.events();
        let awaiting: Vec<&ProgressEvent> = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::AwaitingDecision { .. }))
            .collect();
        assert_eq!(
            awaiting,
            vec![&ProgressEvent::AwaitingDecision {
                index: 1,
                failed: 1
            }]
        );
        let asked = events
            .iter()
            .position(|e| matches!(e, ProgressEvent::AwaitingDecision { .. }))
            .unwrap();
        let finished = events
            .iter()
            .position(|e| matches!(e, ProgressEvent::BatchFinished { index: 1, .. }))
            .unwrap();
        assert!(asked < finished);
    }

    #[tokio::test]
    async fn continue_keeps_going_after_failures() {
        let fixture = Fixture::with_items(&["1", "2", "3"]);
        let speech = Arc::new(FakeSpeech::new().script("1", vec![FakeReply::Audio(10)]));
        let checkpoint = Arc::new(MemoryCheckpoint::begun());
        let scheduler = scheduler(&fixture, speech, checkpoint.clone(), 2);

        let batches = plan_batches(fixture.items(), nz(2));
        let outcome = scheduler
            .run(batches, &decisions(vec![RecoveryDecision::Continue]))
            .await;

        assert_eq!(outcome.batches.len(), 2);
        let first = outcome.items().next().unwrap();
        assert!(first.failure_reason().unwrap().contains("incomplete output"));
        assert_eq!(checkpoint.completed_ids(), vec!["2", "3"]);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let names: Vec<String> = (1..=6).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let fixture = Fixture::with_items(&refs);
        let speech = Arc::new(FakeSpeech::new().with_delay(Duration::from_millis(20)));
        let checkpoint = Arc::new(MemoryCheckpoint::begun());
        let scheduler = scheduler(&fixture, speech.clone(), checkpoint, 2);

        let mut batch = plan_batches(fixture.items(), nz(6)).remove(0);
        scheduler.execute(&mut batch).await;

        assert!(batch.is_done());
        assert!(speech.max_in_flight() <= 2);
        assert!(speech.max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn checkpoint_write_failures_do_not_fail_items() {
        let fixture = Fixture::with_items(&["1", "2"]);
        let speech = Arc::new(FakeSpeech::new());
        let mut checkpoint = MockCheckpointPort::new();
        checkpoint
            .expect_record_completed()
            .times(2)
            .returning(|_| Err(ApplicationError::Checkpoint("disk full".to_string())));
        let scheduler = scheduler(&fixture, speech, Arc::new(checkpoint), 2);

        let mut batch = plan_batches(fixture.items(), nz(2)).remove(0);
        scheduler.execute(&mut batch).await;

        assert!(batch.items().iter().all(WorkItem::is_succeeded));
    }

    #[tokio::test]
    async fn panicking_conversions_become_failures() {
        let fixture = Fixture::with_items(&["1", "2"]);
        let speech = Arc::new(FakeSpeech::new().script("2", vec![FakeReply::Panic]));
        let checkpoint = Arc::new(MemoryCheckpoint::begun());
        let scheduler = scheduler(&fixture, speech, checkpoint, 2);

        let mut batch = plan_batches(fixture.items(), nz(2)).remove(0);
        scheduler.execute(&mut batch).await;

        assert!(batch.items()[0].is_succeeded());
        assert!(batch.items()[1].failure_reason().unwrap().contains("panicked"));
    }
}
