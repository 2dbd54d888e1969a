//! Progress reporter - Non-blocking progress publication
//!
//! Events travel over an unbounded channel to a rendering task that owns the
//! [`ProgressSink`]. Publishing never waits on the renderer, and a reporter
//! without a renderer simply drops events.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use domain::WorkItemId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::ports::{ItemOutcome, ProgressEvent, ProgressSink};

struct Inner {
    completed: AtomicU64,
    total: AtomicU64,
    finished_ids: Mutex<HashSet<WorkItemId>>,
    sender: Mutex<Option<mpsc::UnboundedSender<ProgressEvent>>>,
}

/// Counts terminal items and forwards progress events
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<Inner>,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("completed", &self.completed())
            .field("total", &self.total())
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    fn with_sender(sender: Option<mpsc::UnboundedSender<ProgressEvent>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                completed: AtomicU64::new(0),
                total: AtomicU64::new(0),
                finished_ids: Mutex::new(HashSet::new()),
                sender: Mutex::new(sender),
            }),
        }
    }

    /// Start a rendering task feeding `sink`
    ///
    /// The task ends once [`ProgressReporter::close`] has been called and
    /// every queued event was rendered.
    pub fn spawn(sink: Arc<dyn ProgressSink>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                sink.handle(&event);
            }
            debug!("Progress renderer stopped");
        });

        (Self::with_sender(Some(tx)), handle)
    }

    /// A reporter that counts but renders nothing
    pub fn disabled() -> Self {
        Self::with_sender(None)
    }

    /// Distinct items that reached a terminal state
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Items considered by the run
    pub fn total(&self) -> u64 {
        self.inner.total.load(Ordering::Acquire)
    }

    /// Stop forwarding events, letting the renderer drain and exit
    pub fn close(&self) {
        self.inner.sender.lock().take();
    }

    fn publish(&self, event: ProgressEvent) {
        if let Some(sender) = self.inner.sender.lock().as_ref() {
            // A closed receiver only means nobody is watching.
            let _ = sender.send(event);
        }
    }

    /// A run begins; items finished before it count as completed
    pub fn run_started(&self, total: u64, already_completed: u64, batches: usize) {
        self.inner.total.store(total, Ordering::Release);
        self.inner
            .completed
            .store(already_completed, Ordering::Release);
        self.inner.finished_ids.lock().clear();
        self.publish(ProgressEvent::RunStarted {
            total,
            already_completed,
            batches,
        });
    }

    /// A batch begins
    pub fn batch_started(&self, index: usize, of: usize, size: usize) {
        self.publish(ProgressEvent::BatchStarted { index, of, size });
    }

    /// Failed items of a batch are retried
    pub fn retry_started(&self, index: usize, size: usize) {
        self.publish(ProgressEvent::RetryStarted { index, size });
    }

    /// An item was dispatched
    pub fn item_started(&self, id: &WorkItemId, attempt: u32) {
        self.publish(ProgressEvent::ItemStarted {
            id: id.clone(),
            attempt,
        });
    }

    /// An attempt ended; only the first terminal transition of an item counts
    pub fn item_finished(&self, id: &WorkItemId, outcome: ItemOutcome, elapsed: Duration) {
        let first_time = self.inner.finished_ids.lock().insert(id.clone());
        let completed = if first_time {
            self.inner.completed.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.completed()
        };

        self.publish(ProgressEvent::ItemFinished {
            id: id.clone(),
            outcome,
            elapsed,
            completed,
            total: self.total(),
        });
    }

    /// A batch with failures is handed to the operator
    pub fn awaiting_decision(&self, index: usize, failed: usize) {
        self.publish(ProgressEvent::AwaitingDecision { index, failed });
    }

    /// A batch is done
    pub fn batch_finished(&self, index: usize, succeeded: usize, failed: usize) {
        self.publish(ProgressEvent::BatchFinished {
            index,
            succeeded,
            failed,
        });
    }

    /// The run is over
    pub fn run_finished(&self, elapsed: Duration, aborted: bool) {
        self.publish(ProgressEvent::RunFinished { elapsed, aborted });
    }
}
