//! Progress sinks - Implementations of ProgressSink
//!
//! [`TerminalProgress`] draws a progress bar with one line per finished
//! item. [`LogProgress`] emits the same information as tracing events, for
//! non-interactive runs and JSON logs.

use std::time::Duration;

use application::ports::{ItemOutcome, ProgressEvent, ProgressSink};
use indicatif::{HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, info, warn};

const TICK: Duration = Duration::from_millis(120);

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg}\n[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})";

fn seconds(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

/// Progress bar on the terminal
#[derive(Debug, Clone)]
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalProgress {
    /// Progress bar drawn on stderr
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Progress bar drawn on a specific target
    pub fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }

    /// Current bar position
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Current bar length
    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }
}

impl ProgressSink for TerminalProgress {
    fn handle(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted {
                total,
                already_completed,
                batches,
            } => {
                self.bar.set_length(*total);
                self.bar.set_position(*already_completed);
                self.bar.set_message(format!("{batches} batches"));
                self.bar.enable_steady_tick(TICK);
            },
            ProgressEvent::BatchStarted { index, of, size } => {
                self.bar.enable_steady_tick(TICK);
                self.bar
                    .set_message(format!("batch {}/{of} ({size} items)", index + 1));
            },
            ProgressEvent::RetryStarted { index, size } => {
                self.bar.enable_steady_tick(TICK);
                self.bar.set_message(format!(
                    "batch {}: retrying {size} item(s)",
                    index + 1
                ));
            },
            ProgressEvent::ItemStarted { .. } => {},
            ProgressEvent::ItemFinished {
                id,
                outcome,
                elapsed,
                completed,
                ..
            } => {
                let line = match outcome {
                    ItemOutcome::Succeeded { bytes } => {
                        format!("✅ {id} ({}, {bytes} bytes)", seconds(*elapsed))
                    },
                    ItemOutcome::Failed { reason } => {
                        format!("❌ {id} ({}): {reason}", seconds(*elapsed))
                    },
                };
                self.bar.println(line);
                self.bar.set_position(*completed);
            },
            ProgressEvent::AwaitingDecision { index, failed } => {
                // No redraws while the operator is prompted.
                self.bar.disable_steady_tick();
                self.bar.set_message(format!(
                    "batch {}: {failed} failed, waiting for decision",
                    index + 1
                ));
            },
            ProgressEvent::BatchFinished { .. } => {},
            ProgressEvent::RunFinished { elapsed, aborted } => {
                let message = format!("finished in {}", HumanDuration(*elapsed));
                if *aborted {
                    self.bar.abandon_with_message(format!("aborted, {message}"));
                } else {
                    self.bar.finish_with_message(message);
                }
            },
        }
    }
}

/// Progress as tracing events
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn handle(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted {
                total,
                already_completed,
                batches,
            } => info!(total, already_completed, batches, "Run started"),
            ProgressEvent::BatchStarted { index, of, size } => {
                info!(batch = index + 1, of, size, "Batch started");
            },
            ProgressEvent::RetryStarted { index, size } => {
                info!(batch = index + 1, size, "Retrying failed items");
            },
            ProgressEvent::ItemStarted { id, attempt } => {
                debug!(%id, attempt, "Item started");
            },
            ProgressEvent::ItemFinished {
                id,
                outcome,
                elapsed,
                completed,
                total,
            } => match outcome {
                ItemOutcome::Succeeded { bytes } => info!(
                    %id,
                    bytes,
                    elapsed = %seconds(*elapsed),
                    progress = %format!("{completed}/{total}"),
                    "Item converted"
                ),
                ItemOutcome::Failed { reason } => warn!(
                    %id,
                    %reason,
                    elapsed = %seconds(*elapsed),
                    progress = %format!("{completed}/{total}"),
                    "Item failed"
                ),
            },
            ProgressEvent::AwaitingDecision { index, failed } => {
                info!(batch = index + 1, failed, "Waiting for recovery decision");
            },
            ProgressEvent::BatchFinished {
                index,
                succeeded,
                failed,
            } => info!(batch = index + 1, succeeded, failed, "Batch finished"),
            ProgressEvent::RunFinished { elapsed, aborted } => info!(
                elapsed = %HumanDuration(*elapsed),
                aborted,
                "Run finished"
            ),
        }
    }
}
