//! Decision providers - Implementations of DecisionPort
//!
//! - [`ConsoleDecisions`] asks the operator on a terminal
//! - [`ScriptedDecisions`] answers from a fixed script
//! - [`AlwaysAccept`] starts every run and continues past every failure

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, BufReader, Stderr, Stdin, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use application::ports::{DecisionPort, RunPlan};
use async_trait::async_trait;
use domain::{BatchReport, RecoveryDecision};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Accepts every run and continues past every failed batch
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAccept;

#[async_trait]
impl DecisionPort for AlwaysAccept {
    async fn confirm_start(&self, _plan: &RunPlan) -> bool {
        true
    }

    async fn on_batch_failure(&self, report: &BatchReport) -> RecoveryDecision {
        info!(
            batch = report.index + 1,
            failed = report.failed.len(),
            "Continuing past failed items"
        );
        RecoveryDecision::Continue
    }
}

/// Answers from a script, then falls back to a fixed decision
#[derive(Debug)]
pub struct ScriptedDecisions {
    start: bool,
    answers: Mutex<VecDeque<RecoveryDecision>>,
    fallback: RecoveryDecision,
}

impl ScriptedDecisions {
    /// Start every run and always answer `decision`
    pub fn fixed(decision: RecoveryDecision) -> Self {
        Self::sequence(true, Vec::new(), decision)
    }

    /// Answer `answers` in order, then `fallback`
    pub fn sequence(start: bool, answers: Vec<RecoveryDecision>, fallback: RecoveryDecision) -> Self {
        Self {
            start,
            answers: Mutex::new(answers.into()),
            fallback,
        }
    }
}

#[async_trait]
impl DecisionPort for ScriptedDecisions {
    async fn confirm_start(&self, _plan: &RunPlan) -> bool {
        self.start
    }

    async fn on_batch_failure(&self, report: &BatchReport) -> RecoveryDecision {
        let decision = self.answers.lock().pop_front().unwrap_or(self.fallback);
        info!(
            batch = report.index + 1,
            failed = report.failed.len(),
            %decision,
            "Scripted recovery decision"
        );
        decision
    }
}

struct ConsoleIo<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> ConsoleIo<R, W> {
    /// Write a prompt and read one trimmed line, `None` on end of input
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.writer.write_all(prompt.as_bytes())?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()
    }
}

/// Asks the operator on a line-based console
pub struct ConsoleDecisions<R, W> {
    io: Arc<Mutex<ConsoleIo<R, W>>>,
}

impl<R, W> fmt::Debug for ConsoleDecisions<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleDecisions").finish_non_exhaustive()
    }
}

impl ConsoleDecisions<BufReader<Stdin>, Stderr> {
    /// Console on stdin, prompts on stderr
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R, W> ConsoleDecisions<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    /// Console on arbitrary streams
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Arc::new(Mutex::new(ConsoleIo { reader, writer })),
        }
    }

    /// Offer to replace a missing input directory
    ///
    /// Returns the path typed by the operator, or `None` if they decline.
    pub async fn ask_input_dir(&self, missing: &Path) -> Option<PathBuf> {
        let question = format!(
            "Input directory {} not found. Specify another input directory? (Y/n) ",
            missing.display()
        );
        self.blocking(move |io| {
            if !accepts(io.ask(&question)?.as_deref()) {
                return Ok(None);
            }
            Ok(io
                .ask("Input directory: ")?
                .filter(|path| !path.is_empty())
                .map(PathBuf::from))
        })
        .await
        .flatten()
    }

    /// Run console I/O off the async workers
    async fn blocking<T, F>(&self, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ConsoleIo<R, W>) -> io::Result<T> + Send + 'static,
    {
        let io = Arc::clone(&self.io);
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = io.lock();
            f(&mut guard)
        })
        .await;

        match result {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(error = %e, "Console I/O failed");
                None
            },
            Err(e) => {
                warn!(error = %e, "Console task failed");
                None
            },
        }
    }
}

/// Start answers default to yes; only `n`/`no` declines
fn accepts(answer: Option<&str>) -> bool {
    match answer {
        None => false,
        Some(answer) => !matches!(answer.to_lowercase().as_str(), "n" | "no"),
    }
}

fn start_prompt(plan: &RunPlan) -> String {
    let mut text = String::new();
    if plan.resuming {
        text.push_str(&format!(
            "Resuming an unfinished run: {} of {} items already converted.\n",
            plan.already_completed, plan.total_items
        ));
    }
    if let (Some(first), Some(last)) = (&plan.first, &plan.last) {
        text.push_str(&format!(
            "Converting from {first} to {last}: {} items in {} batches of up to {}.\n",
            plan.pending, plan.batch_count, plan.batch_size
        ));
    }
    text.push_str("Start? (Y/n) ");
    text
}

fn failure_summary(report: &BatchReport) -> String {
    let mut text = format!(
        "Batch {} finished with {} failed item(s):\n",
        report.index + 1,
        report.failed.len()
    );
    for failure in &report.failed {
        text.push_str(&format!(
            "  {} (attempt {}): {}\n",
            failure.id, failure.attempts, failure.reason
        ));
    }
    text
}

const FAILURE_QUESTION: &str = "[c]ontinue, [r]etry failed items, or [a]bort? (c) ";

#[async_trait]
impl<R, W> DecisionPort for ConsoleDecisions<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    async fn confirm_start(&self, plan: &RunPlan) -> bool {
        let prompt = start_prompt(plan);
        self.blocking(move |io| Ok(accepts(io.ask(&prompt)?.as_deref())))
            .await
            .unwrap_or(false)
    }

    async fn on_batch_failure(&self, report: &BatchReport) -> RecoveryDecision {
        let summary = failure_summary(report);
        self.blocking(move |io| {
            io.say(&summary)?;
            loop {
                match io.ask(FAILURE_QUESTION)? {
                    None => return Ok(RecoveryDecision::default()),
                    Some(answer) if answer.is_empty() => return Ok(RecoveryDecision::default()),
                    Some(answer) => match answer.parse::<RecoveryDecision>() {
                        Ok(decision) => return Ok(decision),
                        Err(_) => io.say("Please answer c, r or a.\n")?,
                    },
                }
            }
        })
        .await
        .unwrap_or_default()
    }
}
