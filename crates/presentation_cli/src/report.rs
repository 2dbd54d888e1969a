//! Human-readable summaries printed after each command

use std::fmt::Write;
use std::path::Path;
use std::time::Duration;

use application::RunReport;
use application::ports::{CheckpointState, RunPlan};
use domain::RunSummary;

fn failures(summary: &RunSummary, out: &mut String) {
    for (id, reason) in summary.failed() {
        let _ = writeln!(out, "   ❌ {id}: {reason}");
    }
}

/// Summary of a finished run
pub fn run(report: &RunReport, checkpoint: &Path) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    let headline = if report.aborted {
        "⚠️  Run aborted"
    } else if summary.is_clean() {
        "✅ Run complete"
    } else {
        "⚠️  Run finished with failures"
    };
    let _ = writeln!(out, "{headline} ({})", report.run_id);
    let _ = writeln!(
        out,
        "   Converted: {}  Failed: {}  Skipped: {}  Batches: {}",
        summary.success_count(),
        summary.failure_count(),
        report.skipped,
        report.batches_executed
    );
    let elapsed = Duration::from_millis(report.elapsed_ms);
    let _ = writeln!(out, "   Time: {:.1}s", elapsed.as_secs_f64());
    failures(summary, &mut out);

    if report.aborted {
        let _ = writeln!(
            out,
            "   Checkpoint kept at {}; run again to resume",
            checkpoint.display()
        );
    }
    out.trim_end().to_string()
}

/// Message for a run the operator declined
pub fn declined(plan: &RunPlan) -> String {
    format!(
        "👋 Not started; {} of {} items still pending",
        plan.pending, plan.total_items
    )
}

/// Summary of an output audit
pub fn audit(summary: &RunSummary) -> String {
    let mut out = String::new();
    if summary.is_clean() {
        let _ = writeln!(out, "✅ All {} outputs valid", summary.success_count());
    } else {
        let _ = writeln!(
            out,
            "⚠️  {} of {} outputs missing or invalid",
            summary.failure_count(),
            summary.total()
        );
        failures(summary, &mut out);
    }
    out.trim_end().to_string()
}

/// Description of the checkpoint ledger
pub fn status(state: Option<&CheckpointState>, checkpoint: &Path) -> String {
    match state {
        None => format!("✅ No unfinished run ({} absent)", checkpoint.display()),
        Some(state) => format!(
            "⏸️  Unfinished run {}\n   Started: {}\n   Completed items: {}\n   Ledger: {}",
            state.run_id,
            state.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            state.completed.len(),
            checkpoint.display()
        ),
    }
}
