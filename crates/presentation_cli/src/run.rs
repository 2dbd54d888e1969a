//! Command execution - wires configuration into a pipeline and runs it

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use application::ports::{CheckpointPort, DecisionPort, ProgressSink};
use application::{
    ApplicationError, ConversionClient, ConversionPipeline, FileCatalog, PipelineOutcome,
    ProgressReporter, RunReport,
};
use domain::{RecoveryDecision, RunSummary};
use infrastructure::{
    AlwaysAccept, AppConfig, ConfigOverrides, ConsoleDecisions, JsonlCheckpointStore, LogFormat,
    LogProgress, ScriptedDecisions, SpeechAdapter, TerminalProgress,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::report;
use crate::{Cli, Commands, EXIT_INCOMPLETE, FailurePolicy};

type Console = ConsoleDecisions<std::io::BufReader<std::io::Stdin>, std::io::Stderr>;

/// Decision source for a run
///
/// A failure policy answers without asking, including the start prompt.
fn decisions(
    yes: bool,
    on_failure: Option<FailurePolicy>,
    console: Console,
) -> Arc<dyn DecisionPort> {
    match (yes, on_failure) {
        (_, Some(policy)) => Arc::new(ScriptedDecisions::fixed(policy.into())),
        (true, None) => Arc::new(AlwaysAccept),
        (false, None) => Arc::new(console),
    }
}

/// Progress bar on an interactive text terminal, log events otherwise
fn progress_sink(format: LogFormat) -> Arc<dyn ProgressSink> {
    if format == LogFormat::Text && std::io::stderr().is_terminal() {
        Arc::new(TerminalProgress::new())
    } else {
        Arc::new(LogProgress)
    }
}

fn build_pipeline(
    config: &AppConfig,
    decisions: Arc<dyn DecisionPort>,
    progress: ProgressReporter,
) -> Result<ConversionPipeline> {
    let speech = SpeechAdapter::new(config.speech()).context("Failed to set up speech client")?;
    let client = ConversionClient::new(Arc::new(speech), config.conversion());
    let checkpoint = JsonlCheckpointStore::new(&config.checkpoint_path);

    Ok(ConversionPipeline::new(
        FileCatalog::new(config.catalog()),
        client,
        Arc::new(checkpoint),
        decisions,
        progress,
        config.pipeline()?,
    ))
}

/// Offer the operator one chance to name another input directory
async fn resolve_input_dir(
    config: AppConfig,
    config_path: Option<&Path>,
    mut overrides: ConfigOverrides,
    console: &Console,
) -> Result<AppConfig> {
    if tokio::fs::try_exists(&config.input_dir).await.unwrap_or(false) {
        return Ok(config);
    }
    if !std::io::stdin().is_terminal() {
        return Ok(config);
    }

    let Some(input_dir) = console.ask_input_dir(&config.input_dir).await else {
        return Ok(config);
    };
    info!(input_dir = %input_dir.display(), "Using input directory from prompt");
    overrides.input_dir = Some(input_dir);
    Ok(AppConfig::load(config_path, &overrides)?)
}

/// Process exit code for a finished run
pub fn exit_code(report: &RunReport) -> ExitCode {
    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INCOMPLETE)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    info!(path = %path.display(), "Summary written");
    Ok(())
}

/// Execute the parsed command
pub async fn dispatch(cli: Cli, config: AppConfig, overrides: ConfigOverrides) -> Result<ExitCode> {
    match cli.command {
        Commands::Run {
            yes,
            on_failure,
            summary_json,
            ..
        } => {
            let console = ConsoleDecisions::stdio();
            let unattended = yes || on_failure.is_some();
            let config = if unattended {
                config
            } else {
                resolve_input_dir(config, cli.config.as_deref(), overrides, &console).await?
            };

            let (progress, renderer) = ProgressReporter::spawn(progress_sink(config.log_format));
            let pipeline = build_pipeline(
                &config,
                decisions(yes, on_failure, console),
                progress.clone(),
            )?;

            let outcome = pipeline.run().await;
            progress.close();
            if let Err(e) = renderer.await {
                warn!(error = %e, "Progress renderer failed");
            }

            match outcome.map_err(describe)? {
                PipelineOutcome::Declined(plan) => {
                    println!("{}", report::declined(&plan));
                    Ok(ExitCode::SUCCESS)
                },
                PipelineOutcome::Completed(run) => {
                    println!("{}", report::run(&run, &config.checkpoint_path));
                    if let Some(path) = summary_json {
                        write_json(&path, &run)?;
                    }
                    Ok(exit_code(&run))
                },
            }
        },
        Commands::Validate { summary_json, .. } => {
            let pipeline = build_pipeline(
                &config,
                Arc::new(ScriptedDecisions::fixed(RecoveryDecision::Abort)),
                ProgressReporter::disabled(),
            )?;
            let summary: RunSummary = pipeline.audit().await.map_err(describe)?;

            println!("{}", report::audit(&summary));
            if let Some(path) = summary_json {
                write_json(&path, &summary)?;
            }
            Ok(if summary.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_INCOMPLETE)
            })
        },
        Commands::Status { .. } => {
            let checkpoint = JsonlCheckpointStore::new(&config.checkpoint_path);
            let state = checkpoint.load().await.map_err(describe)?;
            println!("{}", report::status(state.as_ref(), &config.checkpoint_path));
            Ok(ExitCode::SUCCESS)
        },
    }
}

/// Attach a hint to errors the operator can fix
fn describe(err: ApplicationError) -> anyhow::Error {
    let hint = match &err {
        ApplicationError::MissingInput(_) => Some("pass --input or set input_dir"),
        ApplicationError::EmptyCatalog(_) => Some("check text_extension"),
        ApplicationError::Checkpoint(_) => Some("inspect or remove the checkpoint file"),
        _ => None,
    };
    match hint {
        Some(hint) => anyhow::Error::new(err).context(format!("Run failed ({hint})")),
        None => anyhow::Error::new(err),
    }
}
