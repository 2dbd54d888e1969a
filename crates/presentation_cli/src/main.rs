//! audiobatch CLI
//!
//! Converts a directory of text files into audio files, batch by batch,
//! resuming where an interrupted run stopped.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod report;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use domain::RecoveryDecision;
use infrastructure::{
    AppConfig, ConfigOverrides, LogFormat, TelemetryConfig, filter_for_verbosity, init_tracing,
};
use tracing::error;

/// Exit code of a run that finished with failures or was aborted
pub const EXIT_INCOMPLETE: u8 = 2;

/// audiobatch CLI
#[derive(Debug, Parser)]
#[command(name = "audiobatch")]
#[command(author, version, about = "Batch text-to-speech conversion", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ./audiobatch.toml when present)
    #[arg(short, long, global = true, env = "AUDIOBATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert every pending text file
    ///
    /// Example: audiobatch run --input chapters --output audio --batch-size 5
    Run {
        #[command(flatten)]
        paths: PathArgs,

        #[command(flatten)]
        synthesis: SynthesisArgs,

        /// Start without asking and continue past failed batches
        #[arg(short, long)]
        yes: bool,

        /// Start without asking and answer every failed batch this way
        #[arg(long, value_enum)]
        on_failure: Option<FailurePolicy>,

        /// Write the run report as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// Check every expected output without converting anything
    Validate {
        #[command(flatten)]
        paths: PathArgs,

        /// Write the summary as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// Show the checkpoint of an unfinished run
    Status {
        /// Checkpoint ledger location
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
}

/// Input and output locations
#[derive(Debug, Clone, Default, Args)]
struct PathArgs {
    /// Directory with the source text files
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for the audio files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Checkpoint ledger location
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

/// Synthesis parameters
#[derive(Debug, Clone, Default, Args)]
struct SynthesisArgs {
    /// Voice identifier
    #[arg(long)]
    voice: Option<String>,

    /// Rate adjustment, e.g. +10% or -20%
    #[arg(long, allow_hyphen_values = true)]
    rate: Option<String>,

    /// Volume adjustment, e.g. +10% or -20%
    #[arg(long, allow_hyphen_values = true)]
    volume: Option<String>,

    /// Items per batch (1-100)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Base URL of the speech endpoint
    #[arg(long)]
    speech_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FailurePolicy {
    Continue,
    Retry,
    Abort,
}

impl From<FailurePolicy> for RecoveryDecision {
    fn from(policy: FailurePolicy) -> Self {
        match policy {
            FailurePolicy::Continue => Self::Continue,
            FailurePolicy::Retry => Self::Retry,
            FailurePolicy::Abort => Self::Abort,
        }
    }
}

impl Cli {
    /// Command-line values layered over file and environment
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            log_format: self.log_format.map(LogFormat::from),
            ..ConfigOverrides::default()
        };

        match &self.command {
            Commands::Run {
                paths, synthesis, ..
            } => {
                paths.apply(&mut overrides);
                overrides.voice.clone_from(&synthesis.voice);
                overrides.rate.clone_from(&synthesis.rate);
                overrides.volume.clone_from(&synthesis.volume);
                overrides.batch_size = synthesis.batch_size;
                overrides.speech_url.clone_from(&synthesis.speech_url);
            },
            Commands::Validate { paths, .. } => paths.apply(&mut overrides),
            Commands::Status { checkpoint } => {
                overrides.checkpoint_path.clone_from(checkpoint);
            },
        }

        overrides
    }
}

impl PathArgs {
    fn apply(&self, overrides: &mut ConfigOverrides) {
        overrides.input_dir.clone_from(&self.input);
        overrides.output_dir.clone_from(&self.output);
        overrides.checkpoint_path.clone_from(&self.checkpoint);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let overrides = cli.overrides();

    let config = match AppConfig::load(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = init_tracing(&TelemetryConfig {
        log_filter: filter_for_verbosity(cli.verbose).to_string(),
        format: config.log_format,
    }) {
        eprintln!("⚠️  {e}");
    }

    match run::dispatch(cli, config, overrides).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Fatal error");
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        },
    }
}
