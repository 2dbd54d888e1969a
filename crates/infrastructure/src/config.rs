//! Application configuration
//!
//! Layering, lowest to highest precedence: built-in defaults, the config
//! file, `AUDIOBATCH_*` environment variables, command-line overrides.
//! The result is validated once and never mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use ai_speech::SpeechConfig;
use application::{ApplicationError, CatalogConfig, ConversionSettings, PipelineOptions};
use domain::Adjustment;
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_NAME: &str = "audiobatch";

/// Prefix of environment overrides, e.g. `AUDIOBATCH_BATCH_SIZE`
pub const ENV_PREFIX: &str = "AUDIOBATCH";

/// Largest accepted batch size
pub const MAX_BATCH_SIZE: usize = 100;

const RATE_RANGE: (i16, i16) = (-75, 300);
const VOLUME_RANGE: (i16, i16) = (-100, 100);

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid log format: {s}. Use 'text' or 'json'")),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the source text files
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory receiving one audio file per item
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Voice identifier passed to the synthesis service
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Speaking rate adjustment, e.g. `+10%`
    #[serde(default)]
    pub rate: Adjustment,

    /// Volume adjustment, e.g. `-20%`
    #[serde(default)]
    pub volume: Adjustment,

    /// Maximum items per batch, also the concurrency ceiling
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Location of the checkpoint ledger
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,

    /// Extension of source text files, without the dot
    #[serde(default = "default_text_extension")]
    pub text_extension: String,

    /// Outputs smaller than this are treated as truncated
    #[serde(default = "default_min_output_bytes")]
    pub min_output_bytes: u64,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Synthesis endpoint
    #[serde(default)]
    pub speech: SpeechConfig,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("in")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_voice() -> String {
    "zh-CN-XiaoxiaoNeural".to_string()
}

const fn default_batch_size() -> usize {
    10
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from(".breakpointfile")
}

fn default_text_extension() -> String {
    "txt".to_string()
}

const fn default_min_output_bytes() -> u64 {
    1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            voice: default_voice(),
            rate: Adjustment::NEUTRAL,
            volume: Adjustment::NEUTRAL,
            batch_size: default_batch_size(),
            checkpoint_path: default_checkpoint_path(),
            text_extension: default_text_extension(),
            min_output_bytes: default_min_output_bytes(),
            log_format: LogFormat::default(),
            speech: SpeechConfig::default(),
        }
    }
}

/// Values given on the command line, applied on top of every other source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Input directory
    pub input_dir: Option<PathBuf>,
    /// Output directory
    pub output_dir: Option<PathBuf>,
    /// Voice
    pub voice: Option<String>,
    /// Rate adjustment as typed, e.g. `+10%`
    pub rate: Option<String>,
    /// Volume adjustment as typed
    pub volume: Option<String>,
    /// Batch size
    pub batch_size: Option<usize>,
    /// Checkpoint ledger path
    pub checkpoint_path: Option<PathBuf>,
    /// Synthesis base URL
    pub speech_url: Option<String>,
    /// Log format
    pub log_format: Option<LogFormat>,
}

fn path_value(path: Option<&PathBuf>) -> Option<String> {
    path.map(|p| p.display().to_string())
}

fn config_error(err: &config::ConfigError) -> ApplicationError {
    ApplicationError::Configuration(err.to_string())
}

impl AppConfig {
    /// Load configuration from file, environment and overrides
    ///
    /// Without an explicit path, `audiobatch.toml` in the working directory
    /// is read when present. An explicit path must exist.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ApplicationError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        Self::from_sources(file, None, overrides)
    }

    /// Build from an explicit file source and environment map
    ///
    /// `env` of `None` reads the process environment.
    pub fn from_sources<S>(
        file: S,
        env: Option<HashMap<String, String>>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ApplicationError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let batch_size = overrides
            .batch_size
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX));

        let builder = config::Config::builder()
            .add_source(file)
            // e.g. AUDIOBATCH_BATCH_SIZE, AUDIOBATCH_SPEECH__BASE_URL
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .set_override_option("input_dir", path_value(overrides.input_dir.as_ref()))
            .and_then(|b| b.set_override_option("output_dir", path_value(overrides.output_dir.as_ref())))
            .and_then(|b| b.set_override_option("voice", overrides.voice.clone()))
            .and_then(|b| b.set_override_option("rate", overrides.rate.clone()))
            .and_then(|b| b.set_override_option("volume", overrides.volume.clone()))
            .and_then(|b| b.set_override_option("batch_size", batch_size))
            .and_then(|b| {
                b.set_override_option(
                    "checkpoint_path",
                    path_value(overrides.checkpoint_path.as_ref()),
                )
            })
            .and_then(|b| b.set_override_option("speech.base_url", overrides.speech_url.clone()))
            .and_then(|b| {
                b.set_override_option(
                    "log_format",
                    overrides.log_format.map(|f| f.to_string()),
                )
            })
            .map_err(|e| config_error(&e))?;

        let config: Self = builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| config_error(&e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ApplicationError> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(ApplicationError::Configuration(format!(
                "batch_size must be within 1..={MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }

        self.rate
            .ensure_within(RATE_RANGE.0, RATE_RANGE.1)
            .map_err(|e| ApplicationError::Configuration(format!("rate: {e}")))?;
        self.volume
            .ensure_within(VOLUME_RANGE.0, VOLUME_RANGE.1)
            .map_err(|e| ApplicationError::Configuration(format!("volume: {e}")))?;

        if self.voice.trim().is_empty() {
            return Err(ApplicationError::Configuration(
                "voice must not be empty".to_string(),
            ));
        }

        let text_ext = self.text_extension.trim_start_matches('.');
        if text_ext.is_empty() {
            return Err(ApplicationError::Configuration(
                "text_extension must not be empty".to_string(),
            ));
        }
        if text_ext.eq_ignore_ascii_case(self.audio_extension()) {
            return Err(ApplicationError::Configuration(format!(
                "text_extension and audio extension are both '{text_ext}'"
            )));
        }

        if self.input_dir == self.output_dir {
            return Err(ApplicationError::Configuration(format!(
                "input_dir and output_dir are both {}",
                self.input_dir.display()
            )));
        }

        self.speech
            .validate()
            .map_err(|e| ApplicationError::Configuration(format!("speech: {e}")))
    }

    /// Extension of produced audio files
    pub fn audio_extension(&self) -> &'static str {
        self.speech.output_format.extension()
    }

    /// Catalog settings
    pub fn catalog(&self) -> CatalogConfig {
        CatalogConfig {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            text_extension: self.text_extension.trim_start_matches('.').to_string(),
            audio_extension: self.audio_extension().to_string(),
        }
    }

    /// Per-item conversion settings
    pub fn conversion(&self) -> ConversionSettings {
        ConversionSettings {
            voice: self.voice.clone(),
            rate: self.rate,
            volume: self.volume,
            min_output_bytes: self.min_output_bytes,
        }
    }

    /// Run-wide pipeline options
    pub fn pipeline(&self) -> Result<PipelineOptions, ApplicationError> {
        let batch_size = NonZeroUsize::new(self.batch_size).ok_or_else(|| {
            ApplicationError::Configuration("batch_size must be at least 1".to_string())
        })?;
        Ok(PipelineOptions {
            batch_size,
            min_output_bytes: self.min_output_bytes,
        })
    }

    /// Synthesis endpoint settings, with the configured voice as default
    pub fn speech(&self) -> SpeechConfig {
        SpeechConfig {
            default_voice: self.voice.clone(),
            ..self.speech.clone()
        }
    }
}
