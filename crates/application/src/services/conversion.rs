//! Conversion client - Converts one work item into one audio file
//!
//! Every failure, including a panic inside the synthesis adapter, comes back
//! as a [`ConversionFailure`] value, and no partially written output survives it.

use std::any::Any;
use std::fmt;
use std::io::ErrorKind;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use domain::{Adjustment, ConversionRequest, WorkItem};
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::ports::SpeechSynthesisPort;

/// Item-level conversion failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionFailure {
    /// Source text is empty after trimming
    #[error("source text is empty")]
    EmptyText,

    /// Source text could not be read
    #[error("cannot read source: {0}")]
    Read(String),

    /// Source text is not valid UTF-8
    #[error("source is not valid UTF-8: {0}")]
    Decode(String),

    /// The synthesis capability reported an error
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// Output could not be written
    #[error("cannot write output: {0}")]
    Write(String),

    /// Output is missing after writing
    #[error("output missing after write")]
    MissingOutput,

    /// Output is smaller than the configured minimum
    #[error("incomplete output: {bytes} bytes, expected at least {minimum}")]
    IncompleteOutput {
        /// Size found
        bytes: u64,
        /// Configured minimum
        minimum: u64,
    },

    /// The conversion panicked
    #[error("conversion panicked: {0}")]
    Panicked(String),
}

/// Voice and validation parameters shared by every conversion of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSettings {
    /// Voice identifier
    pub voice: String,
    /// Speaking rate adjustment
    pub rate: Adjustment,
    /// Volume adjustment
    pub volume: Adjustment,
    /// Outputs below this size count as truncated
    pub min_output_bytes: u64,
}

/// Performs single-item conversions
#[derive(Clone)]
pub struct ConversionClient {
    speech: Arc<dyn SpeechSynthesisPort>,
    settings: ConversionSettings,
}

impl fmt::Debug for ConversionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionClient")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ConversionClient {
    /// Create a client
    pub fn new(speech: Arc<dyn SpeechSynthesisPort>, settings: ConversionSettings) -> Self {
        Self { speech, settings }
    }

    /// Probe the synthesis service
    pub async fn service_available(&self) -> bool {
        self.speech.is_available().await
    }

    /// Convert one item, returning the size of the written audio
    #[instrument(skip(self, item), fields(id = %item.id()))]
    pub async fn convert(&self, item: &WorkItem) -> Result<u64, ConversionFailure> {
        let result = match AssertUnwindSafe(self.try_convert(item)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(ConversionFailure::Panicked(panic_message(payload.as_ref()))),
        };

        if let Err(failure) = &result {
            warn!(error = %failure, "Conversion failed");
            remove_partial_output(item.output_path()).await;
        }

        result
    }

    async fn try_convert(&self, item: &WorkItem) -> Result<u64, ConversionFailure> {
        let raw = tokio::fs::read(item.source_path())
            .await
            .map_err(|e| ConversionFailure::Read(e.to_string()))?;
        let text = String::from_utf8(raw).map_err(|e| ConversionFailure::Decode(e.to_string()))?;

        let request = ConversionRequest::new(
            text,
            self.settings.voice.clone(),
            self.settings.rate,
            self.settings.volume,
        );
        if request.is_blank() {
            return Err(ConversionFailure::EmptyText);
        }

        debug!(chars = request.char_count(), "Synthesizing");
        let audio = self
            .speech
            .synthesize(&request)
            .await
            .map_err(|e| ConversionFailure::Synthesis(e.to_string()))?;

        tokio::fs::write(item.output_path(), &audio)
            .await
            .map_err(|e| ConversionFailure::Write(e.to_string()))?;

        let bytes = match tokio::fs::metadata(item.output_path()).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return Err(ConversionFailure::MissingOutput),
        };
        if bytes < self.settings.min_output_bytes {
            return Err(ConversionFailure::IncompleteOutput {
                bytes,
                minimum: self.settings.min_output_bytes,
            });
        }

        Ok(bytes)
    }
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == ErrorKind::NotFound => {},
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove partial output"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
