//! Configuration for speech synthesis

use serde::{Deserialize, Serialize};

use crate::types::AudioFormat;

/// Configuration of the `/audio/speech` endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpeechConfig {
    /// Base URL of the API, without the `/audio/speech` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token; omitted from requests when unset
    #[serde(default)]
    pub api_key: Option<String>,

    /// Text-to-speech model
    #[serde(default = "default_model")]
    pub model: String,

    /// Voice used when a request names none
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// Output audio format
    #[serde(default)]
    pub output_format: AudioFormat,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Optional cap on input length in characters
    #[serde(default)]
    pub max_input_chars: Option<usize>,
}

fn default_base_url() -> String {
    "http://localhost:5050/v1".to_string()
}

fn default_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "zh-CN-XiaoxiaoNeural".to_string()
}

const fn default_timeout_ms() -> u64 {
    120_000 // long chapters take a while
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            default_voice: default_voice(),
            output_format: AudioFormat::default(),
            timeout_ms: default_timeout_ms(),
            max_input_chars: None,
        }
    }
}

impl SpeechConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!(
                "Base URL must start with http:// or https://, got '{}'",
                self.base_url
            ));
        }

        if self.model.trim().is_empty() {
            return Err("Model must not be empty".to_string());
        }

        if self.default_voice.trim().is_empty() {
            return Err("Default voice must not be empty".to_string());
        }

        if self.timeout_ms == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.max_input_chars == Some(0) {
            return Err("Max input chars must be greater than 0 when set".to_string());
        }

        Ok(())
    }

    /// Endpoint URL for synthesis requests
    #[must_use]
    pub fn speech_url(&self) -> String {
        format!("{}/audio/speech", self.base_url.trim_end_matches('/'))
    }

    /// Endpoint URL for the availability probe
    #[must_use]
    pub fn models_url(&self) -> String {
        format!("{}/models", self.base_url.trim_end_matches('/'))
    }
}
