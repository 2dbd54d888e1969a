//! OpenAI-compatible Speech Provider
//!
//! Implements `TextToSpeech` against the `/audio/speech` endpoint. Works with
//! OpenAI itself and with self-hosted gateways exposing the same protocol.
//!
//! Two optional fields go beyond the OpenAI contract: `speed` (standard) and
//! `volume` (gateway extension, `+N%` notation). Both are omitted from the
//! request body when unset, so plain OpenAI endpoints accept the request.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::ports::TextToSpeech;
use crate::types::{AudioData, AudioFormat, VoiceSettings};

const SPEED_RANGE: std::ops::RangeInclusive<f32> = 0.25..=4.0;

/// Speech provider for OpenAI-compatible `/audio/speech` endpoints
#[derive(Debug, Clone)]
pub struct OpenAISpeechProvider {
    client: Client,
    config: SpeechConfig,
}

impl OpenAISpeechProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the configuration is invalid.
    pub fn new(config: SpeechConfig) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Configuration)?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                SpeechError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Get the provider configuration
    pub const fn config(&self) -> &SpeechConfig {
        &self.config
    }

    /// Attach the bearer token when one is configured
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn check_input(&self, text: &str, settings: &VoiceSettings) -> Result<(), SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        if let Some(max) = self.config.max_input_chars {
            let chars = text.chars().count();
            if chars > max {
                return Err(SpeechError::InputTooLong { chars, max });
            }
        }

        match settings.speed {
            Some(speed) if !SPEED_RANGE.contains(&speed) => Err(SpeechError::InvalidInput(
                format!("Speed must be between 0.25 and 4.0, got {speed}"),
            )),
            _ => Ok(()),
        }
    }

    /// Turn a non-success response into an error
    fn map_status(&self, status: StatusCode, body: &str, voice: &str) -> SpeechError {
        if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
            match api_error.error.code.as_deref() {
                Some("rate_limit_exceeded") => return SpeechError::RateLimited,
                Some("model_not_found") => {
                    return SpeechError::ModelNotAvailable(self.config.model.clone());
                },
                Some("invalid_voice" | "voice_not_found") => {
                    return SpeechError::VoiceNotFound(voice.to_string());
                },
                _ => {},
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                return SpeechError::RateLimited;
            }
            return SpeechError::SynthesisFailed(api_error.error.message);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => SpeechError::RateLimited,
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                SpeechError::ServiceUnavailable(format!("HTTP {status}"))
            },
            _ => SpeechError::SynthesisFailed(format!("HTTP {status}: {body}")),
        }
    }
}

/// TTS request body
#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<&'a str>,
}

/// OpenAI API error response
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[async_trait]
impl TextToSpeech for OpenAISpeechProvider {
    #[instrument(skip(self, text, settings), fields(text_len = text.len(), voice = ?settings.voice))]
    async fn synthesize(
        &self,
        text: &str,
        settings: &VoiceSettings,
    ) -> Result<AudioData, SpeechError> {
        self.check_input(text, settings)?;

        let voice = settings
            .voice
            .as_deref()
            .unwrap_or(&self.config.default_voice);
        let format = self.config.output_format;

        let request = TtsRequest {
            model: &self.config.model,
            input: text,
            voice,
            response_format: format.response_format(),
            speed: settings
                .speed
                .filter(|speed| (speed - 1.0).abs() >= f32::EPSILON),
            volume: settings.volume.as_deref(),
        };

        debug!("Requesting speech synthesis");

        let response = self
            .authorize(self.client.post(self.config.speech_url()))
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeechError::from_transport(&e, self.config.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(self.map_status(status, &error_body, voice));
        }

        let audio_bytes: Bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::InvalidResponse(format!("Failed to read audio: {e}")))?;

        if audio_bytes.is_empty() {
            return Err(SpeechError::InvalidResponse(
                "Service returned no audio".to_string(),
            ));
        }

        debug!(audio_size = audio_bytes.len(), "Speech synthesis complete");

        Ok(AudioData::new(audio_bytes.to_vec(), format))
    }

    async fn is_available(&self) -> bool {
        match self
            .authorize(self.client.get(self.config.models_url()))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("TTS availability check failed: {}", e);
                false
            },
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn default_voice(&self) -> &str {
        &self.config.default_voice
    }

    fn output_format(&self) -> AudioFormat {
        self.config.output_format
    }
}
