//! Speech adapter - Implements SpeechSynthesisPort using ai_speech crate

use std::sync::Arc;

use ai_speech::{OpenAISpeechProvider, SpeechConfig, SpeechError, TextToSpeech, VoiceSettings};
use application::error::ApplicationError;
use application::ports::SpeechSynthesisPort;
use async_trait::async_trait;
use domain::ConversionRequest;
use tracing::{debug, instrument};

/// Adapter for speech synthesis using ai_speech crate
pub struct SpeechAdapter {
    provider: Arc<dyn TextToSpeech>,
}

impl std::fmt::Debug for SpeechAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechAdapter")
            .field("model", &self.provider.model_name())
            .finish()
    }
}

impl SpeechAdapter {
    /// Create a new speech adapter backed by the OpenAI-compatible provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to initialize.
    pub fn new(config: SpeechConfig) -> Result<Self, ApplicationError> {
        let provider = OpenAISpeechProvider::new(config)
            .map_err(|e: SpeechError| ApplicationError::Configuration(e.to_string()))?;

        Ok(Self::with_provider(Arc::new(provider)))
    }

    /// Create an adapter around any text-to-speech provider
    pub fn with_provider(provider: Arc<dyn TextToSpeech>) -> Self {
        Self { provider }
    }

    /// Map a domain request to provider voice settings
    ///
    /// Neutral adjustments are left out so the service applies its own defaults.
    fn voice_settings(request: &ConversionRequest) -> VoiceSettings {
        let mut settings = VoiceSettings::new(request.voice_id());
        if !request.rate().is_neutral() {
            settings = settings.with_speed(request.rate().factor());
        }
        if !request.volume().is_neutral() {
            settings = settings.with_volume(request.volume().to_string());
        }
        settings
    }

    /// Map speech error to application error
    fn map_error(err: SpeechError) -> ApplicationError {
        match err {
            SpeechError::Configuration(e) => ApplicationError::Configuration(e),
            SpeechError::RateLimited => ApplicationError::RateLimited,
            SpeechError::ConnectionFailed(e)
            | SpeechError::RequestFailed(e)
            | SpeechError::ServiceUnavailable(e) => ApplicationError::ExternalService(e),
            SpeechError::Timeout(ms) => {
                ApplicationError::ExternalService(format!("Speech service timeout after {ms}ms"))
            },
            SpeechError::SynthesisFailed(e) => {
                ApplicationError::ExternalService(format!("Synthesis failed: {e}"))
            },
            SpeechError::InvalidResponse(e) => {
                ApplicationError::ExternalService(format!("Invalid response: {e}"))
            },
            other @ (SpeechError::InvalidInput(_)
            | SpeechError::InputTooLong { .. }
            | SpeechError::VoiceNotFound(_)
            | SpeechError::ModelNotAvailable(_)) => ApplicationError::Internal(other.to_string()),
        }
    }
}

#[async_trait]
impl SpeechSynthesisPort for SpeechAdapter {
    #[instrument(skip(self, request), fields(voice = request.voice_id(), chars = request.char_count()))]
    async fn synthesize(&self, request: &ConversionRequest) -> Result<Vec<u8>, ApplicationError> {
        let settings = Self::voice_settings(request);
        let audio = self
            .provider
            .synthesize(request.text(), &settings)
            .await
            .map_err(Self::map_error)?;

        debug!(bytes = audio.size_bytes(), format = %audio.format(), "Synthesis complete");
        Ok(audio.into_data())
    }

    async fn is_available(&self) -> bool {
        self.provider.is_available().await
    }
}

#[cfg(test)]
mod tests {
    use ai_speech::{AudioData, AudioFormat};
    use domain::Adjustment;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingProvider {
        seen: Mutex<Vec<(String, VoiceSettings)>>,
        fail_with: Option<fn() -> SpeechError>,
    }

    #[async_trait]
    impl TextToSpeech for RecordingProvider {
        async fn synthesize(
            &self,
            text: &str,
            settings: &VoiceSettings,
        ) -> Result<AudioData, SpeechError> {
            self.seen.lock().push((text.to_string(), settings.clone()));
            match self.fail_with {
                Some(make) => Err(make()),
                None => Ok(AudioData::new(vec![7u8; 16], AudioFormat::Mp3)),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "fake"
        }

        fn default_voice(&self) -> &str {
            "fake-voice"
        }

        fn output_format(&self) -> AudioFormat {
            AudioFormat::Mp3
        }
    }

    fn request(rate: i16, volume: i16) -> ConversionRequest {
        ConversionRequest::new(
            "你好",
            "zh-CN-XiaoxiaoNeural",
            Adjustment::from_percent(rate),
            Adjustment::from_percent(volume),
        )
    }

    #[tokio::test]
    async fn neutral_adjustments_are_omitted() {
        let provider = Arc::new(RecordingProvider::default());
        let adapter = SpeechAdapter::with_provider(provider.clone());

        let bytes = adapter.synthesize(&request(0, 0)).await.unwrap();
        assert_eq!(bytes.len(), 16);

        let seen = provider.seen.lock();
        let (text, settings) = &seen[0];
        assert_eq!(text, "你好");
        assert_eq!(settings.voice.as_deref(), Some("zh-CN-XiaoxiaoNeural"));
        assert_eq!(settings.speed, None);
        assert_eq!(settings.volume, None);
    }

    #[tokio::test]
    async fn adjustments_map_to_speed_and_volume() {
        let provider = Arc::new(RecordingProvider::default());
        let adapter = SpeechAdapter::with_provider(provider.clone());

        adapter.synthesize(&request(50, -20)).await.unwrap();

        let seen = provider.seen.lock();
        let settings = &seen[0].1;
        assert!((settings.speed.unwrap() - 1.5).abs() < f32::EPSILON);
        assert_eq!(settings.volume.as_deref(), Some("-20%"));
    }

    #[tokio::test]
    async fn rate_limits_map_to_rate_limited() {
        let provider = Arc::new(RecordingProvider {
            fail_with: Some(|| SpeechError::RateLimited),
            ..RecordingProvider::default()
        });
        let adapter = SpeechAdapter::with_provider(provider);

        let err = adapter.synthesize(&request(0, 0)).await.unwrap_err();
        assert!(matches!(err, ApplicationError::RateLimited));
    }

    #[test]
    fn error_mapping() {
        assert!(matches!(
            SpeechAdapter::map_error(SpeechError::Timeout(500)),
            ApplicationError::ExternalService(msg) if msg.contains("500ms")
        ));
        assert!(matches!(
            SpeechAdapter::map_error(SpeechError::Configuration("bad".into())),
            ApplicationError::Configuration(_)
        ));
        assert!(matches!(
            SpeechAdapter::map_error(SpeechError::VoiceNotFound("x".into())),
            ApplicationError::Internal(msg) if msg.contains('x')
        ));
        assert!(matches!(
            SpeechAdapter::map_error(SpeechError::ServiceUnavailable("down".into())),
            ApplicationError::ExternalService(_)
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SpeechConfig {
            base_url: "ftp://nope".to_string(),
            ..SpeechConfig::default()
        };
        assert!(matches!(
            SpeechAdapter::new(config),
            Err(ApplicationError::Configuration(_))
        ));
    }
}
