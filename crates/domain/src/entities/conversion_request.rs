//! Conversion request - What the speech service is asked to produce

use serde::Serialize;

use crate::value_objects::Adjustment;

/// Immutable description of one synthesis call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionRequest {
    text: String,
    voice_id: String,
    rate: Adjustment,
    volume: Adjustment,
}

impl ConversionRequest {
    /// Build a request
    pub fn new(
        text: impl Into<String>,
        voice_id: impl Into<String>,
        rate: Adjustment,
        volume: Adjustment,
    ) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            rate,
            volume,
        }
    }

    /// Text to speak
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Voice identifier understood by the speech service
    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// Speaking rate adjustment
    pub const fn rate(&self) -> Adjustment {
        self.rate
    }

    /// Volume adjustment
    pub const fn volume(&self) -> Adjustment {
        self.volume
    }

    /// Whether the text has nothing to speak
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Character count of the text
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
