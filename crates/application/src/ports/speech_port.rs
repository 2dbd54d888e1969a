//! Speech synthesis port - Interface to the text-to-speech capability

use async_trait::async_trait;
use domain::ConversionRequest;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for speech synthesis
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesisPort: Send + Sync {
    /// Synthesize the request and return the encoded audio bytes
    async fn synthesize(&self, request: &ConversionRequest) -> Result<Vec<u8>, ApplicationError>;

    /// Check whether the synthesis service is reachable
    async fn is_available(&self) -> bool;
}
