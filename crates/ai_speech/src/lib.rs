//! AI Speech - Text-to-Speech abstraction
//!
//! Provides the `TextToSpeech` port and an implementation for any service that
//! speaks the OpenAI `/audio/speech` protocol (OpenAI itself, or self-hosted
//! gateways in front of neural voices such as Edge TTS).
//!
//! # Architecture
//!
//! This crate follows the ports & adapters pattern:
//! - `ports` module defines the trait (port)
//! - `providers` module contains concrete implementations (adapters)
//!
//! # Example
//!
//! ```ignore
//! use ai_speech::{OpenAISpeechProvider, SpeechConfig, TextToSpeech, VoiceSettings};
//!
//! let provider = OpenAISpeechProvider::new(SpeechConfig::default())?;
//! let settings = VoiceSettings::new("zh-CN-XiaoxiaoNeural").with_speed(1.1);
//! let audio = provider.synthesize("你好", &settings).await?;
//! ```

pub mod config;
pub mod error;
pub mod ports;
pub mod providers;
pub mod types;

pub use config::SpeechConfig;
pub use error::SpeechError;
pub use ports::TextToSpeech;
pub use providers::openai::OpenAISpeechProvider;
pub use types::{AudioData, AudioFormat, VoiceSettings};
